use serde::{Deserialize, Serialize};

/// Meters in one nautical mile.
pub const METERS_PER_NAUTICAL_MILE: f64 = 1852.0;
/// Nautical miles in one degree of latitude.
pub const NAUTICAL_MILES_PER_DEGREE: f64 = 60.0;
/// Meters spanned by one degree of latitude.
pub const METERS_PER_DEGREE: f64 = METERS_PER_NAUTICAL_MILE * NAUTICAL_MILES_PER_DEGREE;

/// A particle position: longitude and latitude in degrees, depth in meters.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
    pub depth: f64,
}

impl GeoPoint {
    /// Creates a new GeoPoint.
    pub fn new(lon: f64, lat: f64, depth: f64) -> Self {
        GeoPoint { lon, lat, depth }
    }

    /// Point halfway between `self` and `other`. Depth is taken from `self`.
    pub fn midpoint(&self, other: GeoPoint) -> Self {
        GeoPoint {
            lon: 0.5 * (self.lon + other.lon),
            lat: 0.5 * (self.lat + other.lat),
            depth: self.depth,
        }
    }

    /// Moves the point by a current `(u, v)` in m/s for `dt` seconds.
    ///
    /// Longitude degrees shrink with the cosine of the starting latitude.
    /// Depth is carried through unchanged.
    pub fn advect(&self, u: f64, v: f64, dt: f64) -> Self {
        let lat_scale = METERS_PER_DEGREE * self.lat.to_radians().cos();
        GeoPoint {
            lon: self.lon + (u * dt) / lat_scale,
            lat: self.lat + (v * dt) / METERS_PER_DEGREE,
            depth: self.depth,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite() && self.depth.is_finite()
    }
}

/// Axis-aligned longitude/latitude bounding box.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoExtent {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl GeoExtent {
    pub fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        GeoExtent {
            min_lon: min_lon.min(max_lon),
            max_lon: min_lon.max(max_lon),
            min_lat: min_lat.min(max_lat),
            max_lat: min_lat.max(max_lat),
        }
    }

    /// Smallest extent covering all `(lon, lat)` pairs. Returns `None` for empty input.
    pub fn covering(lon: &[f64], lat: &[f64]) -> Option<Self> {
        if lon.is_empty() || lat.is_empty() {
            return None;
        }
        let (min_lon, max_lon) = min_max(lon);
        let (min_lat, max_lat) = min_max(lat);
        Some(GeoExtent { min_lon, max_lon, min_lat, max_lat })
    }

    /// Inclusive containment test; points on the edge are inside.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_lon && lon <= self.max_lon && lat >= self.min_lat && lat <= self.max_lat
    }
}

fn min_max(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}
