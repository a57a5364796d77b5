use crate::error::{TransportError, TransportResult};
use transport_common::GeoExtent;

/// The time-invariant current field: one row per grid cell.
///
/// Seabed depth is positive-down in meters. Velocities are in m/s.
/// Read-only once built; shared by every run that uses it.
#[derive(Debug, Clone)]
pub struct CurrentField {
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
    pub depth: Vec<f64>,
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    /// Vertical velocity, carried for completeness; the horizontal model ignores it.
    pub w: Option<Vec<f64>>,
    /// Precomputed maximum current speed per cell (m/s), opaque to the engine.
    pub max_speed: Option<Vec<f64>>,
    extent: GeoExtent,
}

impl CurrentField {
    /// Builds a field from its columns, checking that they line up and are finite.
    pub fn new(
        lon: Vec<f64>,
        lat: Vec<f64>,
        depth: Vec<f64>,
        u: Vec<f64>,
        v: Vec<f64>,
    ) -> TransportResult<Self> {
        let n = lon.len();
        if n == 0 {
            return Err(TransportError::EmptyInput("current field"));
        }
        TransportError::check_len("field lat", n, lat.len())?;
        TransportError::check_len("field depth", n, depth.len())?;
        TransportError::check_len("field u", n, u.len())?;
        TransportError::check_len("field v", n, v.len())?;

        for (what, column) in [("field lon", &lon), ("field lat", &lat), ("field depth", &depth), ("field u", &u), ("field v", &v)] {
            if let Some(row) = column.iter().position(|x| !x.is_finite()) {
                return Err(TransportError::NonFinite { what, row });
            }
        }

        let extent = GeoExtent::covering(&lon, &lat).ok_or(TransportError::EmptyInput("current field"))?;
        Ok(CurrentField { lon, lat, depth, u, v, w: None, max_speed: None, extent })
    }

    /// Attaches a vertical velocity column.
    pub fn with_vertical(mut self, w: Vec<f64>) -> TransportResult<Self> {
        TransportError::check_len("field w", self.len(), w.len())?;
        self.w = Some(w);
        Ok(self)
    }

    /// Attaches the precomputed per-cell maximum speed used by `sed_at_max_speed`.
    pub fn with_max_speed(mut self, max_speed: Vec<f64>) -> TransportResult<Self> {
        TransportError::check_len("field max_speed", self.len(), max_speed.len())?;
        self.max_speed = Some(max_speed);
        Ok(self)
    }

    /// A regular lon/lat lattice with a constant current and a flat seabed.
    pub fn uniform(
        extent: GeoExtent,
        cols: usize,
        rows: usize,
        seabed_depth: f64,
        u: f64,
        v: f64,
    ) -> TransportResult<Self> {
        if cols < 2 || rows < 2 {
            return Err(TransportError::config("a uniform field needs at least 2x2 cells"));
        }
        let dlon = (extent.max_lon - extent.min_lon) / (cols - 1) as f64;
        let dlat = (extent.max_lat - extent.min_lat) / (rows - 1) as f64;
        let count = cols * rows;
        let mut lon = Vec::with_capacity(count);
        let mut lat = Vec::with_capacity(count);
        for iy in 0..rows {
            for ix in 0..cols {
                lon.push(extent.min_lon + ix as f64 * dlon);
                lat.push(extent.min_lat + iy as f64 * dlat);
            }
        }
        CurrentField::new(lon, lat, vec![seabed_depth; count], vec![u; count], vec![v; count])
    }

    pub fn len(&self) -> usize {
        self.lon.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lon.is_empty()
    }

    /// Bounding extent of the cell coordinates.
    pub fn extent(&self) -> GeoExtent {
        self.extent
    }

    /// Local horizontal current speed of a cell.
    #[inline(always)]
    pub fn speed(&self, cell: usize) -> f64 {
        self.u[cell].hypot(self.v[cell])
    }

    /// Speed used by the sedimentation rule: the precomputed maximum when
    /// requested and available, the local speed otherwise.
    #[inline(always)]
    pub fn sedimentation_speed(&self, cell: usize, at_max_speed: bool) -> f64 {
        match (&self.max_speed, at_max_speed) {
            (Some(max_speed), true) => max_speed[cell],
            _ => self.speed(cell),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_field_covers_extent() {
        let extent = GeoExtent::new(0.0, 1.0, 50.0, 51.0);
        let field = CurrentField::uniform(extent, 11, 6, 40.0, 0.1, 0.0).unwrap();
        assert_eq!(field.len(), 66);
        assert_eq!(field.extent(), extent);
        assert!((field.speed(5) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn rejects_mismatched_columns() {
        let err = CurrentField::new(vec![0.0, 1.0], vec![0.0], vec![1.0, 1.0], vec![0.0, 0.0], vec![0.0, 0.0]);
        assert!(matches!(err, Err(TransportError::ShapeMismatch { what: "field lat", .. })));
    }

    #[test]
    fn rejects_non_finite_values() {
        let err = CurrentField::new(vec![0.0, 1.0], vec![0.0, 0.0], vec![1.0, f64::NAN], vec![0.0, 0.0], vec![0.0, 0.0]);
        assert!(matches!(err, Err(TransportError::NonFinite { what: "field depth", row: 1 })));
    }

    #[test]
    fn max_speed_only_used_when_requested() {
        let field = CurrentField::new(vec![0.0, 1.0], vec![0.0, 0.0], vec![1.0, 1.0], vec![0.3, 0.0], vec![0.4, 0.0])
            .unwrap()
            .with_max_speed(vec![2.0, 3.0])
            .unwrap();
        assert!((field.sedimentation_speed(0, false) - 0.5).abs() < 1e-12);
        assert_eq!(field.sedimentation_speed(0, true), 2.0);
    }
}
