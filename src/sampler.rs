use crate::error::TransportResult;
use crate::field::CurrentField;
use crate::particle_state::PositionSnapshot;
use crate::spatial_index::GridIndices;

/// Nearest cells of every particle in one snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellLookup {
    /// Nearest cell by `(lon, lat)`; drives velocity and seabed lookups.
    pub horizontal: Vec<usize>,
    /// Nearest cell by `(lon, lat, depth)`; recorded for callers.
    pub full: Vec<usize>,
}

/// Current and seabed depth under every particle.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VelocitySample {
    pub u: Vec<f64>,
    pub v: Vec<f64>,
    pub depth: Vec<f64>,
}

/// Read-only lookups of the current field at particle positions.
pub struct FieldSampler<'a> {
    field: &'a CurrentField,
    indices: &'a GridIndices,
}

impl<'a> FieldSampler<'a> {
    pub fn new(field: &'a CurrentField, indices: &'a GridIndices) -> Self {
        Self { field, indices }
    }

    pub fn field(&self) -> &CurrentField {
        self.field
    }

    pub fn indices(&self) -> &GridIndices {
        self.indices
    }

    /// Nearest horizontal cell of every particle.
    pub fn locate_horizontal(&self, snapshot: &PositionSnapshot) -> TransportResult<Vec<usize>> {
        let (cells, _distances) = self.indices.horizontal.nearest(&snapshot.horizontal_points())?;
        Ok(cells)
    }

    /// Nearest horizontal and full-grid cells of every particle.
    pub fn locate(&self, snapshot: &PositionSnapshot) -> TransportResult<CellLookup> {
        let horizontal = self.locate_horizontal(snapshot)?;
        let (full, _distances) = self.indices.full.nearest(&snapshot.full_points())?;
        Ok(CellLookup { horizontal, full })
    }

    /// Looks up `u`, `v` and seabed depth of the given cells.
    pub fn sample(&self, cells: &[usize]) -> VelocitySample {
        VelocitySample {
            u: cells.iter().map(|&cell| self.field.u[cell]).collect(),
            v: cells.iter().map(|&cell| self.field.v[cell]).collect(),
            depth: self.seabed_depths(cells),
        }
    }

    /// Seabed depth of the given cells.
    pub fn seabed_depths(&self, cells: &[usize]) -> Vec<f64> {
        cells.iter().map(|&cell| self.field.depth[cell]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transport_common::GeoPoint;

    fn two_cell_field() -> CurrentField {
        CurrentField::new(
            vec![0.0, 1.0],
            vec![0.0, 0.0],
            vec![50.0, 20.0],
            vec![0.1, 0.2],
            vec![-0.1, 0.3],
        )
        .unwrap()
    }

    #[test]
    fn samples_nearest_horizontal_cell() {
        let field = two_cell_field();
        let indices = GridIndices::build(&field).unwrap();
        let sampler = FieldSampler::new(&field, &indices);

        let snapshot = PositionSnapshot::from_points(&[GeoPoint::new(0.2, 0.1, 0.0), GeoPoint::new(0.9, -0.1, 0.0)]).unwrap();
        let cells = sampler.locate(&snapshot).unwrap();
        assert_eq!(cells.horizontal, vec![0, 1]);

        let sample = sampler.sample(&cells.horizontal);
        assert_eq!(sample.u, vec![0.1, 0.2]);
        assert_eq!(sample.v, vec![-0.1, 0.3]);
        assert_eq!(sample.depth, vec![50.0, 20.0]);
    }

    #[test]
    fn sampling_does_not_touch_the_field() {
        let field = two_cell_field();
        let before = field.u.clone();
        let indices = GridIndices::build(&field).unwrap();
        let sampler = FieldSampler::new(&field, &indices);
        let _ = sampler.sample(&[0, 1, 1, 0]);
        assert_eq!(field.u, before);
    }
}
