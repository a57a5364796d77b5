//! Nearest-cell lookup over the unstructured current-field grid.
//!
//! Two indices are kept: one over the full `(lon, lat, depth)` cell coordinates
//! and one over `(lon, lat)` only. Both answer "which cell is closest to this
//! point" for a batch of points at once.

use crate::error::{TransportError, TransportResult};
use crate::field::CurrentField;
use rayon::prelude::*;
use rstar::primitives::GeomWithData;
use rstar::{PointDistance, RTree};
use std::sync::Arc;

/// Horizontal query point `[lon, lat]`.
pub type HorizontalPoint = [f64; 2];
/// Full-grid query point `[lon, lat, depth]`.
pub type FullPoint = [f64; 3];

/// Batch nearest-neighbor queries against a fixed set of grid cells.
///
/// Implementations must be deterministic: the same points always map to the
/// same cells, ties included.
pub trait NearestCell<P>: Send + Sync {
    /// Returns, for every point, the closest cell id and the distance to it.
    fn nearest(&self, points: &[P]) -> TransportResult<(Vec<usize>, Vec<f64>)>;

    /// Number of cells in the index.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// R-tree over cell coordinates; each entry carries its cell id.
pub struct CellIndex<P: rstar::Point> {
    tree: RTree<GeomWithData<P, usize>>,
}

impl<P> CellIndex<P>
where
    P: rstar::Point<Scalar = f64> + Send + Sync,
{
    /// Bulk-loads the tree; cell ids are positions in `points`.
    pub fn bulk_load(points: Vec<P>) -> TransportResult<Self> {
        if points.is_empty() {
            return Err(TransportError::EmptyInput("spatial index coordinates"));
        }
        let entries: Vec<GeomWithData<P, usize>> = points
            .into_iter()
            .enumerate()
            .map(|(cell, point)| GeomWithData::new(point, cell))
            .collect();
        Ok(Self {
            tree: RTree::bulk_load(entries),
        })
    }

    /// Closest cell to a single point.
    #[inline(always)]
    pub fn nearest_one(&self, point: &P) -> Option<(usize, f64)> {
        self.tree
            .nearest_neighbor(point)
            .map(|entry| (entry.data, entry.distance_2(point).sqrt()))
    }
}

impl<P> NearestCell<P> for CellIndex<P>
where
    P: rstar::Point<Scalar = f64> + Send + Sync,
{
    fn nearest(&self, points: &[P]) -> TransportResult<(Vec<usize>, Vec<f64>)> {
        // Queries are independent, so fan them out; collect keeps input order.
        let hits: Vec<Option<(usize, f64)>> = points
            .par_iter()
            .map(|point| self.nearest_one(point))
            .collect();

        let mut cells = Vec::with_capacity(hits.len());
        let mut distances = Vec::with_capacity(hits.len());
        for (row, hit) in hits.into_iter().enumerate() {
            match hit {
                Some((cell, distance)) => {
                    cells.push(cell);
                    distances.push(distance);
                }
                None => {
                    return Err(TransportError::IndexQuery(format!(
                        "no cell found for query point {}",
                        row
                    )))
                }
            }
        }
        Ok((cells, distances))
    }

    fn len(&self) -> usize {
        self.tree.size()
    }
}

/// Builds the full-grid index over `(lon, lat, depth)`.
pub fn build_index(lon: &[f64], lat: &[f64], depth: &[f64]) -> TransportResult<CellIndex<FullPoint>> {
    TransportError::check_len("index lat", lon.len(), lat.len())?;
    TransportError::check_len("index depth", lon.len(), depth.len())?;
    let points = lon
        .iter()
        .zip(lat)
        .zip(depth)
        .map(|((&x, &y), &z)| [x, y, z])
        .collect();
    CellIndex::bulk_load(points)
}

/// Builds the horizontal index over `(lon, lat)` only.
pub fn build_horizontal_index(lon: &[f64], lat: &[f64]) -> TransportResult<CellIndex<HorizontalPoint>> {
    TransportError::check_len("index lat", lon.len(), lat.len())?;
    let points = lon.iter().zip(lat).map(|(&x, &y)| [x, y]).collect();
    CellIndex::bulk_load(points)
}

/// Both indices for one field, shareable across repeated runs.
#[derive(Clone)]
pub struct GridIndices {
    pub full: Arc<dyn NearestCell<FullPoint>>,
    pub horizontal: Arc<dyn NearestCell<HorizontalPoint>>,
}

impl GridIndices {
    /// Builds both indices from a field's cell coordinates.
    pub fn build(field: &CurrentField) -> TransportResult<Self> {
        let full = build_index(&field.lon, &field.lat, &field.depth)?;
        let horizontal = build_horizontal_index(&field.lon, &field.lat)?;
        log::debug!("Built spatial indices over {} cells.", field.len());
        Ok(GridIndices {
            full: Arc::new(full),
            horizontal: Arc::new(horizontal),
        })
    }

    /// Checks that both indices were built over a field of `cells` cells.
    pub fn check_matches(&self, cells: usize) -> TransportResult<()> {
        TransportError::check_len("full index cells", cells, self.full.len())?;
        TransportError::check_len("horizontal index cells", cells, self.horizontal.len())
    }
}

impl std::fmt::Debug for GridIndices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridIndices")
            .field("full_cells", &self.full.len())
            .field("horizontal_cells", &self.horizontal.len())
            .finish()
    }
}
