use crate::error::{TransportError, TransportResult};
use crate::particle_state::PositionSnapshot;
use std::slice::ChunksExact;
use transport_common::GeoPoint;

/// Coordinates stored per particle per slot.
pub const COORDS: usize = 3;

/// Bytes a full trajectory of `num_particles` over `horizon` slots needs,
/// positions plus both index maps. Use it to size batches before a run.
pub fn estimated_bytes(num_particles: usize, horizon: u32) -> u64 {
    let slots = num_particles as u64 * horizon as u64;
    let positions = slots * (COORDS * std::mem::size_of::<f64>()) as u64;
    let index_maps = slots * (2 * std::mem::size_of::<usize>()) as u64;
    positions + index_maps
}

/// Append-only record of every slot of a run.
///
/// Storage is slot-major: slot `t` holds all longitudes, then all latitudes,
/// then all depths. Everything is reserved up front, so pushing never allocates.
#[derive(Debug)]
pub struct TrajectoryStore {
    num_particles: usize,
    horizon: usize,
    slots: usize,
    positions: Vec<f64>,
    full_cells: Vec<usize>,
    horizontal_cells: Vec<usize>,
}

impl TrajectoryStore {
    /// Reserves room for `horizon` slots, failing cleanly when the
    /// allocation (or the optional byte limit) cannot be met.
    pub fn with_horizon(num_particles: usize, horizon: u32, limit_bytes: Option<u64>) -> TransportResult<Self> {
        if num_particles == 0 {
            return Err(TransportError::EmptyInput("trajectory particles"));
        }
        let requested_bytes = estimated_bytes(num_particles, horizon);
        let exhausted = || TransportError::ResourceExhausted { requested_bytes, limit_bytes };
        if limit_bytes.map_or(false, |limit| requested_bytes > limit) {
            return Err(exhausted());
        }

        let horizon = horizon as usize;
        let cell_len = num_particles.checked_mul(horizon).ok_or_else(exhausted)?;
        let position_len = cell_len.checked_mul(COORDS).ok_or_else(exhausted)?;

        let mut positions = Vec::new();
        let mut full_cells = Vec::new();
        let mut horizontal_cells = Vec::new();
        positions.try_reserve_exact(position_len).map_err(|_| exhausted())?;
        full_cells.try_reserve_exact(cell_len).map_err(|_| exhausted())?;
        horizontal_cells.try_reserve_exact(cell_len).map_err(|_| exhausted())?;

        Ok(Self {
            num_particles,
            horizon,
            slots: 0,
            positions,
            full_cells,
            horizontal_cells,
        })
    }

    /// Appends one slot: the positions and the nearest cells of those positions.
    pub fn push(&mut self, snapshot: &PositionSnapshot, full: &[usize], horizontal: &[usize]) -> TransportResult<()> {
        TransportError::check_len("trajectory snapshot", self.num_particles, snapshot.len())?;
        TransportError::check_len("trajectory full cells", self.num_particles, full.len())?;
        TransportError::check_len("trajectory horizontal cells", self.num_particles, horizontal.len())?;
        if self.slots == self.horizon {
            return Err(TransportError::ShapeMismatch {
                what: "trajectory slots",
                expected: self.horizon,
                actual: self.slots + 1,
            });
        }
        self.positions.extend_from_slice(&snapshot.lon);
        self.positions.extend_from_slice(&snapshot.lat);
        self.positions.extend_from_slice(&snapshot.depth);
        self.full_cells.extend_from_slice(full);
        self.horizontal_cells.extend_from_slice(horizontal);
        self.slots += 1;
        Ok(())
    }

    /// Slots written so far.
    pub fn len(&self) -> usize {
        self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots == 0
    }

    /// Releases the capacity of unwritten slots and hands over the trajectory.
    pub fn finish(mut self) -> Trajectory {
        self.positions.shrink_to_fit();
        self.full_cells.shrink_to_fit();
        self.horizontal_cells.shrink_to_fit();
        Trajectory {
            num_particles: self.num_particles,
            slots: self.slots,
            positions: self.positions,
            full_cells: self.full_cells,
            horizontal_cells: self.horizontal_cells,
        }
    }
}

/// The positions of every particle at every executed slot, N x 3 x T.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    num_particles: usize,
    slots: usize,
    positions: Vec<f64>,
    full_cells: Vec<usize>,
    horizontal_cells: Vec<usize>,
}

impl Trajectory {
    /// `(particles, 3, slots)`.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.num_particles, COORDS, self.slots)
    }

    pub fn num_steps(&self) -> usize {
        self.slots
    }

    #[inline(always)]
    fn column(&self, step: usize, coord: usize) -> &[f64] {
        let start = (step * COORDS + coord) * self.num_particles;
        &self.positions[start..start + self.num_particles]
    }

    /// Position of `particle` at slot `step` (0-based slot index).
    pub fn position(&self, particle: usize, step: usize) -> GeoPoint {
        GeoPoint::new(
            self.column(step, 0)[particle],
            self.column(step, 1)[particle],
            self.column(step, 2)[particle],
        )
    }

    /// Copy of every position in slot `step`.
    pub fn snapshot(&self, step: usize) -> PositionSnapshot {
        PositionSnapshot {
            lon: self.column(step, 0).to_vec(),
            lat: self.column(step, 1).to_vec(),
            depth: self.column(step, 2).to_vec(),
        }
    }

    /// All positions of one particle in slot order.
    pub fn particle_track(&self, particle: usize) -> Vec<GeoPoint> {
        (0..self.slots).map(|step| self.position(particle, step)).collect()
    }

    /// Nearest full-grid cell of every particle, one slice per slot.
    pub fn full_cells(&self) -> ChunksExact<'_, usize> {
        self.full_cells.chunks_exact(self.num_particles)
    }

    /// Nearest horizontal cell of every particle, one slice per slot.
    pub fn horizontal_cells(&self) -> ChunksExact<'_, usize> {
        self.horizontal_cells.chunks_exact(self.num_particles)
    }

    pub fn full_cells_at(&self, step: usize) -> &[usize] {
        &self.full_cells[step * self.num_particles..(step + 1) * self.num_particles]
    }

    pub fn horizontal_cells_at(&self, step: usize) -> &[usize] {
        &self.horizontal_cells[step * self.num_particles..(step + 1) * self.num_particles]
    }

    /// Row-major N x 3 x T copy: element `[i][c][t]` is at `(i * 3 + c) * T + t`.
    pub fn tensor(&self) -> Vec<f64> {
        let slots = self.slots;
        let mut out = vec![0.0; self.num_particles * COORDS * slots];
        for t in 0..slots {
            for c in 0..COORDS {
                for (i, &value) in self.column(t, c).iter().enumerate() {
                    out[(i * COORDS + c) * slots + t] = value;
                }
            }
        }
        out
    }
}
