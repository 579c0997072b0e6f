//! Padded sub-domain storage with core and wall bookkeeping.

use crate::grid::Grid;
use crate::types::{Face, Range3};

use super::Array3;

/// One scalar quantity on the padded sub-domain.
///
/// The array spans the full padded range; the core is where the PDE updates
/// live, the six wall slices are the BC write targets one layer outside the
/// core, and the remaining pad cells are written only by halo exchange.
pub struct Field {
    pub name: String,
    pub data: Array3,
    core: Range3,
    walls: [Range3; 6],
}

impl Field {
    pub fn new(grid: &Grid, name: &str) -> Self {
        let core = grid.core;
        let full = grid.full;

        // Wall slices span the full tangential extent so edge and corner
        // pads carry boundary values too.
        let mut walls = [full; 6];
        for face in Face::ALL {
            let a = face.axis().idx();
            let w = &mut walls[face.idx()];
            let layer = if face.is_low() {
                core.lo[a] - 1
            } else {
                core.hi[a] + 1
            };
            w.lo[a] = layer;
            w.hi[a] = layer;
        }

        Self {
            name: name.to_string(),
            data: Array3::from_range(full),
            core,
            walls,
        }
    }

    pub fn core(&self) -> Range3 {
        self.core
    }

    /// The wall slice of one face.
    pub fn wall(&self, face: Face) -> Range3 {
        self.walls[face.idx()]
    }

    /// Update the pad layers from the face neighbours.
    pub fn sync(&mut self, grid: &Grid) {
        grid.transport().sync_halos(&mut self.data, self.core, grid.pad);
    }

    /// Global maximum of |F| over the core, reduced across ranks.
    pub fn max_abs(&self, grid: &Grid) -> f64 {
        let local = self.data.max_abs_region(self.core);
        grid.transport().all_reduce_max(local)
    }
}
