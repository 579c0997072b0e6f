//! Boundary conditions on sub-domain walls.
//!
//! A [`WallBC`] writes one face's wall slice — the one-cell layer just
//! outside the core — and nothing else. Fields keep one optional BC per
//! face in a [`WallSet`]; faces on periodic axes are never imposed since
//! halo exchange already fills those layers.
//!
//! On wall-bounded axes the wall slice sits exactly on the physical
//! boundary, so [`Dirichlet`] values are imposed without interpolation.

use crate::field::Field;
use crate::grid::Grid;
use crate::types::Face;

/// A boundary condition for a single field on a single face.
pub trait WallBC: Send + Sync {
    /// Write the wall slice of `face`.
    fn impose(&self, field: &mut Field, face: Face, grid: &Grid);

    /// Name of this condition for debugging and logging.
    fn name(&self) -> &'static str;
}

/// Fixed-value condition: the wall slice is set to `value`.
#[derive(Clone, Copy, Debug)]
pub struct Dirichlet {
    pub value: f64,
}

impl Dirichlet {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl WallBC for Dirichlet {
    fn impose(&self, field: &mut Field, face: Face, _grid: &Grid) {
        let wall = field.wall(face);
        field.data.fill_region(wall, self.value);
    }

    fn name(&self) -> &'static str {
        "dirichlet"
    }
}

/// No-slip wall: the wall slice is zeroed.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSlip;

impl WallBC for NoSlip {
    fn impose(&self, field: &mut Field, face: Face, _grid: &Grid) {
        let wall = field.wall(face);
        field.data.fill_region(wall, 0.0);
    }

    fn name(&self) -> &'static str {
        "no-slip"
    }
}

/// Fixed-gradient condition along the face normal.
///
/// `gradient` is the prescribed ∂F/∂x taken along the positive axis
/// direction; `gradient = 0` is the adiabatic / zero-flux wall.
#[derive(Clone, Copy, Debug)]
pub struct Neumann {
    pub gradient: f64,
}

impl Neumann {
    pub fn new(gradient: f64) -> Self {
        Self { gradient }
    }

    pub fn adiabatic() -> Self {
        Self { gradient: 0.0 }
    }
}

impl WallBC for Neumann {
    fn impose(&self, field: &mut Field, face: Face, grid: &Grid) {
        let wall = field.wall(face);
        let a = face.axis().idx();
        let inward: i32 = if face.is_low() { 1 } else { -1 };

        let coords = grid.coords(face.axis());
        let w = wall.lo[a];
        let dx = (coords.at(w + inward) - coords.at(w)).abs();
        // one-sided first-order difference: F_wall = F_core ∓ g·dx
        let shift = if face.is_low() {
            -self.gradient * dx
        } else {
            self.gradient * dx
        };

        wall.for_each(|p| {
            let mut q = p;
            q[a] += inward;
            let v = field.data[q] + shift;
            field.data[p] = v;
        });
    }

    fn name(&self) -> &'static str {
        "neumann"
    }
}

/// The six per-face condition slots of one field.
#[derive(Default)]
pub struct WallSet {
    walls: [Option<Box<dyn WallBC>>; 6],
}

impl WallSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, face: Face, bc: Box<dyn WallBC>) {
        self.walls[face.idx()] = Some(bc);
    }

    pub fn get(&self, face: Face) -> Option<&dyn WallBC> {
        self.walls[face.idx()].as_deref()
    }

    /// Impose every assigned condition whose axis is active and
    /// non-periodic.
    pub fn impose(&self, field: &mut Field, grid: &Grid) {
        for face in Face::ALL {
            let a = face.axis();
            if grid.conf.periodic[a.idx()] {
                continue;
            }
            if grid.conf.planar && a == crate::types::Axis::Y {
                continue;
            }
            if let Some(bc) = &self.walls[face.idx()] {
                bc.impose(field, face, grid);
            }
        }
    }
}
