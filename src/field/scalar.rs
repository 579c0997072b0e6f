//! Decorated scalar field: storage plus boundary conditions.

use crate::boundary::{WallBC, WallSet};
use crate::grid::Grid;
use crate::operators::Derivative;
use crate::types::Face;

use super::{Array3, Field, PlainScalar, PlainVector, VectorField};

/// A transported scalar (or pressure) with per-face boundary conditions.
pub struct ScalarField {
    pub f: Field,
    pub walls: WallSet,
}

impl ScalarField {
    pub fn new(grid: &Grid, name: &str) -> Self {
        Self {
            f: Field::new(grid, name),
            walls: WallSet::new(),
        }
    }

    pub fn set_wall(&mut self, face: Face, bc: Box<dyn WallBC>) {
        self.walls.set(face, bc);
    }

    /// Accumulate the Laplacian along the active axes into `out` over the
    /// core.
    pub fn compute_diff(
        &self,
        grid: &Grid,
        der: &Derivative,
        out: &mut PlainScalar,
        tmp: &mut Array3,
    ) {
        let core = self.f.core();
        for &axis in grid.active_axes() {
            der.d2(grid, axis, &self.f.data, tmp);
            out.f.add_region(tmp, core);
        }
    }

    /// Subtract the convective derivative `(V·∇)F` from `out` over the core.
    pub fn compute_nlin(
        &self,
        grid: &Grid,
        der: &Derivative,
        v: &VectorField,
        out: &mut PlainScalar,
        tmp: &mut Array3,
    ) {
        let core = self.f.core();
        for &axis in grid.active_axes() {
            der.d1(grid, axis, &self.f.data, tmp);
            out.f.sub_mul_region(&v.component(axis).data, tmp, core);
        }
    }

    /// Write the gradient into the components of a plain vector over the
    /// core.
    pub fn gradient(
        &self,
        grid: &Grid,
        der: &Derivative,
        out: &mut PlainVector,
        tmp: &mut Array3,
    ) {
        let core = self.f.core();
        for &axis in grid.active_axes() {
            der.d1(grid, axis, &self.f.data, tmp);
            out.component_mut(axis).assign_region(tmp, core);
        }
    }

    pub fn sync(&mut self, grid: &Grid) {
        self.f.sync(grid);
    }

    /// Sync halos, then impose every assigned wall condition on the
    /// non-periodic axes.
    pub fn impose_bcs(&mut self, grid: &Grid) {
        self.f.sync(grid);
        self.walls.impose(&mut self.f, grid);
    }

    /// Global maximum of |F| over the core.
    pub fn max_abs(&self, grid: &Grid) -> f64 {
        self.f.max_abs(grid)
    }
}

impl std::ops::AddAssign<&PlainScalar> for ScalarField {
    fn add_assign(&mut self, other: &PlainScalar) {
        self.f.data.add_assign(&other.f);
    }
}

impl std::ops::SubAssign<&PlainScalar> for ScalarField {
    fn sub_assign(&mut self, other: &PlainScalar) {
        self.f.data.sub_assign(&other.f);
    }
}
