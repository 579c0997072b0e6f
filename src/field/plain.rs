//! Plain fields: RHS scratch without BC metadata.
//!
//! The time core composes its right-hand sides out of these value-semantic
//! buffers; they support in-place arithmetic against each other and against
//! the decorated fields, plus halo sync, and nothing more.

use crate::grid::Grid;
use crate::operators::Derivative;
use crate::types::{Axis, Range3};

use super::{Array3, Field, VectorField};

/// A plain scalar buffer on the padded sub-domain.
#[derive(Clone)]
pub struct PlainScalar {
    pub f: Array3,
    core: Range3,
}

impl PlainScalar {
    pub fn new(grid: &Grid) -> Self {
        Self {
            f: Array3::from_range(grid.full),
            core: grid.core,
        }
    }

    pub fn core(&self) -> Range3 {
        self.core
    }

    pub fn fill(&mut self, v: f64) {
        self.f.fill(v);
    }

    pub fn scale(&mut self, c: f64) {
        self.f.scale(c);
    }

    /// `self += c · other`
    pub fn mult_add(&mut self, c: f64, other: &PlainScalar) {
        self.f.mult_add(c, &other.f);
    }

    /// `self += field` over the full extent.
    pub fn add_field(&mut self, field: &Field) {
        self.f.add_assign(&field.data);
    }

    pub fn sync(&mut self, grid: &Grid) {
        grid.transport().sync_halos(&mut self.f, self.core, grid.pad);
    }

    /// Global maximum of |F| over the core.
    pub fn max_abs(&self, grid: &Grid) -> f64 {
        grid.transport()
            .all_reduce_max(self.f.max_abs_region(self.core))
    }

    /// Write the gradient into the components of a plain vector over the
    /// core. In planar mode the y component is left untouched.
    pub fn gradient(&self, grid: &Grid, der: &Derivative, out: &mut PlainVector, tmp: &mut Array3) {
        der.d1(grid, Axis::X, &self.f, tmp);
        out.x.assign_region(tmp, self.core);
        if !grid.conf.planar {
            der.d1(grid, Axis::Y, &self.f, tmp);
            out.y.assign_region(tmp, self.core);
        }
        der.d1(grid, Axis::Z, &self.f, tmp);
        out.z.assign_region(tmp, self.core);
    }
}

impl std::ops::AddAssign<&PlainScalar> for PlainScalar {
    fn add_assign(&mut self, other: &PlainScalar) {
        self.f.add_assign(&other.f);
    }
}

impl std::ops::SubAssign<&PlainScalar> for PlainScalar {
    fn sub_assign(&mut self, other: &PlainScalar) {
        self.f.sub_assign(&other.f);
    }
}

/// A plain vector buffer: three component arrays, no BC metadata.
#[derive(Clone)]
pub struct PlainVector {
    pub x: Array3,
    pub y: Array3,
    pub z: Array3,
    core: Range3,
}

impl PlainVector {
    pub fn new(grid: &Grid) -> Self {
        Self {
            x: Array3::from_range(grid.full),
            y: Array3::from_range(grid.full),
            z: Array3::from_range(grid.full),
            core: grid.core,
        }
    }

    pub fn core(&self) -> Range3 {
        self.core
    }

    pub fn component(&self, axis: Axis) -> &Array3 {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
            Axis::Z => &self.z,
        }
    }

    pub fn component_mut(&mut self, axis: Axis) -> &mut Array3 {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        }
    }

    pub fn fill(&mut self, v: f64) {
        self.x.fill(v);
        self.y.fill(v);
        self.z.fill(v);
    }

    pub fn scale(&mut self, c: f64) {
        self.x.scale(c);
        self.y.scale(c);
        self.z.scale(c);
    }

    /// `self += c · other`
    pub fn mult_add(&mut self, c: f64, other: &PlainVector) {
        self.x.mult_add(c, &other.x);
        self.y.mult_add(c, &other.y);
        self.z.mult_add(c, &other.z);
    }

    /// `self += v` over the full extent of every component.
    pub fn add_vfield(&mut self, v: &VectorField) {
        self.x.add_assign(&v.vx.data);
        self.y.add_assign(&v.vy.data);
        self.z.add_assign(&v.vz.data);
    }

    pub fn sync(&mut self, grid: &Grid) {
        let t = grid.transport();
        t.sync_halos(&mut self.x, self.core, grid.pad);
        t.sync_halos(&mut self.y, self.core, grid.pad);
        t.sync_halos(&mut self.z, self.core, grid.pad);
    }
}

impl std::ops::AddAssign<&PlainVector> for PlainVector {
    fn add_assign(&mut self, other: &PlainVector) {
        self.x.add_assign(&other.x);
        self.y.add_assign(&other.y);
        self.z.add_assign(&other.z);
    }
}

impl std::ops::SubAssign<&PlainVector> for PlainVector {
    fn sub_assign(&mut self, other: &PlainVector) {
        self.x.sub_assign(&other.x);
        self.y.sub_assign(&other.y);
        self.z.sub_assign(&other.z);
    }
}
