//! Decorated vector field: three component fields plus per-component
//! boundary conditions.

use crate::boundary::{NoSlip, WallBC, WallSet};
use crate::grid::Grid;
use crate::operators::Derivative;
use crate::types::{Axis, Face};

use super::{Array3, Field, PlainScalar, PlainVector};

/// The velocity field: components `vx`, `vy`, `vz` with six wall-condition
/// slots each.
pub struct VectorField {
    pub vx: Field,
    pub vy: Field,
    pub vz: Field,
    pub x_walls: WallSet,
    pub y_walls: WallSet,
    pub z_walls: WallSet,
}

impl VectorField {
    pub fn new(grid: &Grid) -> Self {
        Self {
            vx: Field::new(grid, "Vx"),
            vy: Field::new(grid, "Vy"),
            vz: Field::new(grid, "Vz"),
            x_walls: WallSet::new(),
            y_walls: WallSet::new(),
            z_walls: WallSet::new(),
        }
    }

    pub fn component(&self, axis: Axis) -> &Field {
        match axis {
            Axis::X => &self.vx,
            Axis::Y => &self.vy,
            Axis::Z => &self.vz,
        }
    }

    pub fn component_mut(&mut self, axis: Axis) -> &mut Field {
        match axis {
            Axis::X => &mut self.vx,
            Axis::Y => &mut self.vy,
            Axis::Z => &mut self.vz,
        }
    }

    /// Assign a wall condition to one component on one face.
    pub fn set_wall(&mut self, component: Axis, face: Face, bc: Box<dyn WallBC>) {
        match component {
            Axis::X => self.x_walls.set(face, bc),
            Axis::Y => self.y_walls.set(face, bc),
            Axis::Z => self.z_walls.set(face, bc),
        }
    }

    /// No-slip wall: every component is zeroed on this face.
    pub fn no_slip_wall(&mut self, face: Face) {
        self.x_walls.set(face, Box::new(NoSlip));
        self.y_walls.set(face, Box::new(NoSlip));
        self.z_walls.set(face, Box::new(NoSlip));
    }

    /// Accumulate the component-wise Laplacian into `out` over the core.
    pub fn compute_diff(
        &self,
        grid: &Grid,
        der: &Derivative,
        out: &mut PlainVector,
        tmp: &mut Array3,
    ) {
        for comp in Axis::ALL {
            if grid.conf.planar && comp == Axis::Y {
                continue;
            }
            let field = self.component(comp);
            let core = field.core();
            for &axis in grid.active_axes() {
                der.d2(grid, axis, &field.data, tmp);
                out.component_mut(comp).add_region(tmp, core);
            }
        }
    }

    /// Subtract the advection terms `(Uadv·∇)V` component-wise from `out`
    /// over the core.
    pub fn compute_nlin(
        &self,
        grid: &Grid,
        der: &Derivative,
        adv: &VectorField,
        out: &mut PlainVector,
        tmp: &mut Array3,
    ) {
        for comp in Axis::ALL {
            if grid.conf.planar && comp == Axis::Y {
                continue;
            }
            let field = self.component(comp);
            let core = field.core();
            for &axis in grid.active_axes() {
                der.d1(grid, axis, &field.data, tmp);
                out.component_mut(comp)
                    .sub_mul_region(&adv.component(axis).data, tmp, core);
            }
        }
    }

    /// Write `∂Vx/∂x + ∂Vy/∂y + ∂Vz/∂z` into `out` over the core.
    pub fn divergence(
        &self,
        grid: &Grid,
        der: &Derivative,
        out: &mut PlainScalar,
        tmp: &mut Array3,
    ) {
        let core = self.vx.core();
        der.d1(grid, Axis::X, &self.vx.data, tmp);
        out.f.assign_region(tmp, core);
        if !grid.conf.planar {
            der.d1(grid, Axis::Y, &self.vy.data, tmp);
            out.f.add_region(tmp, core);
        }
        der.d1(grid, Axis::Z, &self.vz.data, tmp);
        out.f.add_region(tmp, core);
    }

    pub fn sync(&mut self, grid: &Grid) {
        self.vx.sync(grid);
        self.vy.sync(grid);
        self.vz.sync(grid);
    }

    /// Sync all components, then impose their wall conditions on the
    /// non-periodic axes.
    pub fn impose_bcs(&mut self, grid: &Grid) {
        self.impose_vx_bc(grid);
        if !grid.conf.planar {
            self.impose_vy_bc(grid);
        }
        self.impose_vz_bc(grid);
    }

    /// Sync and impose the x-component alone; used between Jacobi sweeps.
    pub fn impose_vx_bc(&mut self, grid: &Grid) {
        self.vx.sync(grid);
        self.x_walls.impose(&mut self.vx, grid);
    }

    pub fn impose_vy_bc(&mut self, grid: &Grid) {
        self.vy.sync(grid);
        self.y_walls.impose(&mut self.vy, grid);
    }

    pub fn impose_vz_bc(&mut self, grid: &Grid) {
        self.vz.sync(grid);
        self.z_walls.impose(&mut self.vz, grid);
    }

    /// Global maximum of |V| component-wise over the core.
    pub fn max_abs(&self, grid: &Grid) -> f64 {
        self.vx
            .max_abs(grid)
            .max(self.vy.max_abs(grid))
            .max(self.vz.max_abs(grid))
    }
}

impl std::ops::SubAssign<&PlainVector> for VectorField {
    fn sub_assign(&mut self, other: &PlainVector) {
        self.vx.data.sub_assign(&other.x);
        self.vy.data.sub_assign(&other.y);
        self.vz.data.sub_assign(&other.z);
    }
}

impl std::ops::AddAssign<&PlainVector> for VectorField {
    fn add_assign(&mut self, other: &PlainVector) {
        self.vx.data.add_assign(&other.x);
        self.vy.data.add_assign(&other.y);
        self.vz.data.add_assign(&other.z);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Config;

    fn periodic_grid(n: usize) -> Grid {
        Grid::serial(Config {
            points: [n, n, n],
            periodic: [true; 3],
            ..Config::default()
        })
        .unwrap()
    }

    #[test]
    fn test_divergence_of_uniform_flow() {
        let g = periodic_grid(8);
        let der = Derivative::new(&g);
        let mut v = VectorField::new(&g);
        v.vx.data.fill(1.0);
        v.impose_bcs(&g);

        let mut div = PlainScalar::new(&g);
        let mut tmp = Array3::from_range(g.full);
        v.divergence(&g, &der, &mut div, &mut tmp);

        assert!(div.max_abs(&g) < 1e-14);
    }

    #[test]
    fn test_divergence_of_shear_is_zero() {
        // V = (sin 2πz, 0, 0) is solenoidal
        let g = periodic_grid(8);
        let der = Derivative::new(&g);
        let mut v = VectorField::new(&g);
        let w = 2.0 * std::f64::consts::PI;
        g.full.for_each(|p| v.vx.data[p] = (w * g.zpts.at(p[2])).sin());

        let mut div = PlainScalar::new(&g);
        let mut tmp = Array3::from_range(g.full);
        v.divergence(&g, &der, &mut div, &mut tmp);

        assert!(div.max_abs(&g) < 1e-13);
    }

    #[test]
    fn test_self_advection_of_uniform_flow_vanishes() {
        let g = periodic_grid(6);
        let der = Derivative::new(&g);
        let mut v = VectorField::new(&g);
        v.vx.data.fill(2.0);
        v.vy.data.fill(-1.0);
        v.vz.data.fill(0.5);

        let mut rhs = PlainVector::new(&g);
        let mut tmp = Array3::from_range(g.full);
        v.compute_nlin(&g, &der, &v, &mut rhs, &mut tmp);

        for comp in Axis::ALL {
            assert!(rhs.component(comp).max_abs_region(g.core) < 1e-13);
        }
    }

    #[test]
    fn test_no_slip_wall_assignment() {
        let g = Grid::serial(Config {
            points: [4, 4, 4],
            periodic: [true, true, false],
            ..Config::default()
        })
        .unwrap();
        let mut v = VectorField::new(&g);
        v.vx.data.fill(1.0);
        v.vz.data.fill(1.0);
        v.no_slip_wall(Face::ZLo);
        v.no_slip_wall(Face::ZHi);
        v.impose_bcs(&g);

        assert_eq!(v.vx.data[[1, 1, -1]], 0.0);
        assert_eq!(v.vz.data[[1, 1, 4]], 0.0);
        assert_eq!(v.vx.data[[1, 1, 0]], 1.0);
    }
}
