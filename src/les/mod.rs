//! Subgrid-stress closures for under-resolved runs.
//!
//! A [`SubgridClosure`] adds the modelled subgrid contribution to the
//! right-hand sides of the momentum (and optionally scalar) equations and
//! returns the volume-averaged subgrid kinetic energy as a diagnostic for
//! the time-series sink.
//!
//! [`Smagorinsky`] is the classic eddy-viscosity closure:
//! ν_t = (C_s Δ)² |S| with gradient diffusion for the scalar flux through a
//! turbulent Prandtl number.

use crate::field::{Array3, PlainScalar, PlainVector, ScalarField, VectorField};
use crate::grid::Grid;
use crate::operators::Derivative;
use crate::types::Axis;

/// A subgrid-stress model.
pub trait SubgridClosure: Send {
    /// Add the subgrid stress to the momentum RHS; returns the subgrid
    /// kinetic energy averaged over the global domain.
    fn momentum(
        &mut self,
        grid: &Grid,
        der: &Derivative,
        v: &VectorField,
        rhs: &mut PlainVector,
    ) -> f64;

    /// Coupled variant: additionally adds the subgrid scalar flux.
    #[allow(clippy::too_many_arguments)]
    fn coupled(
        &mut self,
        grid: &Grid,
        der: &Derivative,
        v: &VectorField,
        t: &ScalarField,
        rhs_v: &mut PlainVector,
        rhs_t: &mut PlainScalar,
    ) -> f64;

    /// Name of this closure for debugging and logging.
    fn name(&self) -> &'static str;
}

/// Constant-coefficient Smagorinsky eddy viscosity.
pub struct Smagorinsky {
    pub cs: f64,
    pub prandtl_t: f64,
    nu_t: Array3,
    grad_a: Array3,
    grad_b: Array3,
}

// Yoshizawa coefficient relating nu_t and the subgrid kinetic energy
const C_K: f64 = 0.094;

impl Smagorinsky {
    pub fn new(grid: &Grid) -> Self {
        Self {
            cs: 0.17,
            prandtl_t: 0.9,
            nu_t: Array3::from_range(grid.full),
            grad_a: Array3::from_range(grid.full),
            grad_b: Array3::from_range(grid.full),
        }
    }

    pub fn with_cs(mut self, cs: f64) -> Self {
        self.cs = cs;
        self
    }

    /// Fill `nu_t` with (C_s Δ)²·|S| over the core and return the averaged
    /// subgrid kinetic energy.
    fn eddy_viscosity(&mut self, grid: &Grid, der: &Derivative, v: &VectorField) -> f64 {
        let core = grid.core;
        let axes = grid.active_axes();

        // accumulate 2·S_ij·S_ij into nu_t
        self.nu_t.fill(0.0);
        for &a in axes {
            der.d1(grid, a, &v.component(a).data, &mut self.grad_a);
            self.nu_t.add_mul_region(&self.grad_a, &self.grad_a, core);
        }
        self.nu_t.scale(2.0);
        for (n, &a) in axes.iter().enumerate() {
            for &b in &axes[n + 1..] {
                der.d1(grid, b, &v.component(a).data, &mut self.grad_a);
                der.d1(grid, a, &v.component(b).data, &mut self.grad_b);
                core.for_each(|p| {
                    let s = 0.5 * (self.grad_a[p] + self.grad_b[p]);
                    self.nu_t[p] += 4.0 * s * s;
                });
            }
        }

        let cs2 = self.cs * self.cs;
        let mut local_ke = 0.0;
        core.for_each(|p| {
            let delta2 = grid.cell_volume(p).powf(2.0 / 3.0);
            let nu = cs2 * delta2 * self.nu_t[p].sqrt();
            self.nu_t[p] = nu;
            let k = (nu / (C_K * delta2.sqrt())).powi(2);
            local_ke += k * grid.cell_volume(p);
        });

        grid.transport().all_reduce_sum(local_ke) / grid.domain_volume()
    }
}

impl SubgridClosure for Smagorinsky {
    fn momentum(
        &mut self,
        grid: &Grid,
        der: &Derivative,
        v: &VectorField,
        rhs: &mut PlainVector,
    ) -> f64 {
        let ke = self.eddy_viscosity(grid, der, v);

        // constant-viscosity form of the stress divergence: nu_t · ∇²u
        let core = grid.core;
        for comp in Axis::ALL {
            if grid.conf.planar && comp == Axis::Y {
                continue;
            }
            for &axis in grid.active_axes() {
                der.d2(grid, axis, &v.component(comp).data, &mut self.grad_a);
                rhs.component_mut(comp)
                    .add_mul_region(&self.nu_t, &self.grad_a, core);
            }
        }
        ke
    }

    fn coupled(
        &mut self,
        grid: &Grid,
        der: &Derivative,
        v: &VectorField,
        t: &ScalarField,
        rhs_v: &mut PlainVector,
        rhs_t: &mut PlainScalar,
    ) -> f64 {
        let ke = self.momentum(grid, der, v, rhs_v);

        let core = grid.core;
        let inv_pr = 1.0 / self.prandtl_t;
        for &axis in grid.active_axes() {
            der.d2(grid, axis, &t.f.data, &mut self.grad_a);
            core.for_each(|p| {
                rhs_t.f[p] += inv_pr * self.nu_t[p] * self.grad_a[p];
            });
        }
        ke
    }

    fn name(&self) -> &'static str {
        "smagorinsky"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Config;

    fn grid() -> Grid {
        Grid::serial(Config {
            points: [8, 8, 8],
            periodic: [true; 3],
            ..Config::default()
        })
        .unwrap()
    }

    #[test]
    fn test_uniform_flow_has_no_subgrid_stress() {
        let g = grid();
        let der = Derivative::new(&g);
        let mut v = VectorField::new(&g);
        v.vx.data.fill(1.0);
        v.impose_bcs(&g);

        let mut rhs = PlainVector::new(&g);
        let mut sgs = Smagorinsky::new(&g);
        let ke = sgs.momentum(&g, &der, &v, &mut rhs);

        assert!(ke.abs() < 1e-14);
        assert!(rhs.x.max_abs_region(g.core) < 1e-14);
    }

    #[test]
    fn test_shear_produces_positive_subgrid_energy() {
        let g = grid();
        let der = Derivative::new(&g);
        let mut v = VectorField::new(&g);
        let w = 2.0 * std::f64::consts::PI;
        g.full.for_each(|p| v.vx.data[p] = (w * g.zpts.at(p[2])).sin());

        let mut rhs = PlainVector::new(&g);
        let mut sgs = Smagorinsky::new(&g);
        let ke = sgs.momentum(&g, &der, &v, &mut rhs);

        assert!(ke > 0.0);
        assert!(rhs.x.max_abs_region(g.core) > 0.0);
    }

    #[test]
    fn test_coupled_adds_scalar_flux() {
        let g = grid();
        let der = Derivative::new(&g);
        let mut v = VectorField::new(&g);
        let w = 2.0 * std::f64::consts::PI;
        g.full.for_each(|p| v.vx.data[p] = (w * g.zpts.at(p[2])).sin());

        let mut t = ScalarField::new(&g, "T");
        g.full.for_each(|p| t.f.data[p] = (w * g.xpts.at(p[0])).sin());

        let mut rhs_v = PlainVector::new(&g);
        let mut rhs_t = PlainScalar::new(&g);
        let mut sgs = Smagorinsky::new(&g);
        let ke = sgs.coupled(&g, &der, &v, &t, &mut rhs_v, &mut rhs_t);

        assert!(ke > 0.0);
        assert!(rhs_t.f.max_abs_region(g.core) > 0.0);
    }
}
