//! Body forces for the momentum and scalar equations.
//!
//! Forcing closures accumulate into the right-hand-side buffers of the time
//! step. Implementations must be thread-safe (`Send + Sync`); they run once
//! per step outside the parallel stencil kernels.
//!
//! Available forcings:
//!
//! | Forcing | Equation term |
//! |---------|---------------|
//! | [`NullForcing`] | none |
//! | [`Buoyancy`] | `+ c·T ẑ` (Boussinesq) |
//! | [`Coriolis`] | `− f ẑ × V` (f-plane) |

use crate::field::{PlainScalar, PlainVector, ScalarField, VectorField};
use crate::grid::Grid;

/// A body force on the momentum equation.
pub trait VelocityForcing: Send + Sync {
    /// Accumulate the force into `rhs` over the core. `temperature` is
    /// available when the solver runs with an active scalar.
    fn add_forcing(
        &self,
        grid: &Grid,
        v: &VectorField,
        temperature: Option<&ScalarField>,
        rhs: &mut PlainVector,
    );

    /// Name of this forcing for debugging and logging.
    fn name(&self) -> &'static str;
}

/// A source term on the scalar equation.
pub trait ScalarForcing: Send + Sync {
    fn add_forcing(
        &self,
        grid: &Grid,
        v: &VectorField,
        temperature: &ScalarField,
        rhs: &mut PlainScalar,
    );

    fn name(&self) -> &'static str;
}

/// No forcing at all.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullForcing;

impl VelocityForcing for NullForcing {
    fn add_forcing(
        &self,
        _grid: &Grid,
        _v: &VectorField,
        _temperature: Option<&ScalarField>,
        _rhs: &mut PlainVector,
    ) {
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

impl ScalarForcing for NullForcing {
    fn add_forcing(
        &self,
        _grid: &Grid,
        _v: &VectorField,
        _temperature: &ScalarField,
        _rhs: &mut PlainScalar,
    ) {
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

/// Boussinesq buoyancy: the temperature field pushes on the vertical
/// momentum component, `rhs_z += coefficient · T`.
///
/// In the usual convection non-dimensionalisations the coefficient is 1
/// (free-fall units) or `Ra·Pr` (diffusion units).
#[derive(Clone, Copy, Debug)]
pub struct Buoyancy {
    pub coefficient: f64,
}

impl Buoyancy {
    pub fn new(coefficient: f64) -> Self {
        Self { coefficient }
    }
}

impl VelocityForcing for Buoyancy {
    fn add_forcing(
        &self,
        grid: &Grid,
        _v: &VectorField,
        temperature: Option<&ScalarField>,
        rhs: &mut PlainVector,
    ) {
        let Some(t) = temperature else {
            return;
        };
        let core = grid.core;
        core.for_each(|p| {
            rhs.z[p] += self.coefficient * t.f.data[p];
        });
    }

    fn name(&self) -> &'static str {
        "buoyancy"
    }
}

/// f-plane rotation about the vertical axis: `rhs += −f ẑ × V`, i.e.
/// `rhs_x += f·Vy`, `rhs_y −= f·Vx`.
#[derive(Clone, Copy, Debug)]
pub struct Coriolis {
    pub f: f64,
}

impl Coriolis {
    pub fn new(f: f64) -> Self {
        Self { f }
    }
}

impl VelocityForcing for Coriolis {
    fn add_forcing(
        &self,
        grid: &Grid,
        v: &VectorField,
        _temperature: Option<&ScalarField>,
        rhs: &mut PlainVector,
    ) {
        let core = grid.core;
        core.for_each(|p| {
            rhs.x[p] += self.f * v.vy.data[p];
            rhs.y[p] -= self.f * v.vx.data[p];
        });
    }

    fn name(&self) -> &'static str {
        "coriolis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Config;

    fn grid() -> Grid {
        Grid::serial(Config {
            points: [4, 4, 4],
            ..Config::default()
        })
        .unwrap()
    }

    #[test]
    fn test_buoyancy_pushes_vertical_component() {
        let g = grid();
        let v = VectorField::new(&g);
        let mut t = ScalarField::new(&g, "T");
        t.f.data.fill(0.5);

        let mut rhs = PlainVector::new(&g);
        Buoyancy::new(2.0).add_forcing(&g, &v, Some(&t), &mut rhs);

        assert_eq!(rhs.z[[1, 1, 1]], 1.0);
        assert_eq!(rhs.x[[1, 1, 1]], 0.0);
        // pads are not forced
        assert_eq!(rhs.z[[-1, 1, 1]], 0.0);
    }

    #[test]
    fn test_buoyancy_without_scalar_is_inert() {
        let g = grid();
        let v = VectorField::new(&g);
        let mut rhs = PlainVector::new(&g);
        Buoyancy::new(2.0).add_forcing(&g, &v, None, &mut rhs);
        assert_eq!(rhs.z[[1, 1, 1]], 0.0);
    }

    #[test]
    fn test_coriolis_antisymmetry() {
        let g = grid();
        let mut v = VectorField::new(&g);
        v.vx.data.fill(1.0);
        v.vy.data.fill(2.0);

        let mut rhs = PlainVector::new(&g);
        Coriolis::new(0.1).add_forcing(&g, &v, None, &mut rhs);

        assert!((rhs.x[[1, 1, 1]] - 0.2).abs() < 1e-15);
        assert!((rhs.y[[1, 1, 1]] + 0.1).abs() < 1e-15);
        assert_eq!(rhs.z[[1, 1, 1]], 0.0);
    }
}
