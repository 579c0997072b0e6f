//! Time integration.
//!
//! [`EulerCn`] advances the solution with explicit Euler on advection and
//! forcing and semi-implicit Crank-Nicolson on diffusion, followed by a
//! pressure-correction projection that restores the divergence-free
//! constraint.

mod euler_cn;

pub use euler_cn::{EulerCn, StepDiagnostics};
