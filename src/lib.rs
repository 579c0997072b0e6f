//! # fdns-rs
//!
//! A finite-difference library for direct numerical simulation of the
//! incompressible Navier-Stokes equations on structured, stretched 3-D
//! grids, with an optional transported scalar for Boussinesq convection.
//!
//! This crate provides the core building blocks for semi-implicit
//! projection solvers:
//! - Padded field storage with core/wall bookkeeping and halo sync
//! - Metric-aware finite-difference operators on stretched grids
//! - Boundary-condition objects per sub-domain face
//! - Explicit-Euler / Crank-Nicolson time integration with Jacobi
//!   diffusion solves and pressure-correction projection
//! - Forcing closures (buoyancy, rotation) and a Smagorinsky subgrid model
//! - Time-series statistics (energy, divergence, Nusselt, Reynolds)
//!
//! Distributed runs are abstracted behind the [`comm::Transport`] trait;
//! the built-in [`comm::LocalTransport`] covers single-process runs, with
//! pads wrapping periodically onto the sub-domain itself.

pub mod boundary;
pub mod comm;
pub mod error;
pub mod field;
pub mod grid;
pub mod io;
pub mod les;
pub mod operators;
pub mod poisson;
pub mod source;
pub mod time;
pub mod types;

// Re-export main types for convenience
pub use boundary::{Dirichlet, Neumann, NoSlip, WallBC, WallSet};
pub use comm::{LocalTransport, Transport};
pub use error::SolverError;
pub use field::{Array3, Field, PlainScalar, PlainVector, ScalarField, VectorField};
pub use grid::{Config, Grid, LesModel, Stretching};
pub use io::{NullSink, StepRecord, TelemetrySink, TimeSeries};
pub use les::{Smagorinsky, SubgridClosure};
pub use operators::Derivative;
pub use poisson::{JacobiPressureSolver, PressureSolver};
pub use source::{Buoyancy, Coriolis, NullForcing, ScalarForcing, VelocityForcing};
pub use time::{EulerCn, StepDiagnostics};
pub use types::{Axis, Face, Range3};
