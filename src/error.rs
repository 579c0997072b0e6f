//! Error types for solver construction and time advancement.

use thiserror::Error;

/// Errors surfaced by the solver and its collaborators.
///
/// Iterative non-convergence is reported as a structured value carrying the
/// rank, iteration count and last residual, leaving the abort decision to
/// the driver.
#[derive(Error, Debug)]
pub enum SolverError {
    /// Invalid or inconsistent configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The Jacobi iteration for one implicit diffusion unknown failed to
    /// reach the convergence tolerance within the iteration cap.
    #[error(
        "Jacobi iterations for solution of {unknown} not converging on rank {rank}: \
         residual {residual:.3e} after {iterations} iterations"
    )]
    JacobiNonConvergence {
        unknown: &'static str,
        rank: usize,
        iterations: usize,
        residual: f64,
    },

    /// The pressure Poisson solve failed to reach its tolerance.
    #[error("pressure Poisson solve not converging: residual {residual:.3e} after {sweeps} sweeps")]
    PoissonNonConvergence { sweeps: usize, residual: f64 },

    /// Time-series output failure.
    #[error("time-series I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
