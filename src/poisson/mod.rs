//! Pressure-correction Poisson solve.
//!
//! The projection step needs `∇²Pp = rhs` solved to the collaborator's own
//! tolerance; the time core only assumes that a successful return means
//! "solved". [`JacobiPressureSolver`] is the reference implementation: a
//! damped point-Jacobi iteration on the metric-aware seven-point stencil,
//! with zero-gradient walls on non-periodic axes and halo wrap on periodic
//! ones.
//!
//! The discrete problem is singular (pressure is defined up to a constant,
//! and with pure Neumann/periodic boundaries the RHS must have zero mean).
//! The solver projects the RHS onto the solvable subspace by removing its
//! global mean before iterating.

use rayon::prelude::*;

use crate::error::SolverError;
use crate::field::{Array3, PlainScalar};
use crate::grid::Grid;
use crate::operators::Derivative;
use crate::types::Axis;

/// The Poisson-solver contract consumed by the time core.
pub trait PressureSolver: Send {
    /// Solve `∇²p = rhs` in place; `p` enters holding the initial guess.
    fn solve(&mut self, grid: &Grid, p: &mut PlainScalar, rhs: &PlainScalar)
        -> Result<(), SolverError>;

    /// Name of this solver for debugging and logging.
    fn name(&self) -> &'static str;
}

/// Damped point-Jacobi solver on the metric stencil.
///
/// Damping keeps the highest-frequency (checkerboard) mode contracting; the
/// undamped iteration is neutrally stable on it for periodic boxes.
pub struct JacobiPressureSolver {
    pub tolerance: f64,
    pub max_sweeps: usize,
    pub omega: f64,
    der: Derivative,
    temp: Array3,
    rhs_balanced: Array3,
}

impl JacobiPressureSolver {
    pub fn new(grid: &Grid) -> Self {
        Self {
            tolerance: 1e-8,
            max_sweeps: 20_000,
            omega: 0.8,
            der: Derivative::new(grid),
            temp: Array3::from_range(grid.full),
            rhs_balanced: Array3::from_range(grid.full),
        }
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_max_sweeps(mut self, max_sweeps: usize) -> Self {
        self.max_sweeps = max_sweeps;
        self
    }

    /// Zero-gradient walls plus halo wrap, applied between sweeps.
    fn refresh_boundaries(&self, grid: &Grid, p: &mut PlainScalar) {
        for &axis in grid.active_axes() {
            if grid.conf.periodic[axis.idx()] {
                continue;
            }
            let a = axis.idx();
            p.f.copy_plane(axis, grid.core.lo[a], grid.core.lo[a] - 1);
            p.f.copy_plane(axis, grid.core.hi[a], grid.core.hi[a] + 1);
        }
        p.sync(grid);
    }
}

impl PressureSolver for JacobiPressureSolver {
    fn solve(
        &mut self,
        grid: &Grid,
        p: &mut PlainScalar,
        rhs: &PlainScalar,
    ) -> Result<(), SolverError> {
        let core = grid.core;

        // solvability: remove the global mean of the RHS
        let local_sum = rhs.f.sum_region(core);
        let local_count = core.count() as f64;
        let mean = grid.transport().all_reduce_sum(local_sum)
            / grid.transport().all_reduce_sum(local_count);
        self.rhs_balanced.assign(&rhs.f);
        core.for_each(|q| self.rhs_balanced[q] -= mean);

        self.refresh_boundaries(grid, p);

        let mut sweeps = 0;
        loop {
            let residual = residual_max(grid, &self.der, &p.f, &self.rhs_balanced);
            let residual = grid.transport().all_reduce_max(residual);
            if residual < self.tolerance {
                return Ok(());
            }
            if sweeps >= self.max_sweeps {
                return Err(SolverError::PoissonNonConvergence { sweeps, residual });
            }

            jacobi_sweep(grid, &self.der, self.omega, &p.f, &self.rhs_balanced, &mut self.temp);
            p.f.assign_region(&self.temp, core);
            self.refresh_boundaries(grid, p);
            sweeps += 1;
        }
    }

    fn name(&self) -> &'static str {
        "jacobi"
    }
}

/// One damped Jacobi sweep for `∇²p = rhs`: the centre coefficient is moved
/// to the denominator, neighbours stay on the right.
fn jacobi_sweep(
    grid: &Grid,
    der: &Derivative,
    omega: f64,
    p: &Array3,
    rhs: &Array3,
    out: &mut Array3,
) {
    let core = grid.core;
    let planar = grid.conf.planar;
    let (sx, sy) = (p.stride_x(), p.stride_y());
    let s = p.as_slice();
    let r = rhs.as_slice();
    let lb = out.lb();
    let slab = out.slab_len();
    let osy = out.stride_y();
    let z0 = (core.lo[2] - lb[2]) as usize;
    let nz = (core.hi[2] - core.lo[2] + 1) as usize;

    let (i2hx, i2hy, i2hz) = (der.i2h(Axis::X), der.i2h(Axis::Y), der.i2h(Axis::Z));
    let (ihx2, ihy2, ihz2) = (der.ih2(Axis::X), der.ih2(Axis::Y), der.ih2(Axis::Z));

    out.as_mut_slice()
        .par_chunks_mut(slab)
        .enumerate()
        .for_each(|(n, slab_out)| {
            let i = lb[0] + n as i32;
            if i < core.lo[0] || i > core.hi[0] {
                return;
            }
            let xix2 = grid.xix2.at(i);
            let xixx = grid.xixx.at(i);
            for j in core.lo[1]..=core.hi[1] {
                let ety2 = grid.ety2.at(j);
                let etyy = grid.etyy.at(j);
                let l0 = (j - lb[1]) as usize * osy + z0;
                let g0 = n * slab + l0;
                for kk in 0..nz {
                    let k = core.lo[2] + kk as i32;
                    let g = g0 + kk;
                    let ztz2 = grid.ztz2.at(k);
                    let ztzz = grid.ztzz.at(k);

                    let mut num = ihx2 * xix2 * (s[g + sx] + s[g - sx])
                        + i2hx * xixx * (s[g + sx] - s[g - sx]);
                    let mut diag = 2.0 * xix2 * ihx2;
                    if !planar {
                        num += ihy2 * ety2 * (s[g + sy] + s[g - sy])
                            + i2hy * etyy * (s[g + sy] - s[g - sy]);
                        diag += 2.0 * ety2 * ihy2;
                    }
                    num += ihz2 * ztz2 * (s[g + 1] + s[g - 1])
                        + i2hz * ztzz * (s[g + 1] - s[g - 1]);
                    diag += 2.0 * ztz2 * ihz2;

                    slab_out[l0 + kk] = (1.0 - omega) * s[g] + omega * (num - r[g]) / diag;
                }
            }
        });
}

/// Local maximum of `|∇²p − rhs|` over the core.
fn residual_max(grid: &Grid, der: &Derivative, p: &Array3, rhs: &Array3) -> f64 {
    let core = grid.core;
    let planar = grid.conf.planar;
    let (sx, sy) = (p.stride_x(), p.stride_y());
    let s = p.as_slice();
    let r = rhs.as_slice();

    let (i2hx, i2hy, i2hz) = (der.i2h(Axis::X), der.i2h(Axis::Y), der.i2h(Axis::Z));
    let (ihx2, ihy2, ihz2) = (der.ih2(Axis::X), der.ih2(Axis::Y), der.ih2(Axis::Z));

    (core.lo[0]..=core.hi[0])
        .into_par_iter()
        .map(|i| {
            let xix2 = grid.xix2.at(i);
            let xixx = grid.xixx.at(i);
            let mut m: f64 = 0.0;
            for j in core.lo[1]..=core.hi[1] {
                let ety2 = grid.ety2.at(j);
                let etyy = grid.etyy.at(j);
                let g0 = p.index_of([i, j, core.lo[2]]);
                for kk in 0..core.size(Axis::Z) {
                    let k = core.lo[2] + kk as i32;
                    let g = g0 + kk;
                    let ztz2 = grid.ztz2.at(k);
                    let ztzz = grid.ztzz.at(k);

                    let mut lap = ihx2 * xix2 * (s[g + sx] - 2.0 * s[g] + s[g - sx])
                        + i2hx * xixx * (s[g + sx] - s[g - sx]);
                    if !planar {
                        lap += ihy2 * ety2 * (s[g + sy] - 2.0 * s[g] + s[g - sy])
                            + i2hy * etyy * (s[g + sy] - s[g - sy]);
                    }
                    lap += ihz2 * ztz2 * (s[g + 1] - 2.0 * s[g] + s[g - 1])
                        + i2hz * ztzz * (s[g + 1] - s[g - 1]);

                    m = m.max((lap - r[g]).abs());
                }
            }
            m
        })
        .reduce(|| 0.0, f64::max)
}
