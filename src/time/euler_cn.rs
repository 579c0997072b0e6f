//! Explicit-Euler / Crank-Nicolson predictor-projection step.
//!
//! One step, in order: explicit half of diffusion, advection, forcing,
//! optional subgrid stress, pressure-gradient subtraction, Euler update of
//! the right-hand sides, halo sync, implicit diffusion solves per unknown,
//! divergence of the predicted velocity, pressure-correction Poisson solve,
//! pressure and velocity correction, boundary conditions.
//!
//! The ordering is normative: the Poisson RHS is computed only after the
//! implicit predictor completes, the velocity correction uses the freshly
//! solved pressure correction, and BCs are imposed last. Fields are in a
//! consistent state (halos current, BCs imposed) only at step boundaries.

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::SolverError;
use crate::field::{Array3, PlainScalar, PlainVector, ScalarField, VectorField};
use crate::grid::{Grid, LesModel};
use crate::io::TelemetrySink;
use crate::les::{Smagorinsky, SubgridClosure};
use crate::operators::Derivative;
use crate::poisson::{JacobiPressureSolver, PressureSolver};
use crate::source::{NullForcing, ScalarForcing, VelocityForcing};
use crate::types::Axis;

use rayon::prelude::*;

/// What one step reports back to the driver.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepDiagnostics {
    /// Jacobi iteration counts for Vx, Vy, Vz.
    pub jacobi_iterations: [usize; 3],
    /// Jacobi iteration count for the scalar solve, when one ran.
    pub scalar_iterations: Option<usize>,
    /// Subgrid kinetic energy, when the closure was active.
    pub subgrid_energy: Option<f64>,
}

/// The semi-implicit time integrator.
///
/// Owns all step scratch (allocated once at construction, reused every
/// step) and the collaborator objects: forcing closures, the optional
/// subgrid model and the pressure solver. Velocity, pressure and the
/// optional scalar are owned by the driver and lent per step.
///
/// # Example
/// ```ignore
/// let grid = Grid::serial(Config::default())?;
/// let mut solver = EulerCn::new(&grid, 1e-3, 1e-2, 1e-2)?;
/// let mut sink = NullSink;
/// solver.advance(&grid, &mut v, &mut p, &mut sink)?;
/// ```
pub struct EulerCn {
    dt: f64,
    time: f64,
    nu: f64,
    kappa: f64,
    cn_tolerance: f64,
    max_iterations: usize,
    les_onset: f64,

    der: Derivative,
    pool: ThreadPool,

    v_forcing: Box<dyn VelocityForcing>,
    t_forcing: Box<dyn ScalarForcing>,
    les: Option<Box<dyn SubgridClosure>>,
    pressure: Box<dyn PressureSolver>,

    // step scratch, sized from the grid once
    nse_rhs: PlainVector,
    tmp_rhs: PlainScalar,
    mg_rhs: PlainScalar,
    pp: PlainScalar,
    pressure_gradient: PlainVector,
    temp: Array3,
    der_tmp: Array3,
}

impl EulerCn {
    /// Build an integrator for a grid, step size and the two diffusivities.
    pub fn new(grid: &Grid, dt: f64, nu: f64, kappa: f64) -> Result<Self, SolverError> {
        if dt <= 0.0 {
            return Err(SolverError::InvalidConfig(format!(
                "time step must be positive, got {dt}"
            )));
        }
        if nu < 0.0 || kappa < 0.0 {
            return Err(SolverError::InvalidConfig(
                "diffusivities must be non-negative".into(),
            ));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(grid.conf.n_threads)
            .build()
            .map_err(|e| SolverError::InvalidConfig(e.to_string()))?;

        // Conservative cap on the Jacobi iteration count. The naive choice
        // Nx·Ny·Nz can stall a run for a very long time before aborting, so
        // the cube of the log is used instead, unless the configuration
        // overrides it.
        let points: usize = (0..3).map(|a| grid.core.size(Axis::ALL[a])).product();
        let max_iterations = grid
            .conf
            .max_sweeps
            .unwrap_or_else(|| (points as f64).ln().powi(3).ceil() as usize);

        let les: Option<Box<dyn SubgridClosure>> = match grid.conf.les_model {
            LesModel::None => None,
            _ => {
                if grid.rank() == 0 {
                    println!("LES switch is ON. Using Smagorinsky subgrid model");
                }
                Some(Box::new(Smagorinsky::new(grid)))
            }
        };

        Ok(Self {
            dt,
            time: 0.0,
            nu,
            kappa,
            cn_tolerance: grid.conf.cn_tolerance,
            max_iterations,
            les_onset: grid.conf.les_spinup_steps as f64 * dt,
            der: Derivative::new(grid),
            pool,
            v_forcing: Box::new(NullForcing),
            t_forcing: Box::new(NullForcing),
            les,
            pressure: Box::new(JacobiPressureSolver::new(grid)),
            nse_rhs: PlainVector::new(grid),
            tmp_rhs: PlainScalar::new(grid),
            mg_rhs: PlainScalar::new(grid),
            pp: PlainScalar::new(grid),
            pressure_gradient: PlainVector::new(grid),
            temp: Array3::from_range(grid.full),
            der_tmp: Array3::from_range(grid.full),
        })
    }

    pub fn with_forcing(mut self, forcing: Box<dyn VelocityForcing>) -> Self {
        self.v_forcing = forcing;
        self
    }

    pub fn with_scalar_forcing(mut self, forcing: Box<dyn ScalarForcing>) -> Self {
        self.t_forcing = forcing;
        self
    }

    pub fn with_les(mut self, closure: Box<dyn SubgridClosure>) -> Self {
        self.les = Some(closure);
        self
    }

    pub fn with_pressure_solver(mut self, solver: Box<dyn PressureSolver>) -> Self {
        self.pressure = solver;
        self
    }

    /// Set the solution time, e.g. when restarting from a checkpoint. Note
    /// that the subgrid model activates on solution time, so a restart past
    /// the spin-up window has it active immediately.
    pub fn with_start_time(mut self, time: f64) -> Self {
        self.time = time;
        self
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Iteration cap of the implicit diffusion solves.
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Advance velocity and pressure by one step.
    pub fn advance(
        &mut self,
        grid: &Grid,
        v: &mut VectorField,
        p: &mut ScalarField,
        sink: &mut dyn TelemetrySink,
    ) -> Result<StepDiagnostics, SolverError> {
        let mut diag = StepDiagnostics::default();
        let dt = self.dt;

        // explicit half of the diffusion term
        self.nse_rhs.fill(0.0);
        self.pool
            .install(|| v.compute_diff(grid, &self.der, &mut self.nse_rhs, &mut self.der_tmp));
        self.nse_rhs.scale(self.nu / 2.0);

        // advection, subtracted from the RHS
        {
            let v_ref: &VectorField = v;
            self.pool.install(|| {
                v_ref.compute_nlin(grid, &self.der, v_ref, &mut self.nse_rhs, &mut self.der_tmp)
            });
        }

        // body forces
        self.v_forcing.add_forcing(grid, v, None, &mut self.nse_rhs);

        // subgrid stress, once past the spin-up window
        if let Some(les) = &mut self.les {
            if self.time > self.les_onset {
                let ke = self
                    .pool
                    .install(|| les.momentum(grid, &self.der, v, &mut self.nse_rhs));
                sink.record_subgrid_energy(ke);
                diag.subgrid_energy = Some(ke);
            }
        }

        // pressure gradient of the previous step
        self.pressure_gradient.fill(0.0);
        self.pool.install(|| {
            p.gradient(grid, &self.der, &mut self.pressure_gradient, &mut self.der_tmp)
        });
        self.nse_rhs -= &self.pressure_gradient;

        // explicit Euler update: rhs <- dt·rhs + V
        self.nse_rhs.scale(dt);
        self.nse_rhs.add_vfield(v);
        self.nse_rhs.sync(grid);

        // implicit Crank-Nicolson solves for the predicted velocity
        diag.jacobi_iterations[0] = self.solve_vx(grid, v)?;
        if !grid.conf.planar {
            diag.jacobi_iterations[1] = self.solve_vy(grid, v)?;
        }
        diag.jacobi_iterations[2] = self.solve_vz(grid, v)?;

        self.project(grid, v, p)?;

        v.impose_bcs(grid);
        p.impose_bcs(grid);

        self.time += dt;
        Ok(diag)
    }

    /// Advance velocity, pressure and the transported scalar by one step.
    pub fn advance_scalar(
        &mut self,
        grid: &Grid,
        v: &mut VectorField,
        p: &mut ScalarField,
        t: &mut ScalarField,
        sink: &mut dyn TelemetrySink,
    ) -> Result<StepDiagnostics, SolverError> {
        let mut diag = StepDiagnostics::default();
        let dt = self.dt;

        // explicit halves of both diffusion terms
        self.nse_rhs.fill(0.0);
        self.tmp_rhs.fill(0.0);
        self.pool
            .install(|| v.compute_diff(grid, &self.der, &mut self.nse_rhs, &mut self.der_tmp));
        self.nse_rhs.scale(self.nu / 2.0);
        self.pool
            .install(|| t.compute_diff(grid, &self.der, &mut self.tmp_rhs, &mut self.der_tmp));
        self.tmp_rhs.scale(self.kappa / 2.0);

        // advection of momentum and scalar
        {
            let v_ref: &VectorField = v;
            let t_ref: &ScalarField = t;
            self.pool.install(|| {
                v_ref.compute_nlin(grid, &self.der, v_ref, &mut self.nse_rhs, &mut self.der_tmp);
                t_ref.compute_nlin(grid, &self.der, v_ref, &mut self.tmp_rhs, &mut self.der_tmp);
            });
        }

        // body forces on both equations
        self.v_forcing
            .add_forcing(grid, v, Some(t), &mut self.nse_rhs);
        self.t_forcing.add_forcing(grid, v, t, &mut self.tmp_rhs);

        // subgrid contributions, once past the spin-up window
        if let Some(les) = &mut self.les {
            if self.time > self.les_onset {
                let coupled = grid.conf.les_model == LesModel::Coupled;
                let ke = self.pool.install(|| {
                    if coupled {
                        les.coupled(
                            grid,
                            &self.der,
                            v,
                            t,
                            &mut self.nse_rhs,
                            &mut self.tmp_rhs,
                        )
                    } else {
                        les.momentum(grid, &self.der, v, &mut self.nse_rhs)
                    }
                });
                sink.record_subgrid_energy(ke);
                diag.subgrid_energy = Some(ke);
            }
        }

        // pressure gradient of the previous step
        self.pressure_gradient.fill(0.0);
        self.pool.install(|| {
            p.gradient(grid, &self.der, &mut self.pressure_gradient, &mut self.der_tmp)
        });
        self.nse_rhs -= &self.pressure_gradient;

        // explicit Euler updates
        self.nse_rhs.scale(dt);
        self.nse_rhs.add_vfield(v);
        self.tmp_rhs.scale(dt);
        self.tmp_rhs.add_field(&t.f);
        self.nse_rhs.sync(grid);
        self.tmp_rhs.sync(grid);

        // implicit Crank-Nicolson solves
        diag.jacobi_iterations[0] = self.solve_vx(grid, v)?;
        if !grid.conf.planar {
            diag.jacobi_iterations[1] = self.solve_vy(grid, v)?;
        }
        diag.jacobi_iterations[2] = self.solve_vz(grid, v)?;
        diag.scalar_iterations = Some(self.solve_t(grid, t)?);

        self.project(grid, v, p)?;

        v.impose_bcs(grid);
        p.impose_bcs(grid);
        t.impose_bcs(grid);

        self.time += dt;
        Ok(diag)
    }

    /// Pressure-correction projection: Poisson solve on the divergence of
    /// the predicted velocity, then correct P and V.
    fn project(
        &mut self,
        grid: &Grid,
        v: &mut VectorField,
        p: &mut ScalarField,
    ) -> Result<(), SolverError> {
        let dt = self.dt;

        {
            let v_ref: &VectorField = v;
            self.pool
                .install(|| v_ref.divergence(grid, &self.der, &mut self.mg_rhs, &mut self.der_tmp));
        }
        self.mg_rhs.scale(1.0 / dt);

        #[cfg(feature = "poisson-test")]
        self.mg_rhs.fill(1.0);

        {
            let pressure = &mut self.pressure;
            let pp = &mut self.pp;
            let mg_rhs = &self.mg_rhs;
            self.pool.install(|| pressure.solve(grid, pp, mg_rhs))?;
        }
        self.pp.sync(grid);

        #[cfg(feature = "poisson-test")]
        p.f.data.fill(0.0);

        *p += &self.pp;

        self.pressure_gradient.fill(0.0);
        self.pool.install(|| {
            self.pp
                .gradient(grid, &self.der, &mut self.pressure_gradient, &mut self.der_tmp)
        });
        self.pressure_gradient.scale(dt);
        *v -= &self.pressure_gradient;

        Ok(())
    }

    fn solve_vx(&mut self, grid: &Grid, v: &mut VectorField) -> Result<usize, SolverError> {
        let mut iterations = 0;
        loop {
            self.pool.install(|| {
                diffusion_sweep(
                    grid,
                    &self.der,
                    self.dt,
                    self.nu,
                    &v.vx.data,
                    &self.nse_rhs.x,
                    &mut self.temp,
                )
            });
            v.vx.data.assign_region(&self.temp, grid.core);
            v.impose_vx_bc(grid);

            let local = self.pool.install(|| {
                diffusion_residual_max(grid, &self.der, self.dt, self.nu, &v.vx.data, &self.nse_rhs.x)
            });
            let residual = grid.transport().all_reduce_max(local);
            if residual < self.cn_tolerance {
                return Ok(iterations);
            }

            iterations += 1;
            if iterations > self.max_iterations {
                return Err(SolverError::JacobiNonConvergence {
                    unknown: "Vx",
                    rank: grid.rank(),
                    iterations,
                    residual,
                });
            }
        }
    }

    fn solve_vy(&mut self, grid: &Grid, v: &mut VectorField) -> Result<usize, SolverError> {
        let mut iterations = 0;
        loop {
            self.pool.install(|| {
                diffusion_sweep(
                    grid,
                    &self.der,
                    self.dt,
                    self.nu,
                    &v.vy.data,
                    &self.nse_rhs.y,
                    &mut self.temp,
                )
            });
            v.vy.data.assign_region(&self.temp, grid.core);
            v.impose_vy_bc(grid);

            let local = self.pool.install(|| {
                diffusion_residual_max(grid, &self.der, self.dt, self.nu, &v.vy.data, &self.nse_rhs.y)
            });
            let residual = grid.transport().all_reduce_max(local);
            if residual < self.cn_tolerance {
                return Ok(iterations);
            }

            iterations += 1;
            if iterations > self.max_iterations {
                return Err(SolverError::JacobiNonConvergence {
                    unknown: "Vy",
                    rank: grid.rank(),
                    iterations,
                    residual,
                });
            }
        }
    }

    fn solve_vz(&mut self, grid: &Grid, v: &mut VectorField) -> Result<usize, SolverError> {
        let mut iterations = 0;
        loop {
            self.pool.install(|| {
                diffusion_sweep(
                    grid,
                    &self.der,
                    self.dt,
                    self.nu,
                    &v.vz.data,
                    &self.nse_rhs.z,
                    &mut self.temp,
                )
            });
            v.vz.data.assign_region(&self.temp, grid.core);
            v.impose_vz_bc(grid);

            let local = self.pool.install(|| {
                diffusion_residual_max(grid, &self.der, self.dt, self.nu, &v.vz.data, &self.nse_rhs.z)
            });
            let residual = grid.transport().all_reduce_max(local);
            if residual < self.cn_tolerance {
                return Ok(iterations);
            }

            iterations += 1;
            if iterations > self.max_iterations {
                return Err(SolverError::JacobiNonConvergence {
                    unknown: "Vz",
                    rank: grid.rank(),
                    iterations,
                    residual,
                });
            }
        }
    }

    fn solve_t(&mut self, grid: &Grid, t: &mut ScalarField) -> Result<usize, SolverError> {
        let mut iterations = 0;
        loop {
            self.pool.install(|| {
                diffusion_sweep(
                    grid,
                    &self.der,
                    self.dt,
                    self.kappa,
                    &t.f.data,
                    &self.tmp_rhs.f,
                    &mut self.temp,
                )
            });
            t.f.data.assign_region(&self.temp, grid.core);
            t.impose_bcs(grid);

            let local = self.pool.install(|| {
                diffusion_residual_max(grid, &self.der, self.dt, self.kappa, &t.f.data, &self.tmp_rhs.f)
            });
            let residual = grid.transport().all_reduce_max(local);
            if residual < self.cn_tolerance {
                return Ok(iterations);
            }

            iterations += 1;
            if iterations > self.max_iterations {
                return Err(SolverError::JacobiNonConvergence {
                    unknown: "T",
                    rank: grid.rank(),
                    iterations,
                    residual,
                });
            }
        }
    }
}

/// One Jacobi sweep for `(I − (dt·d/2)·∇²)φ = rhs`.
///
/// Off-diagonal neighbours of the Laplacian stay on the right-hand side;
/// the centre coefficient is absorbed into the denominator.
fn diffusion_sweep(
    grid: &Grid,
    der: &Derivative,
    dt: f64,
    diff: f64,
    src: &Array3,
    rhs: &Array3,
    out: &mut Array3,
) {
    let core = grid.core;
    let planar = grid.conf.planar;
    let half = 0.5 * dt * diff;
    let (sx, sy) = (src.stride_x(), src.stride_y());
    let s = src.as_slice();
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
                    let mut diag = xix2 * ihx2;
                    if !planar {
                        num += ihy2 * ety2 * (s[g + sy] + s[g - sy])
                            + i2hy * etyy * (s[g + sy] - s[g - sy]);
                        diag += ety2 * ihy2;
                    }
                    num += ihz2 * ztz2 * (s[g + 1] + s[g - 1])
                        + i2hz * ztzz * (s[g + 1] - s[g - 1]);
                    diag += ztz2 * ihz2;

                    slab_out[l0 + kk] = (num * half + r[g]) / (1.0 + dt * diff * diag);
                }
            }
        });
}

/// Local maximum of the Crank-Nicolson residual
/// `|φ − ((dt·d/2)·∇²φ + rhs)|` over the core, full Laplacian included.
fn diffusion_residual_max(
    grid: &Grid,
    der: &Derivative,
    dt: f64,
    diff: f64,
    src: &Array3,
    rhs: &Array3,
) -> f64 {
    let core = grid.core;
    let planar = grid.conf.planar;
    let half = 0.5 * dt * diff;
    let (sx, sy) = (src.stride_x(), src.stride_y());
    let s = src.as_slice();
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
                let g0 = src.index_of([i, j, core.lo[2]]);
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

                    m = m.max((s[g] - (half * lap + r[g])).abs());
                }
            }
            m
        })
        .reduce(|| 0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Config;
    use crate::io::NullSink;

    #[test]
    fn test_rest_state_is_a_fixed_point() {
        let grid = Grid::serial(Config {
            points: [8, 8, 8],
            periodic: [true; 3],
            ..Config::default()
        })
        .unwrap();
        let mut v = VectorField::new(&grid);
        let mut p = ScalarField::new(&grid, "P");
        let mut solver = EulerCn::new(&grid, 0.01, 0.01, 0.01).unwrap();
        let mut sink = NullSink;

        let diag = solver.advance(&grid, &mut v, &mut p, &mut sink).unwrap();

        assert_eq!(v.max_abs(&grid), 0.0);
        assert_eq!(p.max_abs(&grid), 0.0);
        assert_eq!(diag.jacobi_iterations, [0, 0, 0]);
        assert!((solver.time() - 0.01).abs() < 1e-15);
    }

    #[test]
    fn test_max_iterations_heuristic() {
        let grid = Grid::serial(Config {
            points: [8, 8, 8],
            periodic: [true; 3],
            ..Config::default()
        })
        .unwrap();
        let solver = EulerCn::new(&grid, 0.01, 0.01, 0.01).unwrap();
        // ⌈(ln 512)³⌉ = 243
        assert_eq!(solver.max_iterations(), 243);

        let grid = Grid::serial(Config {
            points: [8, 8, 8],
            periodic: [true; 3],
            max_sweeps: Some(17),
            ..Config::default()
        })
        .unwrap();
        let solver = EulerCn::new(&grid, 0.01, 0.01, 0.01).unwrap();
        assert_eq!(solver.max_iterations(), 17);
    }

    #[test]
    fn test_rejects_bad_time_step() {
        let grid = Grid::serial(Config::default()).unwrap();
        assert!(matches!(
            EulerCn::new(&grid, 0.0, 0.01, 0.01),
            Err(SolverError::InvalidConfig(_))
        ));
    }
}
