//! Sub-domain geometry: extents, spacings, metric arrays and configuration.
//!
//! A [`Grid`] owns everything the stencil kernels need to know about the
//! local sub-domain: the core and padded index ranges, the uniform
//! computational spacings, the per-index metric lines of the coordinate
//! stretching, and the [`Transport`] handle used for halo exchange and
//! reductions.
//!
//! Index convention per axis with `n` core points:
//! - periodic: `x_i = i·h`, `h = L/n`, pads wrap around;
//! - wall-bounded: `x_i = (i+1)·h`, `h = L/(n+1)`, so the wall slices at
//!   `i = −1` and `i = n` sit exactly on the domain boundary.

mod stretching;

pub use stretching::Stretching;

use std::sync::Arc;

use crate::comm::{LocalTransport, Transport};
use crate::error::SolverError;
use crate::types::{Axis, Range3};

/// Which subgrid-stress closure calls the time core makes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LesModel {
    /// No subgrid model.
    None,
    /// Momentum-only closure.
    Momentum,
    /// Coupled momentum + scalar closure.
    Coupled,
}

/// Solver configuration bundle.
///
/// Carried by the grid and read by the time core, mirroring how the rest of
/// the crate treats the grid as the single source of run-level truth.
#[derive(Clone, Debug)]
pub struct Config {
    /// Core points per axis on this rank.
    pub points: [usize; 3],
    /// Physical domain lengths.
    pub lengths: [f64; 3],
    /// Per-axis periodicity.
    pub periodic: [bool; 3],
    /// Per-axis coordinate stretching.
    pub stretch: [Stretching; 3],
    /// Runtime 2-D mode: operators and solves skip the y axis entirely.
    pub planar: bool,
    /// Threads for the shared-memory tier.
    pub n_threads: usize,
    /// Convergence tolerance of the implicit diffusion solves.
    pub cn_tolerance: f64,
    /// Subgrid-stress model selection.
    pub les_model: LesModel,
    /// Steps before the subgrid model activates. The closure is switched on
    /// once the solution time exceeds `les_spinup_steps · dt`, so a restart
    /// with a large start time has it active from the first step.
    pub les_spinup_steps: usize,
    /// Override for the Jacobi iteration cap. `None` selects the
    /// `⌈(ln(Nx·Ny·Nz))³⌉` heuristic on the local core sizes.
    pub max_sweeps: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            points: [16, 16, 16],
            lengths: [1.0, 1.0, 1.0],
            periodic: [false; 3],
            stretch: [Stretching::Uniform; 3],
            planar: false,
            n_threads: 1,
            cn_tolerance: 1e-10,
            les_model: LesModel::None,
            les_spinup_steps: 5,
            max_sweeps: None,
        }
    }
}

/// A per-index line of metric (or coordinate) values over the padded range
/// of one axis.
#[derive(Clone, Debug)]
pub struct Metric {
    values: Vec<f64>,
    lb: i32,
}

impl Metric {
    #[inline]
    pub fn at(&self, i: i32) -> f64 {
        self.values[(i - self.lb) as usize]
    }
}

/// Geometry and configuration of the local sub-domain.
pub struct Grid {
    pub conf: Config,
    /// Halo width on every face.
    pub pad: usize,
    /// Index range updated by the PDE solves.
    pub core: Range3,
    /// Full padded index range of sub-domain arrays.
    pub full: Range3,

    /// Computational spacings dξ, dη, dζ.
    pub dxi: f64,
    pub det: f64,
    pub dzt: f64,

    // Metric lines ξ_x, (ξ_x)², ξ_xx per axis, padded range.
    pub xix: Metric,
    pub xix2: Metric,
    pub xixx: Metric,
    pub ety: Metric,
    pub ety2: Metric,
    pub etyy: Metric,
    pub ztz: Metric,
    pub ztz2: Metric,
    pub ztzz: Metric,

    // Physical coordinates per axis, padded range.
    pub xpts: Metric,
    pub ypts: Metric,
    pub zpts: Metric,

    transport: Arc<dyn Transport>,
}

impl Grid {
    /// Build a grid over a user-supplied transport.
    pub fn new(conf: Config, transport: Arc<dyn Transport>) -> Result<Self, SolverError> {
        validate(&conf)?;

        let n = conf.points;
        let core = Range3::new([0, 0, 0], [n[0] as i32 - 1, n[1] as i32 - 1, n[2] as i32 - 1]);
        let full = Range3::new(
            [-1, -1, -1],
            [n[0] as i32, n[1] as i32, n[2] as i32],
        );

        let (dxi, x_line) = axis_lines(&conf, Axis::X);
        let (det, y_line) = axis_lines(&conf, Axis::Y);
        let (dzt, z_line) = axis_lines(&conf, Axis::Z);
        let [xpts, xix, xix2, xixx] = x_line;
        let [ypts, ety, ety2, etyy] = y_line;
        let [zpts, ztz, ztz2, ztzz] = z_line;

        Ok(Self {
            conf,
            pad: 1,
            core,
            full,
            dxi,
            det,
            dzt,
            xix,
            xix2,
            xixx,
            ety,
            ety2,
            etyy,
            ztz,
            ztz2,
            ztzz,
            xpts,
            ypts,
            zpts,
            transport,
        })
    }

    /// Build a single-rank grid; the whole domain is the sub-domain.
    pub fn serial(conf: Config) -> Result<Self, SolverError> {
        let transport = Arc::new(LocalTransport::new(conf.periodic));
        Self::new(conf, transport)
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn rank(&self) -> usize {
        self.transport.rank()
    }

    pub fn n_ranks(&self) -> usize {
        self.transport.n_ranks()
    }

    /// Core point count along one axis.
    pub fn core_size(&self, axis: Axis) -> usize {
        self.core.size(axis)
    }

    /// The axes touched by derivatives and solves: y is skipped in planar
    /// mode.
    pub fn active_axes(&self) -> &'static [Axis] {
        if self.conf.planar {
            &[Axis::X, Axis::Z]
        } else {
            &[Axis::X, Axis::Y, Axis::Z]
        }
    }

    /// Physical cell volume attributed to a core point.
    pub fn cell_volume(&self, p: [i32; 3]) -> f64 {
        let dx = self.dxi / self.xix.at(p[0]);
        let dy = self.det / self.ety.at(p[1]);
        let dz = self.dzt / self.ztz.at(p[2]);
        dx * dy * dz
    }

    /// Total physical volume of the global domain.
    pub fn domain_volume(&self) -> f64 {
        self.conf.lengths.iter().product()
    }

    pub fn coords(&self, axis: Axis) -> &Metric {
        match axis {
            Axis::X => &self.xpts,
            Axis::Y => &self.ypts,
            Axis::Z => &self.zpts,
        }
    }
}

fn validate(conf: &Config) -> Result<(), SolverError> {
    for (a, axis) in Axis::ALL.iter().enumerate() {
        let min = if conf.planar && *axis == Axis::Y { 1 } else { 2 };
        if conf.points[a] < min {
            return Err(SolverError::InvalidConfig(format!(
                "axis {axis:?} needs at least {min} points, got {}",
                conf.points[a]
            )));
        }
        if conf.lengths[a] <= 0.0 {
            return Err(SolverError::InvalidConfig(format!(
                "axis {axis:?} length must be positive, got {}",
                conf.lengths[a]
            )));
        }
        if conf.periodic[a] && conf.stretch[a] != Stretching::Uniform {
            return Err(SolverError::InvalidConfig(format!(
                "axis {axis:?}: stretching is only supported on wall-bounded axes"
            )));
        }
        if let Stretching::Tanh { beta } = conf.stretch[a] {
            if beta <= 0.0 {
                return Err(SolverError::InvalidConfig(format!(
                    "axis {axis:?}: tanh stretching needs beta > 0, got {beta}"
                )));
            }
        }
    }
    if conf.n_threads == 0 {
        return Err(SolverError::InvalidConfig("n_threads must be >= 1".into()));
    }
    if conf.cn_tolerance <= 0.0 {
        return Err(SolverError::InvalidConfig(
            "cn_tolerance must be positive".into(),
        ));
    }
    Ok(())
}

/// Computational spacing and the four per-index lines (coordinates, ξ_x,
/// (ξ_x)², ξ_xx) of one axis, evaluated over the padded index range.
fn axis_lines(conf: &Config, axis: Axis) -> (f64, [Metric; 4]) {
    let a = axis.idx();
    let n = conf.points[a];
    let len = conf.lengths[a];
    let periodic = conf.periodic[a];
    let d = if periodic {
        1.0 / n as f64
    } else {
        1.0 / (n + 1) as f64
    };

    let lb = -1_i32;
    let count = n + 2;
    let mut pts = Vec::with_capacity(count);
    let mut m1 = Vec::with_capacity(count);
    let mut m2 = Vec::with_capacity(count);
    let mut mxx = Vec::with_capacity(count);
    for i in lb..(n as i32 + 1) {
        let xi = if periodic {
            i as f64 * d
        } else {
            (i + 1) as f64 * d
        };
        let (x, xi_x, xi_xx) = conf.stretch[a].eval(xi, len);
        pts.push(x);
        m1.push(xi_x);
        m2.push(xi_x * xi_x);
        mxx.push(xi_xx);
    }

    let line = |values: Vec<f64>| Metric { values, lb };
    (d, [line(pts), line(m1), line(m2), line(mxx)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_grid_ranges() {
        let conf = Config {
            points: [8, 4, 6],
            ..Config::default()
        };
        let g = Grid::serial(conf).unwrap();
        assert_eq!(g.core, Range3::new([0, 0, 0], [7, 3, 5]));
        assert_eq!(g.full, Range3::new([-1, -1, -1], [8, 4, 6]));
        assert_eq!(g.n_ranks(), 1);
    }

    #[test]
    fn test_wall_axis_places_boundary_on_wall_slice() {
        let conf = Config {
            points: [4, 4, 4],
            lengths: [2.0, 1.0, 1.0],
            ..Config::default()
        };
        let g = Grid::serial(conf).unwrap();
        // wall slices at i = -1 and i = n sit on x = 0 and x = L
        assert!(g.xpts.at(-1).abs() < 1e-14);
        assert!((g.xpts.at(4) - 2.0).abs() < 1e-14);
        // uniform interior spacing L/(n+1)
        let h = 2.0 / 5.0;
        assert!((g.xpts.at(1) - g.xpts.at(0) - h).abs() < 1e-14);
    }

    #[test]
    fn test_periodic_axis_spacing() {
        let conf = Config {
            points: [8, 8, 8],
            periodic: [true; 3],
            ..Config::default()
        };
        let g = Grid::serial(conf).unwrap();
        assert!((g.dxi - 0.125).abs() < 1e-14);
        assert!(g.xpts.at(0).abs() < 1e-14);
        // pad coordinate continues the uniform line past the seam
        assert!((g.xpts.at(8) - 1.0).abs() < 1e-14);
    }

    #[test]
    fn test_metrics_positive_over_padded_range() {
        let conf = Config {
            points: [8, 8, 16],
            stretch: [
                Stretching::Uniform,
                Stretching::Uniform,
                Stretching::Tanh { beta: 1.3 },
            ],
            ..Config::default()
        };
        let g = Grid::serial(conf).unwrap();
        for i in -1..=16 {
            assert!(g.ztz2.at(i) > 0.0, "ztz2 must stay positive at {i}");
        }
    }

    #[test]
    fn test_planar_active_axes() {
        let conf = Config {
            points: [8, 1, 8],
            planar: true,
            ..Config::default()
        };
        let g = Grid::serial(conf).unwrap();
        assert_eq!(g.active_axes(), &[Axis::X, Axis::Z]);
    }

    #[test]
    fn test_rejects_stretched_periodic_axis() {
        let conf = Config {
            periodic: [true, false, false],
            stretch: [
                Stretching::Tanh { beta: 1.0 },
                Stretching::Uniform,
                Stretching::Uniform,
            ],
            ..Config::default()
        };
        assert!(matches!(
            Grid::serial(conf),
            Err(SolverError::InvalidConfig(_))
        ));
    }
}
