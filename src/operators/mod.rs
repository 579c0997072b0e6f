//! Metric-aware finite-difference derivatives.
//!
//! [`Derivative`] computes first and second derivatives along each axis on
//! the stretched grid:
//!
//! ```text
//! d1:  D = ξ_x(i) · (F[i+1] − F[i−1]) · 1/(2dξ)
//! d2:  D = ξ_x²(i) · (F[i+1] − 2F[i] + F[i−1]) · 1/dξ²
//!        + ξ_xx(i) · (F[i+1] − F[i−1]) · 1/(2dξ)
//! ```
//!
//! Both overwrite the target over the core region only and read at most one
//! halo layer; the caller guarantees halos are current. The outermost index
//! is partitioned across rayon, with each task writing a disjoint x-slab.

use rayon::prelude::*;

use crate::field::Array3;
use crate::grid::Grid;
use crate::types::Axis;

#[derive(Clone, Copy, Debug)]
enum Op {
    First,
    Second,
}

/// Finite-difference operator bound to a grid's spacings.
#[derive(Clone, Copy, Debug)]
pub struct Derivative {
    i2h: [f64; 3],
    ih2: [f64; 3],
}

impl Derivative {
    pub fn new(grid: &Grid) -> Self {
        let d = [grid.dxi, grid.det, grid.dzt];
        Self {
            i2h: [0.5 / d[0], 0.5 / d[1], 0.5 / d[2]],
            ih2: [1.0 / (d[0] * d[0]), 1.0 / (d[1] * d[1]), 1.0 / (d[2] * d[2])],
        }
    }

    /// Inverse double spacing 1/(2dξ) along an axis.
    pub fn i2h(&self, axis: Axis) -> f64 {
        self.i2h[axis.idx()]
    }

    /// Inverse squared spacing 1/dξ² along an axis.
    pub fn ih2(&self, axis: Axis) -> f64 {
        self.ih2[axis.idx()]
    }

    /// First derivative along `axis`, written into `dst` over the core.
    pub fn d1(&self, grid: &Grid, axis: Axis, src: &Array3, dst: &mut Array3) {
        self.apply(grid, axis, src, dst, Op::First);
    }

    /// Second derivative along `axis`, written into `dst` over the core.
    pub fn d2(&self, grid: &Grid, axis: Axis, src: &Array3, dst: &mut Array3) {
        self.apply(grid, axis, src, dst, Op::Second);
    }

    fn apply(&self, grid: &Grid, axis: Axis, src: &Array3, dst: &mut Array3, op: Op) {
        debug_assert_eq!(src.lb(), dst.lb());
        debug_assert_eq!(src.extents(), dst.extents());

        let core = grid.core;
        let a = axis.idx();
        let i2h = self.i2h[a];
        let ih2 = self.ih2[a];
        let (m1, m2, mxx) = match axis {
            Axis::X => (&grid.xix, &grid.xix2, &grid.xixx),
            Axis::Y => (&grid.ety, &grid.ety2, &grid.etyy),
            Axis::Z => (&grid.ztz, &grid.ztz2, &grid.ztzz),
        };
        let ns = match axis {
            Axis::X => src.stride_x(),
            Axis::Y => src.stride_y(),
            Axis::Z => 1,
        };

        let s = src.as_slice();
        let lb = dst.lb();
        let slab = dst.slab_len();
        let sy = dst.stride_y();
        let z0 = (core.lo[2] - lb[2]) as usize;
        let nz = (core.hi[2] - core.lo[2] + 1) as usize;

        dst.as_mut_slice()
            .par_chunks_mut(slab)
            .enumerate()
            .for_each(|(n, out)| {
                let i = lb[0] + n as i32;
                if i < core.lo[0] || i > core.hi[0] {
                    return;
                }
                for j in core.lo[1]..=core.hi[1] {
                    let l0 = (j - lb[1]) as usize * sy + z0;
                    let g0 = n * slab + l0;
                    for kk in 0..nz {
                        let k = core.lo[2] + kk as i32;
                        let g = g0 + kk;
                        let c = match axis {
                            Axis::X => i,
                            Axis::Y => j,
                            Axis::Z => k,
                        };
                        out[l0 + kk] = match op {
                            Op::First => m1.at(c) * (s[g + ns] - s[g - ns]) * i2h,
                            Op::Second => {
                                m2.at(c) * (s[g + ns] - 2.0 * s[g] + s[g - ns]) * ih2
                                    + mxx.at(c) * (s[g + ns] - s[g - ns]) * i2h
                            }
                        };
                    }
                }
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Config, Stretching};
    use crate::types::Range3;

    fn sample(grid: &Grid, f: impl Fn(f64, f64, f64) -> f64) -> Array3 {
        let mut a = Array3::from_range(grid.full);
        grid.full.for_each(|p| {
            a[p] = f(grid.xpts.at(p[0]), grid.ypts.at(p[1]), grid.zpts.at(p[2]));
        });
        a
    }

    fn uniform_grid(n: usize) -> Grid {
        Grid::serial(Config {
            points: [n, n, n],
            lengths: [2.0, 1.0, 1.0],
            ..Config::default()
        })
        .unwrap()
    }

    #[test]
    fn test_d1_exact_on_linear() {
        let grid = uniform_grid(8);
        let der = Derivative::new(&grid);
        let f = sample(&grid, |x, _, _| 3.0 * x + 1.0);
        let mut d = Array3::from_range(grid.full);
        der.d1(&grid, Axis::X, &f, &mut d);
        grid.core.for_each(|p| {
            assert!((d[p] - 3.0).abs() < 1e-12, "at {p:?}: {}", d[p]);
        });
    }

    #[test]
    fn test_d2_exact_on_quadratic() {
        let grid = uniform_grid(8);
        let der = Derivative::new(&grid);
        let f = sample(&grid, |_, _, z| z * z);
        let mut d = Array3::from_range(grid.full);
        der.d2(&grid, Axis::Z, &f, &mut d);
        grid.core.for_each(|p| {
            assert!((d[p] - 2.0).abs() < 1e-10, "at {p:?}: {}", d[p]);
        });
    }

    #[test]
    fn test_core_only_writes() {
        let grid = uniform_grid(4);
        let der = Derivative::new(&grid);
        let f = sample(&grid, |x, y, z| x * y * z);
        let mut d = Array3::from_range(grid.full);
        d.fill(99.0);
        der.d1(&grid, Axis::Y, &f, &mut d);
        assert_eq!(d[[-1, 0, 0]], 99.0);
        assert_eq!(d[[0, -1, 0]], 99.0);
        assert_eq!(d[[4, 2, 2]], 99.0);
    }

    #[test]
    fn test_linearity_on_stretched_grid() {
        let grid = Grid::serial(Config {
            points: [6, 6, 12],
            stretch: [
                Stretching::Uniform,
                Stretching::Uniform,
                Stretching::Tanh { beta: 1.2 },
            ],
            ..Config::default()
        })
        .unwrap();
        let der = Derivative::new(&grid);

        let f = sample(&grid, |x, y, z| (x + 0.3 * y) * z);
        let g = sample(&grid, |x, _, z| x * x + z);
        let (a, b) = (2.5, -0.75);

        let mut combined = Array3::from_range(grid.full);
        combined.mult_add(a, &f);
        combined.mult_add(b, &g);

        for op in [0, 1] {
            let mut df = Array3::from_range(grid.full);
            let mut dg = Array3::from_range(grid.full);
            let mut dc = Array3::from_range(grid.full);
            if op == 0 {
                der.d1(&grid, Axis::Z, &f, &mut df);
                der.d1(&grid, Axis::Z, &g, &mut dg);
                der.d1(&grid, Axis::Z, &combined, &mut dc);
            } else {
                der.d2(&grid, Axis::Z, &f, &mut df);
                der.d2(&grid, Axis::Z, &g, &mut dg);
                der.d2(&grid, Axis::Z, &combined, &mut dc);
            }
            grid.core.for_each(|p| {
                let want = a * df[p] + b * dg[p];
                assert!(
                    (dc[p] - want).abs() < 1e-10 * (1.0 + want.abs()),
                    "op {op} at {p:?}: {} vs {want}",
                    dc[p]
                );
            });
        }
    }

    #[test]
    fn test_d1_sin_converges() {
        // second-order accuracy on a periodic sine
        let mut errs = Vec::new();
        for n in [16, 32] {
            let grid = Grid::serial(Config {
                points: [n, 4, 4],
                periodic: [true; 3],
                ..Config::default()
            })
            .unwrap();
            let der = Derivative::new(&grid);
            let w = 2.0 * std::f64::consts::PI;
            let f = sample(&grid, |x, _, _| (w * x).sin());
            let mut d = Array3::from_range(grid.full);
            der.d1(&grid, Axis::X, &f, &mut d);
            let mut err: f64 = 0.0;
            grid.core.for_each(|p| {
                let exact = w * (w * grid.xpts.at(p[0])).cos();
                err = err.max((d[p] - exact).abs());
            });
            errs.push(err);
        }
        let order = (errs[0] / errs[1]).log2();
        assert!(order > 1.9, "observed order {order:.2}");
    }

    #[test]
    fn test_spacing_helpers() {
        let grid = uniform_grid(4);
        let der = Derivative::new(&grid);
        let r = Range3::new([0, 0, 0], [3, 3, 3]);
        assert_eq!(grid.core, r);
        assert!((der.i2h(Axis::X) - 0.5 / grid.dxi).abs() < 1e-15);
        assert!((der.ih2(Axis::Z) - 1.0 / (grid.dzt * grid.dzt)).abs() < 1e-15);
    }
}
