//! Halo transport and global reductions.
//!
//! The solver never sends messages itself; it reaches the distributed tier
//! through the [`Transport`] trait, which bundles the two collectives the
//! time core needs: pad-layer exchange with face neighbours and max/sum
//! reductions over all ranks.
//!
//! [`LocalTransport`] is the single-rank implementation: reductions are the
//! identity and the pad exchange degenerates to the periodic wrap-around of
//! the sub-domain onto itself. The partition metadata is deliberately laid
//! out so that an rsmpi-backed transport can implement the same trait with
//! `MPI_Sendrecv` per face and `MPI_Allreduce` without touching the core.

use crate::field::Array3;
use crate::types::{Axis, Range3};

/// Neighbour exchange and reductions for one processor topology.
///
/// All methods are collective: every rank must call them in the same order.
pub trait Transport: Send + Sync {
    /// Rank of the calling process.
    fn rank(&self) -> usize;

    /// Total number of ranks.
    fn n_ranks(&self) -> usize;

    /// Update the pad layers of a sub-domain array from the core cells of
    /// its face neighbours. Blocking; collective within the neighbour set.
    fn sync_halos(&self, data: &mut Array3, core: Range3, pad: usize);

    /// Global maximum of a per-rank value.
    fn all_reduce_max(&self, local: f64) -> f64;

    /// Global sum of a per-rank value.
    fn all_reduce_sum(&self, local: f64) -> f64;
}

/// Single-process transport.
///
/// Periodic axes wrap the sub-domain onto itself; non-periodic pads are left
/// to the boundary-condition objects.
#[derive(Clone, Debug)]
pub struct LocalTransport {
    periodic: [bool; 3],
}

impl LocalTransport {
    pub fn new(periodic: [bool; 3]) -> Self {
        Self { periodic }
    }
}

impl Transport for LocalTransport {
    fn rank(&self) -> usize {
        0
    }

    fn n_ranks(&self) -> usize {
        1
    }

    fn sync_halos(&self, data: &mut Array3, core: Range3, pad: usize) {
        // Axis by axis, so edge and corner pads pick up already-wrapped
        // values from the previous axis, as a staged MPI exchange would.
        for axis in Axis::ALL {
            if !self.periodic[axis.idx()] {
                continue;
            }
            let a = axis.idx();
            let (lo, hi) = (core.lo[a], core.hi[a]);
            for k in 0..pad as i32 {
                data.copy_plane(axis, hi - k, lo - 1 - k);
                data.copy_plane(axis, lo + k, hi + 1 + k);
            }
        }
    }

    fn all_reduce_max(&self, local: f64) -> f64 {
        local
    }

    fn all_reduce_sum(&self, local: f64) -> f64 {
        local
    }
}
