//! MPI communication backend for the distributed solver.
//!
//! Requires the `distributed` feature flag and an MPI installation.
//! Implements `CommunicationBackend` using `mpi::traits::*`: blocking
//! point-to-point sends and receives matched by source rank, and
//! `MPI_Allgather` for the collective variant.
//!
//! # Usage
//!
//! The caller must initialize MPI before constructing `MpiComm` and keep the
//! universe alive for the whole run:
//!
//! ```ignore
//! let universe = mpi::initialize().expect("MPI init failed");
//! let comm = MpiComm::new();
//! ```
//!
//! Ratings, shard integers and verdicts travel on separate tags, so a
//! control message can never be mistaken for data.

use super::comm::{expect_len, CommunicationBackend};
use super::convergence::Verdict;
use crate::error::{RankingError, Result};
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

const TAG_VALUES: i32 = 1;
const TAG_COUNTS: i32 = 2;
const TAG_VERDICT: i32 = 3;

/// MPI-based communication backend.
///
/// Wraps the MPI world communicator. Requires `mpi::initialize()` to have
/// been called before construction.
pub struct MpiComm;

impl MpiComm {
    /// Create a new MPI communication backend.
    pub fn new() -> Self {
        Self
    }

    /// Terminate every process in the world with `code`.
    ///
    /// Used by the coordinator when the input cannot be loaded, since the
    /// other ranks have no input of their own to notice it.
    pub fn abort(&self, code: i32) -> ! {
        SimpleCommunicator::world().abort(code)
    }
}

impl Default for MpiComm {
    fn default() -> Self {
        Self::new()
    }
}

impl CommunicationBackend for MpiComm {
    fn rank(&self) -> usize {
        let world = SimpleCommunicator::world();
        world.rank() as usize
    }

    fn num_ranks(&self) -> usize {
        let world = SimpleCommunicator::world();
        world.size() as usize
    }

    fn send_values(&self, dest: usize, values: &[f64]) -> Result<()> {
        let world = SimpleCommunicator::world();
        world
            .process_at_rank(dest as i32)
            .send_with_tag(values, TAG_VALUES);
        Ok(())
    }

    fn recv_values(&self, source: usize, len: usize) -> Result<Vec<f64>> {
        let world = SimpleCommunicator::world();
        let (values, _status) = world
            .process_at_rank(source as i32)
            .receive_vec_with_tag::<f64>(TAG_VALUES);
        expect_len("values", source, len, values.len())?;
        Ok(values)
    }

    fn send_counts(&self, dest: usize, counts: &[i64]) -> Result<()> {
        let world = SimpleCommunicator::world();
        world
            .process_at_rank(dest as i32)
            .send_with_tag(counts, TAG_COUNTS);
        Ok(())
    }

    fn recv_counts(&self, source: usize, len: usize) -> Result<Vec<i64>> {
        let world = SimpleCommunicator::world();
        let (counts, _status) = world
            .process_at_rank(source as i32)
            .receive_vec_with_tag::<i64>(TAG_COUNTS);
        expect_len("counts", source, len, counts.len())?;
        Ok(counts)
    }

    fn send_verdict(&self, dest: usize, verdict: Verdict) -> Result<()> {
        let world = SimpleCommunicator::world();
        world
            .process_at_rank(dest as i32)
            .send_with_tag(&verdict.code(), TAG_VERDICT);
        Ok(())
    }

    fn recv_verdict(&self, source: usize) -> Result<Verdict> {
        let world = SimpleCommunicator::world();
        let (code, _status) = world
            .process_at_rank(source as i32)
            .receive_with_tag::<u8>(TAG_VERDICT);
        Verdict::from_code(code).ok_or_else(|| {
            RankingError::Comm(format!("rank {} sent unknown verdict code {}", source, code))
        })
    }

    fn all_gather(&self, local: &[f64], gathered: &mut [f64]) -> Result<()> {
        let world = SimpleCommunicator::world();
        expect_len(
            "gathered values",
            world.rank() as usize,
            local.len() * world.size() as usize,
            gathered.len(),
        )?;
        world.all_gather_into(local, gathered);
        Ok(())
    }
}
