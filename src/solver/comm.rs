//! Communication backend abstraction for the distributed solver.
//!
//! Provides a trait for blocking rank-to-rank messaging (ratings, shard
//! counts, control verdicts) and the all-gather collective, plus a no-op
//! single-process implementation.

use crate::error::{RankingError, Result};

use super::convergence::Verdict;

/// Rank that loads the input, checks convergence and prints results.
pub const COORDINATOR: usize = 0;

/// Abstraction over inter-process communication for the rating solver.
///
/// Every operation blocks until it has completed from the caller's point of
/// view. Receives are matched by source rank.
///
/// Implementations: `SingleProcessComm` (no-op), `LocalComm` (threads),
/// `MpiComm` (via mpi crate).
pub trait CommunicationBackend: Send {
    /// This process's rank.
    fn rank(&self) -> usize;

    /// Total number of ranks.
    fn num_ranks(&self) -> usize;

    /// Send rating values to `dest`.
    fn send_values(&self, dest: usize, values: &[f64]) -> Result<()>;

    /// Receive exactly `len` rating values from `source`.
    fn recv_values(&self, source: usize, len: usize) -> Result<Vec<f64>>;

    /// Send integer data (shard rows, sizes) to `dest`.
    fn send_counts(&self, dest: usize, counts: &[i64]) -> Result<()>;

    /// Receive exactly `len` integers from `source`.
    fn recv_counts(&self, source: usize, len: usize) -> Result<Vec<i64>>;

    /// Send a continue/stop control message to `dest`.
    fn send_verdict(&self, dest: usize, verdict: Verdict) -> Result<()>;

    /// Receive a control message from `source`.
    fn recv_verdict(&self, source: usize) -> Result<Verdict>;

    /// Collective: every rank contributes `local` (same length on every
    /// rank) and receives the rank-major concatenation in `gathered`.
    ///
    /// No rank returns until every rank has contributed.
    fn all_gather(&self, local: &[f64], gathered: &mut [f64]) -> Result<()>;
}

/// Check a received payload has the length the protocol expects.
pub(crate) fn expect_len(what: &str, source: usize, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(RankingError::Comm(format!(
            "expected {} {} from rank {}, received {}",
            expected, what, source, actual
        )));
    }
    Ok(())
}

/// No-op communication backend for single-process execution.
///
/// There are no peers: point-to-point operations report a protocol error
/// and the all-gather copies the local block through.
pub struct SingleProcessComm;

impl SingleProcessComm {
    fn no_peer(peer: usize) -> RankingError {
        RankingError::Comm(format!("rank {} does not exist in a single-process run", peer))
    }
}

impl CommunicationBackend for SingleProcessComm {
    fn rank(&self) -> usize {
        0
    }

    fn num_ranks(&self) -> usize {
        1
    }

    fn send_values(&self, dest: usize, _values: &[f64]) -> Result<()> {
        Err(Self::no_peer(dest))
    }

    fn recv_values(&self, source: usize, _len: usize) -> Result<Vec<f64>> {
        Err(Self::no_peer(source))
    }

    fn send_counts(&self, dest: usize, _counts: &[i64]) -> Result<()> {
        Err(Self::no_peer(dest))
    }

    fn recv_counts(&self, source: usize, _len: usize) -> Result<Vec<i64>> {
        Err(Self::no_peer(source))
    }

    fn send_verdict(&self, dest: usize, _verdict: Verdict) -> Result<()> {
        Err(Self::no_peer(dest))
    }

    fn recv_verdict(&self, source: usize) -> Result<Verdict> {
        Err(Self::no_peer(source))
    }

    fn all_gather(&self, local: &[f64], gathered: &mut [f64]) -> Result<()> {
        expect_len("gathered values", 0, gathered.len(), local.len())?;
        gathered.copy_from_slice(local);
        Ok(())
    }
}
