//! Power-rating solvers.
//!
//! The distributed solver runs one rank per worker. Rank 0 holds the
//! compiled system, ships each worker its shard, and checks convergence;
//! every rank runs Jacobi sweeps over its own rows and keeps a private
//! replica of the global rating vector, refreshed once per round by either
//! the point-to-point or the collective synchronization.

pub mod collective;
pub mod comm;
pub mod comm_local;
#[cfg(feature = "distributed")]
pub mod comm_mpi;
pub mod convergence;
pub mod cpu;
pub mod distribute;
pub mod jacobi;
pub mod partition;
pub mod point_to_point;

use std::fmt;
use std::str::FromStr;
use std::thread;

use crate::compiler::RatingSystem;
use crate::error::{RankingError, Result};

use comm::{CommunicationBackend, SingleProcessComm, COORDINATOR};
use comm_local::LocalComm;
use jacobi::WorkerState;
use partition::{Partition, PartitionStrategy};

/// Worker count used by the point-to-point variant when none is given.
pub const DEFAULT_WORKERS: usize = 8;

/// Round cap used when none is given.
pub const DEFAULT_MAX_ROUNDS: usize = 1000;

/// How ranks merge their partial updates each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    /// Workers send to rank 0, rank 0 sends the merged vector back.
    #[default]
    PointToPoint,
    /// One all-gather per round; only the verdict goes through rank 0.
    Collective,
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::PointToPoint => write!(f, "point-to-point"),
            Variant::Collective => write!(f, "collective"),
        }
    }
}

impl FromStr for Variant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "point-to-point" | "p2p" => Ok(Variant::PointToPoint),
            "collective" | "allgather" => Ok(Variant::Collective),
            other => Err(format!("unknown synchronization variant '{}'", other)),
        }
    }
}

/// Solver settings shared by every rank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveOptions {
    pub variant: Variant,
    /// Number of ranks. `None` picks the variant's default: `DEFAULT_WORKERS`
    /// for point-to-point, one per entity for collective.
    pub workers: Option<usize>,
    pub strategy: PartitionStrategy,
    pub tolerance: f64,
    pub initial_rating: f64,
    pub max_rounds: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            workers: None,
            strategy: PartitionStrategy::default(),
            tolerance: convergence::DEFAULT_TOLERANCE,
            initial_rating: jacobi::DEFAULT_INITIAL_RATING,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl SolveOptions {
    /// Rank count for a system of `n_entities`.
    pub fn worker_count(&self, n_entities: usize) -> usize {
        match (self.workers, self.variant) {
            (Some(w), _) => w,
            (None, Variant::PointToPoint) => DEFAULT_WORKERS,
            (None, Variant::Collective) => n_entities,
        }
    }

    /// Reject numeric settings the iteration cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(RankingError::Config(format!(
                "tolerance must be a positive number, got {}",
                self.tolerance
            )));
        }
        if !self.initial_rating.is_finite() {
            return Err(RankingError::Config(format!(
                "initial rating must be finite, got {}",
                self.initial_rating
            )));
        }
        if self.max_rounds == 0 {
            return Err(RankingError::Config("round cap must be at least 1".into()));
        }
        Ok(())
    }
}

/// Final ratings as reported by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingSolution {
    /// Rating per entity, in entity order.
    pub ratings: Vec<f64>,
    /// Rounds run, including the one that converged.
    pub rounds: usize,
    pub tolerance: f64,
    /// Point-to-point messages the coordinator sent or received while
    /// iterating (shard shipping excluded).
    pub messages: usize,
}

/// Counters one rank accumulates while iterating.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RoundOutcome {
    pub rounds: usize,
    /// Largest per-entity change of the last round. Coordinator only.
    pub max_delta: f64,
    /// Coordinator only.
    pub messages: usize,
}

pub(crate) fn round_cap_exceeded(max_rounds: usize, max_delta: Option<f64>) -> RankingError {
    let detail = match max_delta {
        Some(delta) => format!(" (largest change in the last round was {})", delta),
        None => String::new(),
    };
    RankingError::Solve(format!(
        "ratings did not converge within {} rounds{}",
        max_rounds, detail
    ))
}

/// A solver that turns a compiled system into ratings.
pub trait RatingSolver {
    fn solve(&self, system: &RatingSystem) -> Result<RatingSolution>;
}

/// Run the full protocol as one rank.
///
/// The coordinator passes the compiled system; every other rank passes
/// `None` and receives its rows over `comm`. Returns the solution on the
/// coordinator and `None` elsewhere.
pub fn run_rank(
    comm: &dyn CommunicationBackend,
    system: Option<&RatingSystem>,
    options: &SolveOptions,
) -> Result<Option<RatingSolution>> {
    let rank = comm.rank();
    let _span = tracing::info_span!("rank", rank).entered();
    options.validate()?;

    let (partition, shard) = if rank == COORDINATOR {
        let system = system.ok_or_else(|| {
            RankingError::Config("the coordinator needs the rating system".into())
        })?;
        let partition = Partition::new(system.size(), comm.num_ranks(), options.strategy)?;
        let shard = distribute::scatter_shards(comm, system, &partition)?;
        (partition, shard)
    } else {
        distribute::receive_shard(comm, options.strategy)?
    };

    let mut worker = WorkerState::new(shard, options.initial_rating)?;
    let mut global = vec![options.initial_rating; partition.n_entities()];
    tracing::debug!(owned = ?worker.owned(), "worker ready");

    let outcome = match options.variant {
        Variant::PointToPoint => point_to_point::iterate(
            comm,
            &partition,
            &mut worker,
            &mut global,
            options.tolerance,
            options.max_rounds,
        )?,
        Variant::Collective => collective::iterate(
            comm,
            &partition,
            &mut worker,
            &mut global,
            options.tolerance,
            options.max_rounds,
        )?,
    };

    if rank != COORDINATOR {
        return Ok(None);
    }
    tracing::info!(rounds = outcome.rounds, variant = %options.variant, "Jacobi converged");
    Ok(Some(RatingSolution {
        ratings: global,
        rounds: outcome.rounds,
        tolerance: options.tolerance,
        messages: outcome.messages,
    }))
}

/// Run every rank as a thread of this process and return the coordinator's
/// solution.
///
/// The partition precondition is checked before any rank starts.
pub fn solve_local(system: &RatingSystem, options: &SolveOptions) -> Result<RatingSolution> {
    let workers = options.worker_count(system.size());
    let _span = tracing::info_span!(
        "solve_local",
        variant = %options.variant,
        workers,
        entities = system.size()
    )
    .entered();

    options.validate()?;
    Partition::new(system.size(), workers, options.strategy)?;

    if workers == 1 {
        return run_rank(&SingleProcessComm, Some(system), options)?
            .ok_or_else(|| RankingError::Solve("coordinator produced no solution".into()));
    }

    let results: Vec<Result<Option<RatingSolution>>> = thread::scope(|s| {
        let handles: Vec<_> = LocalComm::new_group(workers)
            .into_iter()
            .map(|comm| {
                let system = (comm.rank() == COORDINATOR).then_some(system);
                s.spawn(move || run_rank(&comm, system, options))
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| {
                handle.join().unwrap_or_else(|_| {
                    Err(RankingError::Comm(format!("rank {} panicked", rank)))
                })
            })
            .collect()
    });

    collect_solution(results)
}

/// Pick the coordinator's solution, or the most telling error.
///
/// When one rank fails, its peers usually fail afterwards with a `Comm`
/// error because it hung up; the first non-`Comm` error is the cause.
fn collect_solution(results: Vec<Result<Option<RatingSolution>>>) -> Result<RatingSolution> {
    let mut solution = None;
    let mut root_cause = None;
    let mut first_comm = None;

    for result in results {
        match result {
            Ok(Some(s)) => solution = Some(s),
            Ok(None) => {}
            Err(e @ RankingError::Comm(_)) => {
                if first_comm.is_none() {
                    first_comm = Some(e);
                }
            }
            Err(e) => {
                if root_cause.is_none() {
                    root_cause = Some(e);
                }
            }
        }
    }

    if let Some(e) = root_cause.or(first_comm) {
        tracing::debug!(error = %e, "distributed solve failed");
        return Err(e);
    }
    solution.ok_or_else(|| RankingError::Solve("coordinator produced no solution".into()))
}

/// Distributed solver running its ranks as local threads.
pub struct LocalSolver {
    options: SolveOptions,
}

impl LocalSolver {
    pub fn new(options: SolveOptions) -> Self {
        Self { options }
    }
}

impl RatingSolver for LocalSolver {
    fn solve(&self, system: &RatingSystem) -> Result<RatingSolution> {
        solve_local(system, &self.options)
    }
}
