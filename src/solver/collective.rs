//! Collective synchronization: the merge is an all-gather, the decision
//! stays with rank 0.
//!
//! Per round, after the local sweep every rank contributes its new local
//! values to one all-gather and comes out holding the full new vector. Only
//! the convergence test is centralized: workers send rank 0 their previous
//! local values and wait for its verdict.
//!
//! Every rank must own the same number of entities for the all-gather. The
//! classic layout is one entity per rank.

use crate::error::Result;

use super::comm::{CommunicationBackend, COORDINATOR};
use super::convergence::{self, Verdict};
use super::jacobi::WorkerState;
use super::partition::Partition;
use super::{round_cap_exceeded, RoundOutcome};

/// Iterate until the coordinator's verdict is `Converged`.
pub fn iterate(
    comm: &dyn CommunicationBackend,
    partition: &Partition,
    worker: &mut WorkerState,
    global: &mut Vec<f64>,
    tolerance: f64,
    max_rounds: usize,
) -> Result<RoundOutcome> {
    let rank = comm.rank();
    let n = partition.n_entities();
    let per_rank = partition.per_rank();
    let mut gathered = vec![0.0; n];
    let mut outcome = RoundOutcome::default();

    loop {
        outcome.rounds += 1;
        let round = outcome.rounds;
        let _span = tracing::debug_span!("round", round, rank).entered();

        worker.sweep(global);
        comm.all_gather(worker.current(), &mut gathered)?;
        let next = partition.rank_major_to_global(&gathered);

        let verdict = if rank == COORDINATOR {
            let mut previous = vec![0.0; n];
            partition.scatter_into(COORDINATOR, worker.previous(), &mut previous);
            for source in 1..partition.n_ranks() {
                let values = comm.recv_values(source, per_rank)?;
                partition.scatter_into(source, &values, &mut previous);
            }

            let verdict = convergence::check(&previous, &next, tolerance);
            outcome.max_delta = convergence::max_delta(&previous, &next);
            tracing::debug!(max_delta = outcome.max_delta, ?verdict, "round checked");

            for dest in 1..partition.n_ranks() {
                comm.send_verdict(dest, verdict)?;
            }
            outcome.messages += 2 * (partition.n_ranks() - 1);
            verdict
        } else {
            comm.send_values(COORDINATOR, worker.previous())?;
            comm.recv_verdict(COORDINATOR)?
        };

        *global = next;

        if verdict == Verdict::Converged {
            return Ok(outcome);
        }
        if round >= max_rounds {
            return Err(round_cap_exceeded(
                max_rounds,
                (rank == COORDINATOR).then_some(outcome.max_delta),
            ));
        }
    }
}
