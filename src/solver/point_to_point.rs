//! Point-to-point synchronization: every round is routed through rank 0.
//!
//! Per round, after the local sweep:
//!
//! 1. each worker sends rank 0 its new local values, then its previous ones;
//! 2. rank 0 places its own values directly, assembles both full vectors in
//!    partition order, and runs the convergence test;
//! 3. rank 0 sends every worker the verdict followed by the new global
//!    vector, one worker at a time;
//! 4. each worker blocks on that verdict and vector before sweeping again.

use crate::error::Result;

use super::comm::{CommunicationBackend, COORDINATOR};
use super::convergence::{self, Verdict};
use super::jacobi::WorkerState;
use super::partition::Partition;
use super::{round_cap_exceeded, RoundOutcome};

/// Iterate until the coordinator's verdict is `Converged`.
///
/// `global` holds this rank's replica of the rating vector and is replaced
/// wholesale each round.
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
    let mut outcome = RoundOutcome::default();

    loop {
        outcome.rounds += 1;
        let round = outcome.rounds;
        let _span = tracing::debug_span!("round", round, rank).entered();

        worker.sweep(global);

        let verdict = if rank == COORDINATOR {
            let mut next = vec![0.0; n];
            let mut previous = vec![0.0; n];
            partition.scatter_into(COORDINATOR, worker.current(), &mut next);
            partition.scatter_into(COORDINATOR, worker.previous(), &mut previous);

            for source in 1..partition.n_ranks() {
                let values = comm.recv_values(source, per_rank)?;
                partition.scatter_into(source, &values, &mut next);
            }
            for source in 1..partition.n_ranks() {
                let values = comm.recv_values(source, per_rank)?;
                partition.scatter_into(source, &values, &mut previous);
            }

            let verdict = convergence::check(&previous, &next, tolerance);
            outcome.max_delta = convergence::max_delta(&previous, &next);
            tracing::debug!(max_delta = outcome.max_delta, ?verdict, "round checked");

            for dest in 1..partition.n_ranks() {
                comm.send_verdict(dest, verdict)?;
                comm.send_values(dest, &next)?;
            }
            outcome.messages += 4 * (partition.n_ranks() - 1);

            *global = next;
            verdict
        } else {
            comm.send_values(COORDINATOR, worker.current())?;
            comm.send_values(COORDINATOR, worker.previous())?;
            let verdict = comm.recv_verdict(COORDINATOR)?;
            *global = comm.recv_values(COORDINATOR, n)?;
            verdict
        };

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
