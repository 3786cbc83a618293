//! Worker-side Jacobi sweep.
//!
//! Each worker owns a `WorkerState` built from its shard. One sweep reads the
//! previous round's full rating vector and produces new values for the owned
//! entities only; nothing written in a round is read in the same round.

use crate::error::{RankingError, Result};
use crate::ir::EntityId;

use super::partition::Shard;

/// Rating every entity starts from.
pub const DEFAULT_INITIAL_RATING: f64 = 100.0;

/// One worker's private rows and its last two local estimates.
#[derive(Debug, Clone)]
pub struct WorkerState {
    owned: Vec<EntityId>,
    coeff_rows: Vec<Vec<i64>>,
    target: Vec<i64>,
    played: Vec<i64>,
    /// Local estimates from the round before the latest sweep.
    previous: Vec<f64>,
    /// Local estimates from the latest sweep.
    current: Vec<f64>,
}

impl WorkerState {
    /// Build the worker from its shard, seeding both estimate buffers with
    /// `initial_rating`.
    ///
    /// Fails if an owned entity has no games.
    pub fn new(shard: Shard, initial_rating: f64) -> Result<Self> {
        let played: Vec<i64> = shard.coeff_rows.iter().map(|row| row.iter().sum()).collect();
        if let Some(k) = played.iter().position(|&p| p <= 0) {
            return Err(RankingError::Solve(format!(
                "entity {} has played no games; its rating is undefined",
                shard.owned[k] + 1
            )));
        }

        let n_owned = shard.owned.len();
        Ok(Self {
            owned: shard.owned,
            coeff_rows: shard.coeff_rows,
            target: shard.target,
            played,
            previous: vec![initial_rating; n_owned],
            current: vec![initial_rating; n_owned],
        })
    }

    pub fn owned(&self) -> &[EntityId] {
        &self.owned
    }

    /// Latest local estimates, in local order.
    pub fn current(&self) -> &[f64] {
        &self.current
    }

    /// Local estimates from the round before the latest sweep.
    pub fn previous(&self) -> &[f64] {
        &self.previous
    }

    /// Run one Jacobi sweep against the previous round's global vector.
    ///
    /// `new[k] = (sum_j coeff[k][j] * global[j] + target[k]) / played[k]`
    pub fn sweep(&mut self, global: &[f64]) {
        std::mem::swap(&mut self.previous, &mut self.current);
        for (k, value) in self.current.iter_mut().enumerate() {
            *value = update(&self.coeff_rows[k], global, self.target[k], self.played[k]);
        }
    }
}

/// The Jacobi update for a single entity row.
pub fn update(coeff_row: &[i64], global: &[f64], target: i64, played: i64) -> f64 {
    let weighted: f64 = coeff_row
        .iter()
        .zip(global)
        .map(|(&c, &r)| c as f64 * r)
        .sum();
    (weighted + target as f64) / played as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shard() -> Shard {
        // Entities 0 and 2 of a 3-entity system.
        Shard {
            n_entities: 3,
            owned: vec![0, 2],
            coeff_rows: vec![vec![0, 2, 1], vec![1, 1, 0]],
            target: vec![-3, -1],
        }
    }

    #[test]
    fn sweep_applies_the_update_rule() {
        let mut worker = WorkerState::new(shard(), DEFAULT_INITIAL_RATING).unwrap();
        let global = [100.0, 110.0, 90.0];
        worker.sweep(&global);
        // (2*110 + 90 - 3) / 3, (100 + 110 - 1) / 2
        assert!((worker.current()[0] - 307.0 / 3.0).abs() < 1e-12);
        assert!((worker.current()[1] - 104.5).abs() < 1e-12);
        assert_eq!(worker.previous(), &[100.0, 100.0]);
    }

    #[test]
    fn sweep_is_deterministic() {
        let global = [101.25, 97.5, 100.125];
        let mut a = WorkerState::new(shard(), DEFAULT_INITIAL_RATING).unwrap();
        let mut b = WorkerState::new(shard(), DEFAULT_INITIAL_RATING).unwrap();
        a.sweep(&global);
        b.sweep(&global);
        assert_eq!(a.current(), b.current());
        for (x, y) in a.current().iter().zip(b.current()) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn sweep_reads_only_the_supplied_vector() {
        // A second sweep against the same global vector gives the same
        // values: the worker's own fresh estimates are not fed back.
        let global = [100.0, 110.0, 90.0];
        let mut worker = WorkerState::new(shard(), DEFAULT_INITIAL_RATING).unwrap();
        worker.sweep(&global);
        let first = worker.current().to_vec();
        worker.sweep(&global);
        assert_eq!(worker.current(), first.as_slice());
        assert_eq!(worker.previous(), first.as_slice());
    }

    #[test]
    fn idle_owned_entity_is_rejected() {
        let mut s = shard();
        s.coeff_rows[1] = vec![0, 0, 0];
        let err = WorkerState::new(s, DEFAULT_INITIAL_RATING).unwrap_err();
        match err {
            RankingError::Solve(msg) => assert!(msg.contains("entity 3"), "{msg}"),
            other => panic!("expected Solve error, got {:?}", other),
        }
    }
}
