//! Entity partitioning and per-rank shards.
//!
//! A `Partition` is a fixed, disjoint assignment of entities to ranks that
//! every rank can recompute from `(N, W, strategy)` alone. A `Shard` is the
//! slice of the rating system a rank needs for its own rows.

use std::fmt;
use std::str::FromStr;

use crate::compiler::RatingSystem;
use crate::error::{RankingError, Result};
use crate::ir::EntityId;

/// Rule for assigning entities to ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionStrategy {
    /// Entity `i` goes to rank `i % W`: rank r owns r, r+W, r+2W, ...
    #[default]
    Strided,
    /// Rank r owns the contiguous run `[r*N/W, (r+1)*N/W)`.
    Block,
}

impl fmt::Display for PartitionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionStrategy::Strided => write!(f, "strided"),
            PartitionStrategy::Block => write!(f, "block"),
        }
    }
}

impl FromStr for PartitionStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strided" => Ok(PartitionStrategy::Strided),
            "block" => Ok(PartitionStrategy::Block),
            other => Err(format!("unknown partition strategy '{}'", other)),
        }
    }
}

/// Disjoint assignment of `n_entities` entities to `n_ranks` ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    n_entities: usize,
    n_ranks: usize,
    strategy: PartitionStrategy,
}

impl Partition {
    /// Validate the worker-count precondition and build the partition.
    ///
    /// Every rank must own the same number of entities, so `n_entities`
    /// must be a non-zero multiple of `n_ranks`.
    pub fn new(n_entities: usize, n_ranks: usize, strategy: PartitionStrategy) -> Result<Self> {
        if n_ranks == 0 {
            return Err(RankingError::Config("worker count must be at least 1".into()));
        }
        if n_entities == 0 {
            return Err(RankingError::Config("there are no entities to rate".into()));
        }
        if n_entities % n_ranks != 0 {
            return Err(RankingError::Config(format!(
                "{} entities cannot be split evenly across {} workers; \
                 the entity count must be a multiple of the worker count",
                n_entities, n_ranks
            )));
        }
        Ok(Self {
            n_entities,
            n_ranks,
            strategy,
        })
    }

    pub fn n_entities(&self) -> usize {
        self.n_entities
    }

    pub fn n_ranks(&self) -> usize {
        self.n_ranks
    }

    pub fn strategy(&self) -> PartitionStrategy {
        self.strategy
    }

    /// Entities owned by each rank.
    pub fn per_rank(&self) -> usize {
        self.n_entities / self.n_ranks
    }

    /// Rank owning entity `entity`.
    pub fn owner(&self, entity: EntityId) -> usize {
        match self.strategy {
            PartitionStrategy::Strided => entity % self.n_ranks,
            PartitionStrategy::Block => entity / self.per_rank(),
        }
    }

    /// Global id of the `local`-th entity owned by `rank`.
    pub fn global_index(&self, rank: usize, local: usize) -> EntityId {
        match self.strategy {
            PartitionStrategy::Strided => rank + local * self.n_ranks,
            PartitionStrategy::Block => rank * self.per_rank() + local,
        }
    }

    /// Entities owned by `rank`, in local order.
    pub fn owned(&self, rank: usize) -> Vec<EntityId> {
        (0..self.per_rank())
            .map(|local| self.global_index(rank, local))
            .collect()
    }

    /// Write one rank's local values into their global positions.
    pub fn scatter_into(&self, rank: usize, local: &[f64], global: &mut [f64]) {
        for (k, &value) in local.iter().enumerate() {
            global[self.global_index(rank, k)] = value;
        }
    }

    /// Reorder a rank-major concatenation (rank 0's values, then rank 1's,
    /// ...) into entity order.
    pub fn rank_major_to_global(&self, rank_major: &[f64]) -> Vec<f64> {
        let per_rank = self.per_rank();
        let mut global = vec![0.0; self.n_entities];
        for (rank, chunk) in rank_major.chunks(per_rank).enumerate() {
            self.scatter_into(rank, chunk, &mut global);
        }
        global
    }
}

/// The rows of the rating system owned by one rank.
#[derive(Debug, Clone, PartialEq)]
pub struct Shard {
    /// Size of the full system.
    pub n_entities: usize,
    /// Global ids of the owned entities, in local order.
    pub owned: Vec<EntityId>,
    /// Coefficient rows of the owned entities, each of length `n_entities`.
    pub coeff_rows: Vec<Vec<i64>>,
    /// Target values of the owned entities.
    pub target: Vec<i64>,
}

impl Shard {
    /// Cut the shard for `rank` out of the full system.
    pub fn extract(system: &RatingSystem, partition: &Partition, rank: usize) -> Self {
        let owned = partition.owned(rank);
        let coeff_rows = owned.iter().map(|&i| system.coeff.row(i).to_vec()).collect();
        let target = owned.iter().map(|&i| system.target[i]).collect();
        Self {
            n_entities: system.size(),
            owned,
            coeff_rows,
            target,
        }
    }

    pub fn len(&self) -> usize {
        self.owned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owned.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_complete(partition: &Partition) {
        let mut seen = vec![0usize; partition.n_entities()];
        for rank in 0..partition.n_ranks() {
            for entity in partition.owned(rank) {
                assert_eq!(partition.owner(entity), rank);
                seen[entity] += 1;
            }
        }
        assert!(
            seen.iter().all(|&c| c == 1),
            "entities owned other than exactly once: {:?}",
            seen
        );
    }

    #[test]
    fn every_entity_owned_exactly_once() {
        for strategy in [PartitionStrategy::Strided, PartitionStrategy::Block] {
            for (n, w) in [(32, 8), (8, 8), (4, 1), (12, 3), (12, 4), (6, 6), (30, 5)] {
                let partition = Partition::new(n, w, strategy).unwrap();
                assert_complete(&partition);
            }
        }
    }

    #[test]
    fn strided_matches_round_robin_layout() {
        let partition = Partition::new(32, 8, PartitionStrategy::Strided).unwrap();
        assert_eq!(partition.owned(0), vec![0, 8, 16, 24]);
        assert_eq!(partition.owned(3), vec![3, 11, 19, 27]);
    }

    #[test]
    fn block_owns_contiguous_runs() {
        let partition = Partition::new(12, 3, PartitionStrategy::Block).unwrap();
        assert_eq!(partition.owned(1), vec![4, 5, 6, 7]);
        assert_eq!(partition.owner(11), 2);
    }

    #[test]
    fn one_entity_per_rank_is_identity_for_both() {
        for strategy in [PartitionStrategy::Strided, PartitionStrategy::Block] {
            let partition = Partition::new(8, 8, strategy).unwrap();
            for rank in 0..8 {
                assert_eq!(partition.owned(rank), vec![rank]);
            }
        }
    }

    #[test]
    fn uneven_split_is_a_config_error() {
        let err = Partition::new(32, 7, PartitionStrategy::Strided).unwrap_err();
        match err {
            RankingError::Config(msg) => assert!(msg.contains("32 entities"), "{msg}"),
            other => panic!("expected Config error, got {:?}", other),
        }
        assert!(Partition::new(8, 0, PartitionStrategy::Block).is_err());
        assert!(Partition::new(0, 2, PartitionStrategy::Block).is_err());
    }

    #[test]
    fn rank_major_reorders_into_entity_order() {
        let partition = Partition::new(6, 3, PartitionStrategy::Strided).unwrap();
        // rank 0 owns {0, 3}, rank 1 owns {1, 4}, rank 2 owns {2, 5}
        let rank_major = [0.0, 3.0, 1.0, 4.0, 2.0, 5.0];
        assert_eq!(
            partition.rank_major_to_global(&rank_major),
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]
        );
    }

    #[test]
    fn strategy_parses_case_insensitively() {
        assert_eq!("Block".parse::<PartitionStrategy>(), Ok(PartitionStrategy::Block));
        assert!("diagonal".parse::<PartitionStrategy>().is_err());
    }
}
