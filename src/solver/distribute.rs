//! Shipping shards from the coordinator to the workers.
//!
//! Only the coordinator holds the compiled system. Each other rank receives
//! a header `[n_entities, n_owned]`, its coefficient rows flattened
//! row-major, and its targets, then rebuilds the partition locally from the
//! entity count and the shared strategy.

use crate::compiler::RatingSystem;
use crate::error::{RankingError, Result};

use super::comm::{CommunicationBackend, COORDINATOR};
use super::partition::{Partition, PartitionStrategy, Shard};

const HEADER_LEN: usize = 2;

/// Coordinator side: send every other rank its shard and return our own.
pub fn scatter_shards(
    comm: &dyn CommunicationBackend,
    system: &RatingSystem,
    partition: &Partition,
) -> Result<Shard> {
    let _span = tracing::debug_span!("scatter_shards", workers = partition.n_ranks()).entered();

    for rank in 0..partition.n_ranks() {
        if rank == COORDINATOR {
            continue;
        }
        let shard = Shard::extract(system, partition, rank);
        let header = [shard.n_entities as i64, shard.len() as i64];
        let rows: Vec<i64> = shard.coeff_rows.concat();

        comm.send_counts(rank, &header)?;
        comm.send_counts(rank, &rows)?;
        comm.send_counts(rank, &shard.target)?;
        tracing::trace!(rank, owned = shard.len(), "shard sent");
    }

    Ok(Shard::extract(system, partition, COORDINATOR))
}

/// Worker side: receive this rank's shard from the coordinator.
pub fn receive_shard(
    comm: &dyn CommunicationBackend,
    strategy: PartitionStrategy,
) -> Result<(Partition, Shard)> {
    let header = comm.recv_counts(COORDINATOR, HEADER_LEN)?;
    let (n_entities, n_owned) = (header[0], header[1]);
    if n_entities <= 0 || n_owned <= 0 {
        return Err(RankingError::Comm(format!(
            "rank {} received malformed shard header {:?}",
            comm.rank(),
            header
        )));
    }
    let (n_entities, n_owned) = (n_entities as usize, n_owned as usize);

    // Same precondition check the coordinator ran, from our side.
    let partition = Partition::new(n_entities, comm.num_ranks(), strategy)?;
    let owned = partition.owned(comm.rank());
    if owned.len() != n_owned {
        return Err(RankingError::Config(format!(
            "rank {} expects {} entities under the {} partition, coordinator sent {}",
            comm.rank(),
            owned.len(),
            strategy,
            n_owned
        )));
    }

    let rows = comm.recv_counts(COORDINATOR, n_owned * n_entities)?;
    let target = comm.recv_counts(COORDINATOR, n_owned)?;
    let coeff_rows = rows.chunks(n_entities).map(<[i64]>::to_vec).collect();

    Ok((
        partition,
        Shard {
            n_entities,
            owned,
            coeff_rows,
            target,
        },
    ))
}
