//! In-process communication backend: one thread per rank.
//!
//! Ranks share no rating state. Point-to-point messages travel over a full
//! mesh of zero-capacity channels, so a send completes only once the peer
//! has taken the message (rendezvous). Each rank keeps one receiver per
//! source, which gives MPI's match-by-source semantics.
//!
//! The all-gather is a barrier-bracketed exchange through per-rank slots:
//! nobody leaves until every rank has contributed, and nobody may start the
//! next gather until every rank has read the current one.
//!
//! A rank that drops its `LocalComm` (normally at the end of its run, or on
//! an error) disconnects its channels and marks the gather group departed,
//! so peers blocked on it get a `Comm` error instead of hanging.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use crate::error::{RankingError, Result};

use super::comm::{expect_len, CommunicationBackend};
use super::convergence::Verdict;

/// A message on a rank-to-rank channel.
#[derive(Debug)]
enum Packet {
    Values(Vec<f64>),
    Counts(Vec<i64>),
    Verdict(Verdict),
}

impl Packet {
    fn kind(&self) -> &'static str {
        match self {
            Packet::Values(_) => "values",
            Packet::Counts(_) => "counts",
            Packet::Verdict(_) => "verdict",
        }
    }
}

/// State of the all-gather shared by the group.
#[derive(Default)]
struct GatherState {
    /// Incremented each time a gather completes.
    generation: u64,
    arrived: usize,
    slots: Vec<Vec<f64>>,
    /// Result of the latest completed gather, while it is being read.
    result: Vec<f64>,
    readers_left: usize,
    departed: bool,
}

struct GatherGroup {
    state: Mutex<GatherState>,
    cv: Condvar,
}

impl GatherGroup {
    fn lock(&self) -> Result<MutexGuard<'_, GatherState>> {
        self.state
            .lock()
            .map_err(|_| RankingError::Comm("all-gather state poisoned".into()))
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, GatherState>) -> Result<MutexGuard<'a, GatherState>> {
        self.cv
            .wait(guard)
            .map_err(|_| RankingError::Comm("all-gather state poisoned".into()))
    }
}

/// Thread-backed communication backend for one rank of a local group.
pub struct LocalComm {
    rank: usize,
    size: usize,
    /// `senders[dest]`; `None` at this rank's own index.
    senders: Vec<Option<SyncSender<Packet>>>,
    /// `receivers[source]`; `None` at this rank's own index.
    receivers: Vec<Option<Receiver<Packet>>>,
    gather: Arc<GatherGroup>,
}

impl LocalComm {
    /// Build a fully connected group of `size` ranks. Element `r` of the
    /// returned vector is rank `r`'s endpoint; move each into its own thread.
    pub fn new_group(size: usize) -> Vec<LocalComm> {
        let mut senders: Vec<Vec<Option<SyncSender<Packet>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        let mut receivers: Vec<Vec<Option<Receiver<Packet>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();

        for source in 0..size {
            for dest in 0..size {
                if source != dest {
                    let (tx, rx) = sync_channel(0);
                    senders[source][dest] = Some(tx);
                    receivers[dest][source] = Some(rx);
                }
            }
        }

        let gather = Arc::new(GatherGroup {
            state: Mutex::new(GatherState {
                slots: vec![Vec::new(); size],
                ..GatherState::default()
            }),
            cv: Condvar::new(),
        });

        senders
            .into_iter()
            .zip(receivers)
            .enumerate()
            .map(|(rank, (senders, receivers))| LocalComm {
                rank,
                size,
                senders,
                receivers,
                gather: Arc::clone(&gather),
            })
            .collect()
    }

    fn send(&self, dest: usize, packet: Packet) -> Result<()> {
        let tx = self
            .senders
            .get(dest)
            .and_then(Option::as_ref)
            .ok_or_else(|| self.bad_peer(dest))?;
        let kind = packet.kind();
        tx.send(packet).map_err(|_| {
            RankingError::Comm(format!(
                "rank {} hung up before accepting {} from rank {}",
                dest, kind, self.rank
            ))
        })
    }

    fn recv(&self, source: usize) -> Result<Packet> {
        let rx = self
            .receivers
            .get(source)
            .and_then(Option::as_ref)
            .ok_or_else(|| self.bad_peer(source))?;
        rx.recv().map_err(|_| {
            RankingError::Comm(format!(
                "rank {} hung up while rank {} was waiting on it",
                source, self.rank
            ))
        })
    }

    fn bad_peer(&self, peer: usize) -> RankingError {
        RankingError::Comm(format!(
            "rank {} cannot message rank {} (group of {})",
            self.rank, peer, self.size
        ))
    }

    fn unexpected(&self, source: usize, wanted: &str, got: &Packet) -> RankingError {
        RankingError::Comm(format!(
            "rank {} expected {} from rank {}, received {}",
            self.rank,
            wanted,
            source,
            got.kind()
        ))
    }
}

impl CommunicationBackend for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn num_ranks(&self) -> usize {
        self.size
    }

    fn send_values(&self, dest: usize, values: &[f64]) -> Result<()> {
        self.send(dest, Packet::Values(values.to_vec()))
    }

    fn recv_values(&self, source: usize, len: usize) -> Result<Vec<f64>> {
        match self.recv(source)? {
            Packet::Values(values) => {
                expect_len("values", source, len, values.len())?;
                Ok(values)
            }
            other => Err(self.unexpected(source, "values", &other)),
        }
    }

    fn send_counts(&self, dest: usize, counts: &[i64]) -> Result<()> {
        self.send(dest, Packet::Counts(counts.to_vec()))
    }

    fn recv_counts(&self, source: usize, len: usize) -> Result<Vec<i64>> {
        match self.recv(source)? {
            Packet::Counts(counts) => {
                expect_len("counts", source, len, counts.len())?;
                Ok(counts)
            }
            other => Err(self.unexpected(source, "counts", &other)),
        }
    }

    fn send_verdict(&self, dest: usize, verdict: Verdict) -> Result<()> {
        self.send(dest, Packet::Verdict(verdict))
    }

    fn recv_verdict(&self, source: usize) -> Result<Verdict> {
        match self.recv(source)? {
            Packet::Verdict(verdict) => Ok(verdict),
            other => Err(self.unexpected(source, "verdict", &other)),
        }
    }

    fn all_gather(&self, local: &[f64], gathered: &mut [f64]) -> Result<()> {
        expect_len("gathered values", self.rank, local.len() * self.size, gathered.len())?;

        let group = &self.gather;
        let mut state = group.lock()?;

        // The previous gather is still being read by someone.
        while state.readers_left > 0 && !state.departed {
            state = group.wait(state)?;
        }
        if state.departed {
            return Err(RankingError::Comm(format!(
                "rank {} entered all-gather after a peer left the group",
                self.rank
            )));
        }

        state.slots[self.rank] = local.to_vec();
        state.arrived += 1;
        let generation = state.generation;

        if state.arrived == self.size {
            let mut result = Vec::with_capacity(gathered.len());
            for slot in state.slots.iter_mut() {
                expect_len("gathered values", self.rank, local.len(), slot.len())?;
                result.append(slot);
            }
            state.result = result;
            state.arrived = 0;
            state.readers_left = self.size;
            state.generation += 1;
            group.cv.notify_all();
        } else {
            while state.generation == generation {
                if state.departed {
                    return Err(RankingError::Comm(format!(
                        "a peer left the group while rank {} was in all-gather",
                        self.rank
                    )));
                }
                state = group.wait(state)?;
            }
        }

        gathered.copy_from_slice(&state.result);
        state.readers_left -= 1;
        if state.readers_left == 0 {
            state.result.clear();
            group.cv.notify_all();
        }
        Ok(())
    }
}

impl Drop for LocalComm {
    fn drop(&mut self) {
        if let Ok(mut state) = self.gather.state.lock() {
            state.departed = true;
        }
        self.gather.cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn point_to_point_round_trip() {
        let mut group = LocalComm::new_group(2);
        let one = group.pop().unwrap();
        let zero = group.pop().unwrap();

        let handle = thread::spawn(move || {
            let values = one.recv_values(0, 3).unwrap();
            one.send_counts(0, &[values.len() as i64]).unwrap();
            one.recv_verdict(0).unwrap()
        });

        zero.send_values(1, &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(zero.recv_counts(1, 1).unwrap(), vec![3]);
        zero.send_verdict(1, Verdict::Converged).unwrap();
        assert_eq!(handle.join().unwrap(), Verdict::Converged);
    }

    #[test]
    fn all_gather_is_rank_major_and_repeatable() {
        let group = LocalComm::new_group(4);
        let results: Vec<Vec<Vec<f64>>> = thread::scope(|s| {
            let handles: Vec<_> = group
                .into_iter()
                .map(|comm| {
                    s.spawn(move || {
                        let mut rounds = Vec::new();
                        for round in 0..3 {
                            let local = [comm.rank() as f64, (10 * round) as f64];
                            let mut out = vec![0.0; 8];
                            comm.all_gather(&local, &mut out).unwrap();
                            rounds.push(out);
                        }
                        rounds
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        for rounds in &results {
            for (round, out) in rounds.iter().enumerate() {
                let r = (10 * round) as f64;
                assert_eq!(out, &vec![0.0, r, 1.0, r, 2.0, r, 3.0, r]);
            }
        }
    }

    #[test]
    fn wrong_message_kind_is_a_protocol_error() {
        let mut group = LocalComm::new_group(2);
        let one = group.pop().unwrap();
        let zero = group.pop().unwrap();

        let handle = thread::spawn(move || one.recv_values(0, 1));
        zero.send_verdict(1, Verdict::Continue).unwrap();
        assert!(matches!(handle.join().unwrap(), Err(RankingError::Comm(_))));
    }

    #[test]
    fn hung_up_peer_surfaces_as_error() {
        let mut group = LocalComm::new_group(2);
        let one = group.pop().unwrap();
        let zero = group.pop().unwrap();
        drop(one);
        assert!(matches!(zero.recv_values(1, 1), Err(RankingError::Comm(_))));
        assert!(matches!(zero.send_values(1, &[1.0]), Err(RankingError::Comm(_))));
        let mut out = vec![0.0; 2];
        assert!(zero.all_gather(&[1.0], &mut out).is_err());
    }

    #[test]
    fn self_message_is_rejected() {
        let group = LocalComm::new_group(2);
        assert!(group[0].send_values(0, &[1.0]).is_err());
    }
}
