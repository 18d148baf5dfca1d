//! Aggregate step of a round.
//!
//! The resolver reads a copy of every backend's state and turns it into the next
//! [`ConsensusSnapshot`]:
//!
//! 1. Feed the presence of a healthy primary into the fallback latch.
//! 2. On the cycle that enters fallback, republish the previous group and heights.
//! 3. Otherwise agree within the class the latch selects (primary in normal mode, fallback in
//!    fallback mode): drop lagging members, take the minimum `latest` height, check every
//!    member's hash at that height and keep the majority.
//!
//! The only I/O is `block_by_number` for members that are ahead of the agreed height.

use super::{
    errors::TrackerError,
    latch::{FallbackLatch, LatchTransition},
    snapshot::ConsensusSnapshot,
    state::BackendState,
};
use crate::{
    backend::Backend,
    types::{BlockHash, BlockRef, PriorityClass},
};
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// A backend together with a copy of its state taken at the start of resolution.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub backend: Arc<Backend>,
    pub state: BackendState,
}

impl Candidate {
    #[must_use]
    pub fn new(backend: Arc<Backend>, state: BackendState) -> Self {
        Self { backend, state }
    }
}

/// Agreement reached among the healthy members of one priority class.
#[derive(Debug, Clone, Default)]
pub struct ClassAgreement {
    /// Members that agree on `latest`, in priority order.
    pub members: Vec<Arc<Backend>>,
    pub latest: BlockRef,
    pub safe: BlockRef,
    pub finalized: BlockRef,
    /// Healthy backends left out this round and why.
    pub excluded: Vec<(Arc<str>, TrackerError)>,
}

impl ClassAgreement {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Output of [`GroupConsensusResolver::resolve`].
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Next snapshot, carrying the round's outcome and exclusions.
    pub snapshot: ConsensusSnapshot,
    pub transition: LatchTransition,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GroupConsensusResolver {
    max_block_lag: Option<u64>,
}

impl GroupConsensusResolver {
    #[must_use]
    pub fn new(max_block_lag: Option<u64>) -> Self {
        Self { max_block_lag }
    }

    /// Computes the next snapshot and advances `latch`.
    ///
    /// `candidates` may contain both classes in any order. The caller owns publication; if
    /// this future is dropped, neither the latch nor any snapshot has been touched.
    pub async fn resolve(
        &self,
        candidates: &[Candidate],
        latch: &mut FallbackLatch,
        previous: &ConsensusSnapshot,
    ) -> Resolution {
        let healthy_primary = candidates
            .iter()
            .any(|c| c.backend.class() == PriorityClass::Primary && c.state.healthy);

        let mut next = *latch;
        let transition = next.observe(healthy_primary);

        if transition == LatchTransition::EnteredFallback {
            *latch = next;
            let snapshot = ConsensusSnapshot {
                fallback_mode: true,
                round: previous.round + 1,
                published_at: Some(Utc::now()),
                outcome: Some(TrackerError::NoHealthyPrimary),
                excluded: Vec::new(),
                ..previous.clone()
            };
            return Resolution { snapshot, transition };
        }

        let class = if next.is_fallback() { PriorityClass::Fallback } else { PriorityClass::Primary };
        let members: Vec<Candidate> =
            candidates.iter().filter(|c| c.backend.class() == class).cloned().collect();
        let agreement = self.agree(&members).await;
        *latch = next;

        let (outcome, latest, safe, finalized) = if agreement.is_empty() {
            (Some(TrackerError::NoHealthyBackend), previous.latest, previous.safe, previous.finalized)
        } else if next.is_fallback() {
            (Some(TrackerError::NoHealthyPrimary), agreement.latest, agreement.safe, agreement.finalized)
        } else {
            (None, agreement.latest, agreement.safe, agreement.finalized)
        };

        let snapshot = ConsensusSnapshot {
            group: agreement.members,
            fallback_mode: next.is_fallback(),
            latest,
            safe,
            finalized,
            round: previous.round + 1,
            published_at: Some(Utc::now()),
            outcome,
            excluded: agreement.excluded,
        };

        Resolution { snapshot, transition }
    }

    /// Agrees on heights among the healthy members of `candidates`.
    ///
    /// Unhealthy candidates are ignored. The returned members keep priority order.
    pub async fn agree(&self, candidates: &[Candidate]) -> ClassAgreement {
        let mut healthy: Vec<&Candidate> = candidates.iter().filter(|c| c.state.healthy).collect();
        healthy.sort_by(|a, b| a.backend.priority_key().cmp(&b.backend.priority_key()));

        let mut excluded = Vec::new();

        if let Some(max_lag) = self.max_block_lag {
            let highest = healthy.iter().map(|c| c.state.latest.number).max().unwrap_or_default();
            healthy.retain(|c| {
                let behind = highest - c.state.latest.number;
                if behind > max_lag {
                    warn!(backend = %c.backend.name(), behind = behind, max_lag = max_lag, "backend lagging");
                    excluded.push((
                        Arc::clone(c.backend.name()),
                        TrackerError::Lagging { backend: Arc::clone(c.backend.name()), behind },
                    ));
                    false
                } else {
                    true
                }
            });
        }

        let Some(agreed) = healthy.iter().map(|c| c.state.latest.number).min() else {
            return ClassAgreement { excluded, ..ClassAgreement::default() };
        };

        let hashes = join_all(healthy.iter().map(|c| Self::hash_at(c, agreed))).await;

        let mut voters: Vec<(&Candidate, BlockHash)> = Vec::with_capacity(healthy.len());
        for (candidate, result) in healthy.iter().copied().zip(hashes) {
            match result {
                Ok(hash) => voters.push((candidate, hash)),
                Err(error) => {
                    warn!(
                        backend = %candidate.backend.name(),
                        block = agreed,
                        error = %error,
                        "could not read block at agreed height"
                    );
                    excluded.push((Arc::clone(candidate.backend.name()), error));
                }
            }
        }

        let Some(winner) = majority_hash(voters.iter().map(|(_, hash)| *hash)) else {
            return ClassAgreement { excluded, ..ClassAgreement::default() };
        };

        let mut members = Vec::with_capacity(voters.len());
        let mut agreeing = Vec::with_capacity(voters.len());
        for (candidate, hash) in voters {
            if hash == winner {
                members.push(Arc::clone(&candidate.backend));
                agreeing.push(candidate);
            } else {
                warn!(
                    backend = %candidate.backend.name(),
                    block = agreed,
                    hash = %BlockRef::new(agreed, hash).hash_hex(),
                    expected = %BlockRef::new(agreed, winner).hash_hex(),
                    "backend diverges from majority"
                );
                excluded.push((
                    Arc::clone(candidate.backend.name()),
                    TrackerError::DivergentHash { backend: Arc::clone(candidate.backend.name()), number: agreed },
                ));
            }
        }

        let safe = lowest_known(agreeing.iter().map(|c| c.state.safe));
        let finalized = lowest_known(agreeing.iter().map(|c| c.state.finalized));

        debug!(
            members = members.len(),
            excluded = excluded.len(),
            latest = agreed,
            safe = safe.number,
            finalized = finalized.number,
            "class agreement"
        );

        ClassAgreement { members, latest: BlockRef::new(agreed, winner), safe, finalized, excluded }
    }

    /// Hash of `candidate`'s block at `height`, fetching it if the candidate is ahead.
    async fn hash_at(candidate: &Candidate, height: u64) -> Result<BlockHash, TrackerError> {
        if candidate.state.latest.number == height {
            return Ok(candidate.state.latest.hash);
        }

        let block = candidate.backend.block_by_number(height).await?;
        if block.number != height {
            return Err(TrackerError::ProbeTransport(format!(
                "requested block {height:#x}, got {:#x}",
                block.number
            )));
        }
        Ok(block.hash)
    }
}

/// Most common hash; ties go to the hash seen first.
pub fn majority_hash(hashes: impl IntoIterator<Item = BlockHash>) -> Option<BlockHash> {
    let mut tally: Vec<(BlockHash, usize)> = Vec::new();
    for hash in hashes {
        match tally.iter_mut().find(|(h, _)| *h == hash) {
            Some((_, count)) => *count += 1,
            None => tally.push((hash, 1)),
        }
    }

    // `max_by_key` keeps the last maximum, so walk in reverse to prefer the earliest.
    tally.into_iter().rev().max_by_key(|(_, count)| *count).map(|(hash, _)| hash)
}

/// Lowest non-zero reference, or the zero reference if none is known.
fn lowest_known(refs: impl Iterator<Item = BlockRef>) -> BlockRef {
    refs.filter(|r| !r.is_unknown()).min_by_key(|r| r.number).unwrap_or_default()
}
