//! Per-backend health round.
//!
//! One round issues five probes concurrently (`net_peerCount`, `eth_syncing` and the
//! `latest`/`safe`/`finalized` blocks), then applies the result to the backend's state under
//! its write lock. Rounds for the same backend are serialized by the slot's poll lock, so a
//! state has exactly one writer at a time.

use super::{
    errors::TrackerError,
    state::{BackendState, HealthPolicy, Observation, PollOutcome},
};
use crate::{
    backend::{Backend, ProbeError},
    types::BlockTag,
};
use chrono::Utc;
use parking_lot::RwLock;
use std::{sync::Arc, time::Duration};
use tracing::{debug, warn};

/// Tracker-owned storage for one backend.
pub struct BackendSlot {
    backend: Arc<Backend>,
    state: RwLock<BackendState>,
    poll_lock: tokio::sync::Mutex<()>,
}

impl BackendSlot {
    #[must_use]
    pub fn new(backend: Arc<Backend>) -> Self {
        Self {
            backend,
            state: RwLock::new(BackendState::default()),
            poll_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    /// Returns a copy of the current state. Never waits on an in-flight poll.
    #[must_use]
    pub fn state(&self) -> BackendState {
        self.state.read().clone()
    }

    /// Clears the state back to "never polled", waiting for any in-flight poll first.
    pub async fn reset(&self) {
        let _guard = self.poll_lock.lock().await;
        *self.state.write() = BackendState::default();
    }
}

/// Runs health rounds for individual backends.
#[derive(Debug, Clone)]
pub struct ConsensusPoller {
    min_peer_count: u64,
    round_timeout: Duration,
}

impl ConsensusPoller {
    #[must_use]
    pub fn new(min_peer_count: u64, round_timeout: Duration) -> Self {
        Self { min_peer_count, round_timeout }
    }

    fn policy_for(&self, backend: &Backend) -> HealthPolicy {
        HealthPolicy { min_peer_count: self.min_peer_count, skip_peer_count: backend.skips_peer_count() }
    }

    /// Issues all probes for one backend concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first probe error; the remaining probes are dropped.
    pub async fn probe(backend: &Backend) -> Result<Observation, ProbeError> {
        let (peer_count, sync, latest, safe, finalized) = tokio::try_join!(
            backend.peer_count(),
            backend.sync_status(),
            backend.block_by_tag(BlockTag::Latest),
            backend.block_by_tag(BlockTag::Safe),
            backend.block_by_tag(BlockTag::Finalized),
        )?;

        Ok(Observation { peer_count, sync, latest, safe, finalized })
    }

    /// Performs one health round for the backend in `slot`.
    ///
    /// The whole round is bounded by the round timeout; a backend that does not answer in
    /// time gets a failed round, never a removal.
    pub async fn poll(&self, slot: &BackendSlot) -> PollOutcome {
        let _guard = slot.poll_lock.lock().await;
        let backend = slot.backend.as_ref();

        let result = match tokio::time::timeout(self.round_timeout, Self::probe(backend)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout),
        };

        match result {
            Ok(observation) => {
                let outcome = slot.state.write().apply_observation(
                    &observation,
                    self.policy_for(backend),
                    Utc::now(),
                );
                Self::log_update(backend, &observation, &outcome);
                outcome
            }
            Err(error) => {
                warn!(
                    backend = %backend.name(),
                    error = %error,
                    kind = error.kind(),
                    "backend poll failed"
                );
                slot.state.write().apply_failure(TrackerError::from(error))
            }
        }
    }

    fn log_update(backend: &Backend, observation: &Observation, outcome: &PollOutcome) {
        let &PollOutcome::Updated { healthy, regressed, reorged } = outcome else {
            return;
        };

        if regressed {
            warn!(
                backend = %backend.name(),
                latest = observation.latest.number,
                "backend latest block went backwards"
            );
        }
        if reorged {
            warn!(
                backend = %backend.name(),
                block = observation.latest.number,
                hash = %observation.latest.hash_hex(),
                "backend replaced its latest block at the same height"
            );
        }

        debug!(
            backend = %backend.name(),
            healthy = healthy,
            peer_count = observation.peer_count,
            in_sync = observation.sync.is_in_sync(),
            latest = observation.latest.number,
            safe = observation.safe.number,
            finalized = observation.finalized.number,
            "backend state updated"
        );
    }
}
