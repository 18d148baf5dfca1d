//! Per-backend tracker state.
//!
//! [`BackendState`] is written only by the poller for its backend and read by the resolver
//! and accessors. Applying a round is a pure state transition so the health rules can be
//! tested without any transport.

use super::errors::TrackerError;
use crate::types::{BlockRef, SyncStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything one successful probe round observed on a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub peer_count: u64,
    pub sync: SyncStatus,
    pub latest: BlockRef,
    pub safe: BlockRef,
    pub finalized: BlockRef,
}

/// Thresholds of the health predicate for one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    pub min_peer_count: u64,
    pub skip_peer_count: bool,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self { min_peer_count: 1, skip_peer_count: false }
    }
}

/// Result of one poll of one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// All probes answered and the state was updated.
    Updated {
        healthy: bool,
        /// `latest` moved below the previously recorded height.
        regressed: bool,
        /// `latest` kept its height but changed hash.
        reorged: bool,
    },
    /// At least one probe failed; only `healthy` and `last_error` changed.
    Failed(TrackerError),
    /// The backend was not polled this round.
    Skipped,
}

impl PollOutcome {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Updated { healthy: true, .. })
    }
}

/// Snapshot of what the tracker knows about one backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackendState {
    pub latest: BlockRef,
    pub safe: BlockRef,
    pub finalized: BlockRef,
    pub peer_count: u64,
    pub in_sync: bool,
    /// Time of the last successful poll; `None` until the first one.
    pub last_update: Option<DateTime<Utc>>,
    /// Health as of the most recent round.
    pub healthy: bool,
    /// Error of the most recent failed round, cleared by a successful one.
    #[serde(skip)]
    pub last_error: Option<TrackerError>,
}

impl BackendState {
    /// Returns `true` once at least one poll has succeeded.
    #[must_use]
    pub fn has_updated(&self) -> bool {
        self.last_update.is_some()
    }

    /// Records a failed round.
    ///
    /// Block references and counters keep their previous values so a flapping backend does
    /// not look like it went backwards, and `last_update` does not move.
    pub fn apply_failure(&mut self, error: TrackerError) -> PollOutcome {
        self.healthy = false;
        self.last_error = Some(error.clone());
        PollOutcome::Failed(error)
    }

    /// Records a successful round and evaluates the health predicate.
    pub fn apply_observation(
        &mut self,
        observation: &Observation,
        policy: HealthPolicy,
        now: DateTime<Utc>,
    ) -> PollOutcome {
        let previous = self.latest;
        let had_previous = self.has_updated();

        let regressed = had_previous && observation.latest.number < previous.number;
        let reorged = had_previous &&
            observation.latest.number == previous.number &&
            observation.latest.hash != previous.hash;

        let in_sync = observation.sync.is_in_sync();
        let enough_peers = policy.skip_peer_count || observation.peer_count >= policy.min_peer_count;
        let healthy = enough_peers && in_sync && !regressed;

        self.latest = observation.latest;
        self.safe = observation.safe;
        self.finalized = observation.finalized;
        self.peer_count = observation.peer_count;
        self.in_sync = in_sync;
        self.last_update = Some(now);
        self.healthy = healthy;
        self.last_error = None;

        PollOutcome::Updated { healthy, regressed, reorged }
    }
}
