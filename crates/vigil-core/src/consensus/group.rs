use super::{
    errors::TrackerError,
    latch::{FallbackLatch, LatchTransition},
    poller::{BackendSlot, ConsensusPoller},
    resolver::{Candidate, GroupConsensusResolver},
    snapshot::ConsensusSnapshot,
    state::{BackendState, PollOutcome},
};
use crate::backend::Backend;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::{Mutex, RwLock};
use std::{collections::HashSet, sync::Arc, time::Duration};
use tracing::{info, warn};

/// Callback invoked after a round publishes a snapshot whose latest block or membership
/// changed.
pub type ConsensusListener = Arc<dyn Fn(&ConsensusSnapshot) + Send + Sync>;

/// Group-wide tracker settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerSettings {
    pub min_peer_count: u64,
    /// Exclude healthy backends trailing the highest one of their class by more than this.
    pub max_block_lag: Option<u64>,
    /// Upper bound for one backend's whole poll.
    pub round_timeout: Duration,
    /// Poll fallback backends while in normal mode.
    pub warm_fallbacks: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            min_peer_count: 1,
            max_block_lag: None,
            round_timeout: Duration::from_secs(10),
            warm_fallbacks: true,
        }
    }
}

/// Owns the backends, their states and the published consensus.
///
/// All `get_*` accessors read the last published snapshot or a state copy; none of them
/// polls or waits on a running round.
pub struct BackendGroup {
    slots: Vec<BackendSlot>,
    snapshot: ArcSwap<ConsensusSnapshot>,
    latch: Mutex<FallbackLatch>,
    /// Serializes resolution and reset so round N publishes before round N+1 resolves.
    round_lock: tokio::sync::Mutex<()>,
    poller: ConsensusPoller,
    resolver: GroupConsensusResolver,
    listeners: RwLock<Vec<ConsensusListener>>,
    warm_fallbacks: bool,
}

impl BackendGroup {
    /// Creates a group over `backends`, ordered by class, then rank, then name.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidGroup`] if two backends share a name.
    pub fn new(backends: Vec<Arc<Backend>>, settings: TrackerSettings) -> Result<Self, TrackerError> {
        let mut seen = HashSet::with_capacity(backends.len());
        for backend in &backends {
            if !seen.insert(Arc::clone(backend.name())) {
                return Err(TrackerError::InvalidGroup(format!("duplicate backend name {}", backend.name())));
            }
        }

        let mut backends = backends;
        backends.sort_by(|a, b| a.priority_key().cmp(&b.priority_key()));

        Ok(Self {
            slots: backends.into_iter().map(BackendSlot::new).collect(),
            snapshot: ArcSwap::from_pointee(ConsensusSnapshot::default()),
            latch: Mutex::new(FallbackLatch::new()),
            round_lock: tokio::sync::Mutex::new(()),
            poller: ConsensusPoller::new(settings.min_peer_count, settings.round_timeout),
            resolver: GroupConsensusResolver::new(settings.max_block_lag),
            listeners: RwLock::new(Vec::new()),
            warm_fallbacks: settings.warm_fallbacks,
        })
    }

    // --- Read API ---

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<ConsensusSnapshot> {
        self.snapshot.load_full()
    }

    #[must_use]
    pub fn get_consensus_group(&self) -> Vec<Arc<Backend>> {
        self.snapshot.load().group.clone()
    }

    #[must_use]
    pub fn get_fallback_mode(&self) -> bool {
        self.snapshot.load().fallback_mode
    }

    #[must_use]
    pub fn get_latest_block_number(&self) -> u64 {
        self.snapshot.load().latest.number
    }

    #[must_use]
    pub fn get_safe_block_number(&self) -> u64 {
        self.snapshot.load().safe.number
    }

    #[must_use]
    pub fn get_finalized_block_number(&self) -> u64 {
        self.snapshot.load().finalized.number
    }

    /// Time of `backend`'s last successful poll; `None` if it never succeeded or the backend
    /// is not part of this group.
    #[must_use]
    pub fn get_last_update(&self, backend: &Backend) -> Option<DateTime<Utc>> {
        self.slot(backend.name()).and_then(|slot| slot.state().last_update)
    }

    #[must_use]
    pub fn get_backend_state(&self, name: &str) -> Option<BackendState> {
        self.slot(name).map(BackendSlot::state)
    }

    /// All backends in priority order.
    #[must_use]
    pub fn backends(&self) -> Vec<Arc<Backend>> {
        self.slots.iter().map(|slot| Arc::clone(slot.backend())).collect()
    }

    #[must_use]
    pub fn backend(&self, name: &str) -> Option<Arc<Backend>> {
        self.slot(name).map(|slot| Arc::clone(slot.backend()))
    }

    /// Current group, or [`TrackerError::NoHealthyBackend`] when there is nothing to serve
    /// from.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::NoHealthyBackend`] if the published group is empty.
    pub fn require_consensus_group(&self) -> Result<Vec<Arc<Backend>>, TrackerError> {
        let group = self.get_consensus_group();
        if group.is_empty() {
            return Err(TrackerError::NoHealthyBackend);
        }
        Ok(group)
    }

    // --- Rounds ---

    /// Polls one backend and updates its state.
    ///
    /// Fallback backends are skipped while in normal mode unless fallbacks are kept warm.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidGroup`] if `backend` does not belong to this group.
    pub async fn update_backend(&self, backend: &Backend) -> Result<PollOutcome, TrackerError> {
        let slot = self
            .slot(backend.name())
            .ok_or_else(|| TrackerError::InvalidGroup(format!("unknown backend {}", backend.name())))?;
        Ok(self.poll_slot(slot).await)
    }

    /// Resolves and publishes consensus from the current backend states without polling.
    pub async fn update_backend_group_consensus(&self) -> Arc<ConsensusSnapshot> {
        let _guard = self.round_lock.lock().await;
        self.resolve_locked().await
    }

    /// Runs one full round: polls every backend concurrently, then resolves and publishes.
    ///
    /// Dropping the returned future before it completes publishes nothing.
    pub async fn run_round(&self) -> Arc<ConsensusSnapshot> {
        let _guard = self.round_lock.lock().await;
        join_all(self.slots.iter().map(|slot| self.poll_slot(slot))).await;
        self.resolve_locked().await
    }

    /// Forces normal mode, clears every backend state and the published snapshot.
    ///
    /// Waits for the running round and in-flight polls to finish first.
    pub async fn reset(&self) {
        let _guard = self.round_lock.lock().await;
        join_all(self.slots.iter().map(BackendSlot::reset)).await;
        self.latch.lock().reset();
        self.snapshot.store(Arc::new(ConsensusSnapshot::default()));
        info!("backend group reset");
    }

    // --- Listeners ---

    pub fn add_listener(&self, listener: ConsensusListener) {
        self.listeners.write().push(listener);
    }

    pub fn clear_listeners(&self) {
        self.listeners.write().clear();
    }

    fn slot(&self, name: &str) -> Option<&BackendSlot> {
        self.slots.iter().find(|slot| slot.backend().name().as_ref() == name)
    }

    async fn poll_slot(&self, slot: &BackendSlot) -> PollOutcome {
        if !self.warm_fallbacks && slot.backend().is_fallback() && !self.latch.lock().is_fallback() {
            return PollOutcome::Skipped;
        }
        self.poller.poll(slot).await
    }

    /// Must be called with `round_lock` held.
    async fn resolve_locked(&self) -> Arc<ConsensusSnapshot> {
        let candidates: Vec<Candidate> = self
            .slots
            .iter()
            .map(|slot| Candidate::new(Arc::clone(slot.backend()), slot.state()))
            .collect();
        let previous = self.snapshot.load_full();
        let mut latch = *self.latch.lock();

        let resolution = self.resolver.resolve(&candidates, &mut latch, &previous).await;

        *self.latch.lock() = latch;
        let snapshot = Arc::new(resolution.snapshot);
        self.snapshot.store(Arc::clone(&snapshot));

        match resolution.transition {
            LatchTransition::EnteredFallback => {
                warn!(round = snapshot.round, "no healthy primary backend, entering fallback mode");
            }
            LatchTransition::ExitedFallback => {
                info!(round = snapshot.round, "primary backend recovered, leaving fallback mode");
            }
            LatchTransition::Unchanged => {}
        }
        let unavailable = snapshot.outcome.as_ref().is_some_and(TrackerError::is_unavailable);
        if unavailable && !previous.is_empty() {
            warn!(round = snapshot.round, excluded = snapshot.excluded.len(), "consensus group is empty");
        }

        if !snapshot.same_view(&previous) {
            info!(
                round = snapshot.round,
                latest = snapshot.latest.number,
                safe = snapshot.safe.number,
                finalized = snapshot.finalized.number,
                fallback_mode = snapshot.fallback_mode,
                members = ?snapshot.member_names(),
                "consensus updated"
            );
            self.notify(&snapshot);
        }

        snapshot
    }

    fn notify(&self, snapshot: &ConsensusSnapshot) {
        let listeners = self.listeners.read().clone();
        for listener in listeners {
            listener(snapshot);
        }
    }
}

impl std::fmt::Debug for BackendGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendGroup")
            .field("backends", &self.slots.len())
            .field("snapshot", &self.snapshot.load())
            .finish_non_exhaustive()
    }
}
