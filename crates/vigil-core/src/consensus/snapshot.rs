use super::errors::TrackerError;
use crate::{backend::Backend, types::BlockRef};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Result of one resolution cycle, published as a whole.
///
/// Readers load the current snapshot through an `ArcSwap` and never observe a half-written
/// group. An empty `group` is the explicit "nothing to serve from" state.
#[derive(Debug, Clone, Default)]
pub struct ConsensusSnapshot {
    /// Backends safe to serve from, primary first, then by rank.
    pub group: Vec<Arc<Backend>>,
    pub fallback_mode: bool,
    pub latest: BlockRef,
    pub safe: BlockRef,
    pub finalized: BlockRef,
    /// Number of the round that produced this snapshot; `0` for the initial one.
    pub round: u64,
    /// `None` until the first round publishes.
    pub published_at: Option<DateTime<Utc>>,
    /// `NoHealthyPrimary` while serving from fallback, `NoHealthyBackend` when the group is
    /// empty after a round, `None` otherwise.
    pub outcome: Option<TrackerError>,
    /// Healthy backends left out of the group this round and why.
    pub excluded: Vec<(Arc<str>, TrackerError)>,
}

impl ConsensusSnapshot {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.group.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.group.iter().any(|backend| backend.name().as_ref() == name)
    }

    /// Names of the group members in order.
    #[must_use]
    pub fn member_names(&self) -> Vec<Arc<str>> {
        self.group.iter().map(|backend| Arc::clone(backend.name())).collect()
    }

    /// Returns `true` if `other` publishes the same members in the same order, the same
    /// mode and the same three heights.
    #[must_use]
    pub fn same_view(&self, other: &Self) -> bool {
        self.fallback_mode == other.fallback_mode &&
            self.latest == other.latest &&
            self.safe == other.safe &&
            self.finalized == other.finalized &&
            self.group.len() == other.group.len() &&
            self.group.iter().zip(&other.group).all(|(a, b)| a.name() == b.name())
    }
}
