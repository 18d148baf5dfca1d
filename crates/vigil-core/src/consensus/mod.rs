//! # Consensus Tracker Overview
//!
//! The tracker keeps a continuously refreshed answer to "which backends are safe to serve
//! from right now, and at which heights do they agree?".
//!
//! ## Round Steps
//!
//! 1. **Poll**: every backend is probed concurrently (`net_peerCount`, `eth_syncing`,
//!    `latest`/`safe`/`finalized`) and its [`BackendState`] updated
//! 2. **Latch**: the fallback latch observes whether any primary is healthy
//! 3. **Agree**: within the active class, the agreed `latest` is the minimum healthy height;
//!    members whose hash at that height disagrees with the majority are excluded
//! 4. **Publish**: the resulting [`ConsensusSnapshot`] replaces the previous one atomically
//!
//! ## Fallback Mode
//!
//! Entering fallback mode lags one round: the round that finds no healthy primary still
//! publishes the last good group, flagged `fallback_mode`. Leaving is immediate.
//!
//! # Module Organization
//!
//! - [`state`]: Per-backend state and the health predicate
//! - [`poller`]: One backend's health round
//! - [`latch`]: Fallback latch state machine
//! - [`resolver`]: Aggregate step producing the next snapshot
//! - [`group`]: `BackendGroup`, the owner of backends, states and the published snapshot
//! - [`driver`]: Interval loop running rounds until shutdown

pub mod driver;
pub mod errors;
pub mod group;
pub mod latch;
pub mod poller;
pub mod resolver;
pub mod snapshot;
pub mod state;

#[cfg(test)]
mod tests;

pub use driver::ConsensusDriver;
pub use errors::TrackerError;
pub use group::{BackendGroup, ConsensusListener, TrackerSettings};
pub use latch::{FallbackLatch, LatchState, LatchTransition};
pub use poller::{BackendSlot, ConsensusPoller};
pub use resolver::{Candidate, ClassAgreement, GroupConsensusResolver, Resolution};
pub use snapshot::ConsensusSnapshot;
pub use state::{BackendState, HealthPolicy, Observation, PollOutcome};
