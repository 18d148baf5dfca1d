use crate::backend::ProbeError;
use std::sync::Arc;
use thiserror::Error;

/// Errors produced by the consensus tracker.
///
/// Probe-level variants (`ProbeTimeout`, `ProbeTransport`) are absorbed into per-backend
/// health. Exclusion reasons (`DivergentHash`, `Lagging`) and the aggregate variants
/// (`NoHealthyPrimary`, `NoHealthyBackend`) are published with the snapshot; only
/// `NoHealthyBackend` is ever handed to the request router.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TrackerError {
    /// A probe or the whole backend round exceeded its timeout.
    #[error("Probe timeout")]
    ProbeTimeout,

    /// Connection, HTTP, RPC or decode failure while probing.
    #[error("Probe transport error: {0}")]
    ProbeTransport(String),

    /// The backend reports a different hash than the majority at the agreed height.
    #[error("Backend {backend} diverges at block {number:#x}")]
    DivergentHash { backend: Arc<str>, number: u64 },

    /// The backend trails the highest healthy backend of its class by more than the
    /// configured block lag.
    #[error("Backend {backend} is {behind} blocks behind")]
    Lagging { backend: Arc<str>, behind: u64 },

    /// No primary backend passed the health predicate this round.
    #[error("No healthy primary backend")]
    NoHealthyPrimary,

    /// Neither class produced a usable group; requests must fail as unavailable.
    #[error("No healthy backend available")]
    NoHealthyBackend,

    /// Backend group construction rejected its input.
    #[error("Invalid backend group: {0}")]
    InvalidGroup(String),
}

impl TrackerError {
    /// Returns `true` for errors caused by a single failed probe round.
    #[must_use]
    pub fn is_probe_failure(&self) -> bool {
        matches!(self, Self::ProbeTimeout | Self::ProbeTransport(_))
    }

    /// Returns `true` if the error means the router has nothing to serve from.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::NoHealthyBackend)
    }
}

impl From<ProbeError> for TrackerError {
    fn from(error: ProbeError) -> Self {
        match error {
            ProbeError::Timeout => Self::ProbeTimeout,
            other => Self::ProbeTransport(other.to_string()),
        }
    }
}
