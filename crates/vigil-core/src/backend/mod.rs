//! Backend handles and their wire transport.
//!
//! A [`Backend`] is an immutable identity (name, priority class, rank) plus a
//! [`BackendTransport`]. Every call through the handle is bounded by the backend's probe
//! timeout; a call that does not answer in time fails with [`ProbeError::Timeout`].

pub mod errors;
pub mod http_client;
pub mod transport;

pub use errors::ProbeError;
pub use http_client::{HttpClient, HttpClientConfig};
pub use transport::{BackendTransport, RpcTransport};

use crate::types::{BlockRef, BlockTag, PriorityClass, SyncStatus};
use std::{fmt, future::Future, sync::Arc, time::Duration};

/// Default per-probe timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Construction options for a [`Backend`].
///
/// This is the full set of recognized per-backend options; there is no open-ended
/// option mechanism.
#[derive(Debug, Clone)]
pub struct BackendOptions {
    /// Unique, stable name used in logs and lookups.
    pub name: Arc<str>,
    /// Whether the backend serves in normal or fallback mode.
    pub class: PriorityClass,
    /// Position within its class; lower ranks come first in the consensus group.
    pub rank: u32,
    /// Upper bound for each individual probe.
    pub probe_timeout: Duration,
    /// Skip the peer-count clause of the health predicate for this backend.
    pub skip_peer_count: bool,
}

impl BackendOptions {
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>, class: PriorityClass) -> Self {
        Self {
            name: name.into(),
            class,
            rank: 0,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            skip_peer_count: false,
        }
    }

    #[must_use]
    pub fn rank(mut self, rank: u32) -> Self {
        self.rank = rank;
        self
    }

    #[must_use]
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    #[must_use]
    pub fn skip_peer_count(mut self, skip: bool) -> Self {
        self.skip_peer_count = skip;
        self
    }
}

/// Handle to one upstream node.
///
/// Immutable after construction. Holds no chain state; everything the tracker learns about
/// the node lives in its `BackendState`.
pub struct Backend {
    options: BackendOptions,
    transport: Arc<dyn BackendTransport>,
}

impl Backend {
    #[must_use]
    pub fn new(options: BackendOptions, transport: Arc<dyn BackendTransport>) -> Self {
        Self { options, transport }
    }

    #[must_use]
    pub fn name(&self) -> &Arc<str> {
        &self.options.name
    }

    #[must_use]
    pub fn class(&self) -> PriorityClass {
        self.options.class
    }

    #[must_use]
    pub fn rank(&self) -> u32 {
        self.options.rank
    }

    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.options.class == PriorityClass::Fallback
    }

    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        self.options.probe_timeout
    }

    #[must_use]
    pub fn skips_peer_count(&self) -> bool {
        self.options.skip_peer_count
    }

    /// Key used to order backends: class first, then rank, then name for determinism.
    #[must_use]
    pub fn priority_key(&self) -> (PriorityClass, u32, &str) {
        (self.options.class, self.options.rank, &self.options.name)
    }

    async fn bounded<T, F>(&self, probe: &'static str, fut: F) -> Result<T, ProbeError>
    where
        F: Future<Output = Result<T, ProbeError>>,
    {
        match tokio::time::timeout(self.options.probe_timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(
                    backend = %self.options.name,
                    probe = probe,
                    timeout_ms = self.options.probe_timeout.as_millis(),
                    "probe timed out"
                );
                Err(ProbeError::Timeout)
            }
        }
    }

    /// # Errors
    ///
    /// Returns the transport error, or [`ProbeError::Timeout`] past the probe timeout.
    pub async fn peer_count(&self) -> Result<u64, ProbeError> {
        self.bounded("peer_count", self.transport.peer_count()).await
    }

    /// # Errors
    ///
    /// Returns the transport error, or [`ProbeError::Timeout`] past the probe timeout.
    pub async fn sync_status(&self) -> Result<SyncStatus, ProbeError> {
        self.bounded("sync_status", self.transport.sync_status()).await
    }

    /// # Errors
    ///
    /// Returns the transport error, or [`ProbeError::Timeout`] past the probe timeout.
    pub async fn block_by_tag(&self, tag: BlockTag) -> Result<BlockRef, ProbeError> {
        self.bounded("block_by_tag", self.transport.block_by_tag(tag)).await
    }

    /// # Errors
    ///
    /// Returns the transport error, or [`ProbeError::Timeout`] past the probe timeout.
    pub async fn block_by_number(&self, number: u64) -> Result<BlockRef, ProbeError> {
        self.bounded("block_by_number", self.transport.block_by_number(number)).await
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.options.name)
            .field("class", &self.options.class)
            .field("rank", &self.options.rank)
            .finish_non_exhaustive()
    }
}

/// Backends are identified by name.
impl PartialEq for Backend {
    fn eq(&self, other: &Self) -> bool {
        self.options.name == other.options.name
    }
}

impl Eq for Backend {}
