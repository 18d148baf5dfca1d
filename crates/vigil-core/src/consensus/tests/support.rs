//! In-memory transport with a mutable script, shared by the consensus tests.

use crate::{
    backend::{Backend, BackendOptions, BackendTransport, ProbeError},
    types::{BlockHash, BlockRef, BlockTag, PriorityClass, SyncStatus},
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

/// Canonical hash used by every scripted node for block `number`.
pub fn hash_for(number: u64) -> BlockHash {
    let mut hash = [0u8; 32];
    hash[24..].copy_from_slice(&number.to_be_bytes());
    hash
}

/// Block on the canonical test chain.
pub fn block(number: u64) -> BlockRef {
    BlockRef::new(number, hash_for(number))
}

/// Block at `number` on a fork identified by `fork`.
pub fn forked_block(number: u64, fork: u8) -> BlockRef {
    let mut hash = hash_for(number);
    hash[0] = fork;
    BlockRef::new(number, hash)
}

#[derive(Debug, Clone)]
struct Script {
    peer_count: u64,
    sync: SyncStatus,
    latest: BlockRef,
    safe: BlockRef,
    finalized: BlockRef,
    overrides: HashMap<u64, BlockRef>,
    offline: bool,
    history_available: bool,
    delay: Option<Duration>,
}

/// Transport answering from a script the test can change between rounds.
///
/// Starts as a synced node with 5 peers at `latest = 0x101`, `safe = 0xe1`,
/// `finalized = 0xc1`. `block_by_number` serves the canonical chain up to `latest` unless a
/// height is overridden.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
    by_number_calls: AtomicUsize,
    /// `net_peerCount` is issued once per poll, so these track overlapping polls.
    peer_calls_in_flight: AtomicUsize,
    max_peer_calls_in_flight: AtomicUsize,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self {
            script: Mutex::new(Script {
                peer_count: 5,
                sync: SyncStatus::Synced,
                latest: block(0x101),
                safe: block(0xe1),
                finalized: block(0xc1),
                overrides: HashMap::new(),
                offline: false,
                history_available: true,
                delay: None,
            }),
            by_number_calls: AtomicUsize::new(0),
            peer_calls_in_flight: AtomicUsize::new(0),
            max_peer_calls_in_flight: AtomicUsize::new(0),
        }
    }
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_peer_count(&self, peers: u64) {
        self.script.lock().peer_count = peers;
    }

    pub fn set_sync(&self, sync: SyncStatus) {
        self.script.lock().sync = sync;
    }

    pub fn set_latest(&self, latest: BlockRef) {
        self.script.lock().latest = latest;
    }

    pub fn set_safe(&self, safe: BlockRef) {
        self.script.lock().safe = safe;
    }

    pub fn set_finalized(&self, finalized: BlockRef) {
        self.script.lock().finalized = finalized;
    }

    /// Serves `block` for `block_by_number(block.number)`.
    pub fn set_block(&self, block: BlockRef) {
        self.script.lock().overrides.insert(block.number, block);
    }

    pub fn set_offline(&self, offline: bool) {
        self.script.lock().offline = offline;
    }

    /// When `false`, `block_by_number` fails for every height.
    pub fn set_history_available(&self, available: bool) {
        self.script.lock().history_available = available;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.script.lock().delay = Some(delay);
    }

    pub fn by_number_calls(&self) -> usize {
        self.by_number_calls.load(Ordering::SeqCst)
    }

    /// Highest number of polls seen running against this node at the same time.
    pub fn max_concurrent_polls(&self) -> usize {
        self.max_peer_calls_in_flight.load(Ordering::SeqCst)
    }

    /// Applies the configured delay, then returns the script or the offline error.
    async fn answer(&self) -> Result<Script, ProbeError> {
        let delay = self.script.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let script = self.script.lock().clone();
        if script.offline {
            return Err(ProbeError::Transport("connection refused".to_string()));
        }
        Ok(script)
    }
}

#[async_trait]
impl BackendTransport for ScriptedTransport {
    async fn peer_count(&self) -> Result<u64, ProbeError> {
        let in_flight = self.peer_calls_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_peer_calls_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        let result = self.answer().await;
        self.peer_calls_in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(result?.peer_count)
    }

    async fn sync_status(&self) -> Result<SyncStatus, ProbeError> {
        Ok(self.answer().await?.sync)
    }

    async fn block_by_tag(&self, tag: BlockTag) -> Result<BlockRef, ProbeError> {
        let script = self.answer().await?;
        Ok(match tag {
            BlockTag::Latest => script.latest,
            BlockTag::Safe => script.safe,
            BlockTag::Finalized => script.finalized,
        })
    }

    async fn block_by_number(&self, number: u64) -> Result<BlockRef, ProbeError> {
        self.by_number_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.answer().await?;

        if !script.history_available {
            return Err(ProbeError::Rpc(-32000, "missing trie node".to_string()));
        }
        if let Some(overridden) = script.overrides.get(&number) {
            return Ok(*overridden);
        }
        if number == script.latest.number {
            return Ok(script.latest);
        }
        if number < script.latest.number {
            return Ok(block(number));
        }
        Err(ProbeError::InvalidResponse("block not found".to_string()))
    }
}

pub fn backend(
    name: &str,
    class: PriorityClass,
    rank: u32,
    transport: &Arc<ScriptedTransport>,
) -> Arc<Backend> {
    let transport: Arc<dyn BackendTransport> = transport.clone();
    Arc::new(Backend::new(BackendOptions::new(name, class).rank(rank), transport))
}

pub fn primary(name: &str, rank: u32, transport: &Arc<ScriptedTransport>) -> Arc<Backend> {
    backend(name, PriorityClass::Primary, rank, transport)
}

pub fn fallback(name: &str, rank: u32, transport: &Arc<ScriptedTransport>) -> Arc<Backend> {
    backend(name, PriorityClass::Fallback, rank, transport)
}

/// Names of `backends` in order.
pub fn names(backends: &[Arc<Backend>]) -> Vec<String> {
    backends.iter().map(|b| b.name().to_string()).collect()
}
