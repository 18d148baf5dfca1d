//! Scripted JSON-RPC Node for Tracker Testing
//!
//! Wraps mockito to serve the calls the tracker makes (`net_peerCount`, `eth_syncing`,
//! `eth_getBlockByNumber` by tag and by number) from a script the test can change between
//! rounds.

use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::{json, Value};
use std::collections::BTreeMap;

/// Block hash served for `number`; `fork` replaces the leading byte to model a divergent
/// chain.
#[must_use]
pub fn block_hash(number: u64, fork: Option<u8>) -> String {
    match fork {
        Some(fork) => format!("0x{fork:02x}{number:062x}"),
        None => format!("0x{number:064x}"),
    }
}

/// Builder for constructing block responses.
pub struct BlockResponseBuilder {
    number: u64,
    hash: String,
    parent_hash: String,
    timestamp: u64,
}

impl BlockResponseBuilder {
    #[must_use]
    pub fn new(number: u64) -> Self {
        Self {
            number,
            hash: block_hash(number, None),
            parent_hash: block_hash(number.saturating_sub(1), None),
            timestamp: 1_600_000_000 + number,
        }
    }

    /// Moves the block onto fork `fork`.
    #[must_use]
    pub fn on_fork(mut self, fork: Option<u8>) -> Self {
        self.hash = block_hash(self.number, fork);
        self.parent_hash = block_hash(self.number.saturating_sub(1), fork);
        self
    }

    #[must_use]
    pub fn build(self) -> Value {
        json!({
            "number": format!("0x{:x}", self.number),
            "hash": self.hash,
            "parentHash": self.parent_hash,
            "timestamp": format!("0x{:x}", self.timestamp),
            "transactions": [],
            "gasLimit": "0x1c9c380",
            "gasUsed": "0x5208",
            "miner": "0x0000000000000000000000000000000000000000"
        })
    }
}

#[derive(Debug, Clone)]
struct NodeScript {
    peer_count: u64,
    syncing: Value,
    latest: u64,
    safe: u64,
    finalized: u64,
    fork: Option<u8>,
    history: BTreeMap<u64, Option<u8>>,
    offline: bool,
}

impl Default for NodeScript {
    fn default() -> Self {
        Self {
            peer_count: 5,
            syncing: Value::Bool(false),
            latest: 0x101,
            safe: 0xe1,
            finalized: 0xc1,
            fork: None,
            history: BTreeMap::new(),
            offline: false,
        }
    }
}

/// Mock node answering the tracker's probes.
///
/// Starts synced with 5 peers at `latest = 0x101`, `safe = 0xe1`, `finalized = 0xc1`. Every
/// setter re-installs the mocks so the next request sees the new script.
pub struct MockNode {
    server: ServerGuard,
    mocks: Vec<Mock>,
    script: NodeScript,
}

impl MockNode {
    /// Creates a node on a fresh mockito server.
    pub async fn new() -> Self {
        let mut node =
            Self { server: Server::new_async().await, mocks: Vec::new(), script: NodeScript::default() };
        node.apply().await;
        node
    }

    /// Returns the URL of the mock server.
    #[must_use]
    pub fn url(&self) -> String {
        self.server.url()
    }

    pub async fn set_peer_count(&mut self, peer_count: u64) {
        self.script.peer_count = peer_count;
        self.apply().await;
    }

    pub async fn set_syncing(&mut self, current_block: u64, highest_block: u64) {
        self.script.syncing = json!({
            "startingBlock": "0x0",
            "currentBlock": format!("0x{current_block:x}"),
            "highestBlock": format!("0x{highest_block:x}")
        });
        self.apply().await;
    }

    pub async fn set_synced(&mut self) {
        self.script.syncing = Value::Bool(false);
        self.apply().await;
    }

    pub async fn set_heads(&mut self, latest: u64, safe: u64, finalized: u64) {
        self.script.latest = latest;
        self.script.safe = safe;
        self.script.finalized = finalized;
        self.apply().await;
    }

    /// Serves tagged blocks from fork `fork` (`None` for the canonical chain).
    pub async fn set_fork(&mut self, fork: Option<u8>) {
        self.script.fork = fork;
        self.apply().await;
    }

    /// Serves block `number` from fork `fork` when asked by number.
    pub async fn serve_block(&mut self, number: u64, fork: Option<u8>) {
        self.script.history.insert(number, fork);
        self.apply().await;
    }

    /// Answers every request with `503 Service Unavailable`.
    pub async fn go_offline(&mut self) {
        self.script.offline = true;
        self.apply().await;
    }

    pub async fn come_online(&mut self) {
        self.script.offline = false;
        self.apply().await;
    }

    /// Number of installed mocks that were hit at least once since the last script change.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.mocks.iter().filter(|m| m.matched()).count()
    }

    async fn apply(&mut self) {
        self.server.reset_async().await;
        self.mocks.clear();

        if self.script.offline {
            let mock = self
                .server
                .mock("POST", "/")
                .with_status(503)
                .with_body("Service Unavailable")
                .create_async()
                .await;
            self.mocks.push(mock);
            return;
        }

        let script = self.script.clone();

        self.mock_result(method_matcher("net_peerCount"), json!(format!("0x{:x}", script.peer_count)))
            .await;
        self.mock_result(method_matcher("eth_syncing"), script.syncing.clone()).await;

        for (tag, number) in
            [("latest", script.latest), ("safe", script.safe), ("finalized", script.finalized)]
        {
            let block = BlockResponseBuilder::new(number).on_fork(script.fork).build();
            self.mock_result(block_matcher(&format!("\"{tag}\"")), block).await;
        }

        for (number, fork) in &script.history {
            let block = BlockResponseBuilder::new(*number).on_fork(*fork).build();
            self.mock_result(block_matcher(&format!("\"0x{number:x}\"")), block).await;
        }
    }

    async fn mock_result(&mut self, matcher: Matcher, result: Value) {
        let mock = self
            .server
            .mock("POST", "/")
            .match_body(matcher)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": result
                })
                .to_string(),
            )
            .create_async()
            .await;

        self.mocks.push(mock);
    }
}

fn method_matcher(method: &str) -> Matcher {
    Matcher::Regex(format!(r#""method"\s*:\s*"{method}""#))
}

fn block_matcher(first_param: &str) -> Matcher {
    Matcher::AllOf(vec![
        method_matcher("eth_getBlockByNumber"),
        Matcher::Regex(format!(r#""params"\s*:\s*\[{first_param}"#)),
    ])
}
