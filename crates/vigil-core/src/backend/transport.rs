//! Backend wire transport.
//!
//! [`BackendTransport`] is the capability the tracker consumes: four read-only calls that
//! either return an already-decoded value or a [`ProbeError`]. [`RpcTransport`] implements it
//! with JSON-RPC 2.0 over HTTP.

use super::{errors::ProbeError, http_client::HttpClient};
use crate::types::{hex_to_hash, hex_to_u64, BlockRef, BlockTag, SyncStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

/// Capability to query one upstream node.
///
/// Implementations must not retry and must not cache; the poller owns both concerns.
#[async_trait]
pub trait BackendTransport: Send + Sync {
    /// Number of peers the node is connected to (`net_peerCount`).
    async fn peer_count(&self) -> Result<u64, ProbeError>;

    /// Sync progress of the node (`eth_syncing`).
    async fn sync_status(&self) -> Result<SyncStatus, ProbeError>;

    /// Block currently referenced by `tag`.
    async fn block_by_tag(&self, tag: BlockTag) -> Result<BlockRef, ProbeError>;

    /// Block at a specific height, used to compare hashes across backends.
    async fn block_by_number(&self, number: u64) -> Result<BlockRef, ProbeError>;
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

/// JSON-RPC over HTTP transport for one node.
pub struct RpcTransport {
    url: String,
    client: Arc<HttpClient>,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl RpcTransport {
    /// Creates a transport for `url`.
    ///
    /// `request_timeout` bounds the HTTP exchange itself; the backend applies its own probe
    /// timeout on top.
    #[must_use]
    pub fn new(url: impl Into<String>, client: Arc<HttpClient>, request_timeout: Duration) -> Self {
        Self { url: url.into(), client, request_timeout, next_id: AtomicU64::new(1) }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Performs one JSON-RPC call and returns the `result` member.
    async fn call(&self, method: &str, params: Value) -> Result<Value, ProbeError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let body = serde_json::to_vec(&request)
            .map_err(|e| ProbeError::InvalidResponse(format!("failed to encode request: {e}")))?;

        let bytes = self.client.post(&self.url, bytes::Bytes::from(body), self.request_timeout).await?;

        let response: JsonRpcResponse = serde_json::from_slice(&bytes)
            .map_err(|e| ProbeError::InvalidResponse(format!("invalid JSON: {e}")))?;

        if let Some(error) = response.error {
            return Err(ProbeError::Rpc(error.code, error.message));
        }

        response
            .result
            .ok_or_else(|| ProbeError::InvalidResponse(format!("{method}: missing result")))
    }
}

#[async_trait]
impl BackendTransport for RpcTransport {
    async fn peer_count(&self) -> Result<u64, ProbeError> {
        let result = self.call("net_peerCount", Value::Array(Vec::new())).await?;
        parse_quantity(&result, "net_peerCount")
    }

    async fn sync_status(&self) -> Result<SyncStatus, ProbeError> {
        let result = self.call("eth_syncing", Value::Array(Vec::new())).await?;
        parse_sync_status(&result)
    }

    async fn block_by_tag(&self, tag: BlockTag) -> Result<BlockRef, ProbeError> {
        let result = self.call("eth_getBlockByNumber", serde_json::json!([tag.as_str(), false])).await?;
        parse_block_ref(&result)
    }

    async fn block_by_number(&self, number: u64) -> Result<BlockRef, ProbeError> {
        let result = self
            .call("eth_getBlockByNumber", serde_json::json!([format!("0x{number:x}"), false]))
            .await?;
        parse_block_ref(&result)
    }
}

fn parse_quantity(value: &Value, what: &str) -> Result<u64, ProbeError> {
    match value {
        Value::String(s) => hex_to_u64(s)
            .ok_or_else(|| ProbeError::InvalidResponse(format!("{what}: invalid quantity {s:?}"))),
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| ProbeError::InvalidResponse(format!("{what}: invalid quantity {n}"))),
        other => Err(ProbeError::InvalidResponse(format!("{what}: unexpected value {other}"))),
    }
}

/// Decodes an `eth_syncing` result.
///
/// `false` means synced. Progress objects use `currentBlock`/`highestBlock`; key lookup is
/// case-insensitive because some clients emit lowercase keys.
fn parse_sync_status(value: &Value) -> Result<SyncStatus, ProbeError> {
    match value {
        Value::Bool(false) => Ok(SyncStatus::Synced),
        Value::Object(map) => {
            let field = |name: &str| {
                map.iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
                    .ok_or_else(|| ProbeError::InvalidResponse(format!("eth_syncing: missing {name}")))
                    .and_then(|v| parse_quantity(v, "eth_syncing"))
            };
            Ok(SyncStatus::Syncing {
                current_block: field("currentBlock")?,
                highest_block: field("highestBlock")?,
            })
        }
        other => Err(ProbeError::InvalidResponse(format!("eth_syncing: unexpected value {other}"))),
    }
}

fn parse_block_ref(value: &Value) -> Result<BlockRef, ProbeError> {
    if value.is_null() {
        return Err(ProbeError::InvalidResponse("block not found".to_string()));
    }

    let number = value
        .get("number")
        .ok_or_else(|| ProbeError::InvalidResponse("block: missing number".to_string()))
        .and_then(|n| parse_quantity(n, "block number"))?;

    let hash = value
        .get("hash")
        .and_then(Value::as_str)
        .and_then(hex_to_hash)
        .ok_or_else(|| ProbeError::InvalidResponse(format!("block {number:#x}: invalid hash")))?;

    Ok(BlockRef::new(number, hash))
}
