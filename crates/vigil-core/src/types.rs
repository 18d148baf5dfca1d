//! Chain and backend primitives shared by the transport, poller and resolver.
//!
//! # Core Types
//! - [`BlockRef`]: A `(number, hash)` point on a backend's view of the chain
//! - [`BlockTag`]: The block tags probed every round (`latest`, `safe`, `finalized`)
//! - [`SyncStatus`]: Decoded `eth_syncing` result
//! - [`PriorityClass`]: Whether a backend serves normally or only in fallback mode
//!
//! Hex helpers live here as well so that every module decodes node responses the same way.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// 32-byte block hash.
pub type BlockHash = [u8; 32];

/// A specific block on a backend's view of the chain.
///
/// The zero value (`number == 0`, all-zero hash) means "unknown": no successful poll has
/// reported this reference yet. Ordering between references is by `number` only; the hash
/// is used to detect divergence at equal height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct BlockRef {
    pub number: u64,
    #[serde(serialize_with = "serialize_hash")]
    pub hash: BlockHash,
}

impl BlockRef {
    #[must_use]
    pub const fn new(number: u64, hash: BlockHash) -> Self {
        Self { number, hash }
    }

    /// Returns `true` if this reference has never been populated.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.number == 0 && self.hash == [0u8; 32]
    }

    /// Returns the block number as a `0x`-prefixed hex quantity.
    #[must_use]
    pub fn number_hex(&self) -> String {
        format!("0x{:x}", self.number)
    }

    /// Returns the block hash as a `0x`-prefixed hex string.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }
}

impl fmt::Display for BlockRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number_hex(), self.hash_hex())
    }
}

fn serialize_hash<S: Serializer>(hash: &BlockHash, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("0x{}", hex::encode(hash)))
}

/// Block tags probed on every backend each round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockTag {
    /// The most recent block in the canonical chain
    Latest,
    /// The most recent safe head block
    Safe,
    /// The most recent finalized block
    Finalized,
}

impl BlockTag {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latest => "latest",
            Self::Safe => "safe",
            Self::Finalized => "finalized",
        }
    }
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sync progress reported by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// `eth_syncing` returned `false`.
    Synced,
    /// `eth_syncing` returned a progress object.
    Syncing { current_block: u64, highest_block: u64 },
}

impl SyncStatus {
    /// A node is in sync when it is not syncing or its current block has caught up with the
    /// highest block it knows about.
    #[must_use]
    pub fn is_in_sync(&self) -> bool {
        match self {
            Self::Synced => true,
            Self::Syncing { current_block, highest_block } => current_block == highest_block,
        }
    }
}

/// Priority class of a backend.
///
/// `Primary` backends serve traffic in normal mode. `Fallback` backends serve only while the
/// fallback latch is set. Ordering puts `Primary` first.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PriorityClass {
    #[default]
    Primary,
    Fallback,
}

impl PriorityClass {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for PriorityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Hex Utilities ---

/// Parses a `0x`-prefixed hex quantity. Unprefixed input is tried as decimal, then hex.
#[must_use]
pub fn hex_to_u64(s: &str) -> Option<u64> {
    if let Some(hex_str) = s.strip_prefix("0x") {
        u64::from_str_radix(hex_str, 16).ok()
    } else {
        s.parse::<u64>().ok().or_else(|| u64::from_str_radix(s, 16).ok())
    }
}

/// Decodes a 32-byte hash, with or without the `0x` prefix.
#[must_use]
pub fn hex_to_hash(s: &str) -> Option<BlockHash> {
    let mut hash = [0u8; 32];
    hex::decode_to_slice(s.strip_prefix("0x").unwrap_or(s), &mut hash).ok()?;
    Some(hash)
}
