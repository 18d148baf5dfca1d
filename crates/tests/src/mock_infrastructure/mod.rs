//! Mock Infrastructure for Testing Vigil
//!
//! This module provides reusable mock types for exercising the tracker over real HTTP
//! without requiring running nodes.
//!
//! ## Components
//!
//! - `MockNode`: mockito server scripted to answer the tracker's probes
//! - `BlockResponseBuilder`: Block JSON with canonical or forked hashes
//! - Test helpers to wire mock nodes into a `BackendGroup`
//!
//! ## Usage
//!
//! ```ignore
//! use tests::mock_infrastructure::{MockNode, NodeSpec, build_group};
//!
//! let normal = MockNode::new().await;
//! let fallback = MockNode::new().await;
//! let group = build_group(&[NodeSpec::primary("normal", &normal), NodeSpec::fallback("fallback", &fallback)], TrackerSettings::default());
//! ```

pub mod rpc_mock;
pub mod test_helpers;

pub use rpc_mock::{block_hash, BlockResponseBuilder, MockNode};
pub use test_helpers::*;
