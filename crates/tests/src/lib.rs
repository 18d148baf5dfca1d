//! Integration Tests for Vigil
//!
//! This crate drives the tracker over real HTTP against scripted mock nodes:
//!
//! - `fallback_tests`: Consensus group selection, fallback entry and exit, reset
//! - `transport_tests`: `RpcTransport` decoding and error mapping
//! - `mock_infrastructure`: Reusable mock nodes and group builders
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test --package tests
//! ```
//!
//! No external nodes are required; every backend is a local mockito server.


pub mod mock_infrastructure;
