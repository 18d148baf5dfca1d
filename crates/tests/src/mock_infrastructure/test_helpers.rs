//! Test Helper Functions and Utilities
//!
//! Wires [`MockNode`]s into backends and groups the way the server binary does.

use super::rpc_mock::MockNode;
use std::{sync::Arc, time::Duration};
use vigil_core::{
    backend::{BackendTransport, HttpClient, RpcTransport},
    types::PriorityClass,
    Backend, BackendGroup, BackendOptions, TrackerSettings,
};

/// Per-request timeout used by test transports.
pub const TEST_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Description of one backend pointed at a mock node.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub name: String,
    pub url: String,
    pub class: PriorityClass,
    pub rank: u32,
}

impl NodeSpec {
    #[must_use]
    pub fn primary(name: &str, node: &MockNode) -> Self {
        Self { name: name.to_string(), url: node.url(), class: PriorityClass::Primary, rank: 0 }
    }

    #[must_use]
    pub fn fallback(name: &str, node: &MockNode) -> Self {
        Self { name: name.to_string(), url: node.url(), class: PriorityClass::Fallback, rank: 0 }
    }

    #[must_use]
    pub fn rank(mut self, rank: u32) -> Self {
        self.rank = rank;
        self
    }
}

/// Creates an RPC transport for `url` over a fresh HTTP client.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
#[allow(clippy::expect_used)]
pub fn create_transport(url: &str) -> RpcTransport {
    let client = Arc::new(HttpClient::new().expect("http client"));
    RpcTransport::new(url, client, TEST_PROBE_TIMEOUT)
}

/// Builds a backend group over `specs` sharing one HTTP client.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built or two specs share a name.
#[must_use]
#[allow(clippy::expect_used)]
pub fn build_group(specs: &[NodeSpec], settings: TrackerSettings) -> Arc<BackendGroup> {
    let client = Arc::new(HttpClient::new().expect("http client"));

    let backends = specs
        .iter()
        .map(|spec| {
            let transport: Arc<dyn BackendTransport> =
                Arc::new(RpcTransport::new(spec.url.as_str(), Arc::clone(&client), TEST_PROBE_TIMEOUT));
            let options = BackendOptions::new(spec.name.as_str(), spec.class)
                .rank(spec.rank)
                .probe_timeout(TEST_PROBE_TIMEOUT);
            Arc::new(Backend::new(options, transport))
        })
        .collect();

    Arc::new(BackendGroup::new(backends, settings).expect("valid group"))
}

/// Names of the current consensus group members, in priority order.
#[must_use]
pub fn group_names(group: &BackendGroup) -> Vec<String> {
    group.get_consensus_group().iter().map(|b| b.name().to_string()).collect()
}
