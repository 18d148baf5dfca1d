use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use vigil_core::{
    types::{BlockRef, PriorityClass},
    BackendGroup, TrackerError,
};

/// Per-backend entry of the `/consensus` view.
#[derive(Debug, Serialize)]
pub struct BackendView {
    pub name: String,
    pub class: PriorityClass,
    pub rank: u32,
    pub in_group: bool,
    pub healthy: bool,
    pub peer_count: u64,
    pub in_sync: bool,
    pub latest: BlockRef,
    pub safe: BlockRef,
    pub finalized: BlockRef,
    pub last_update: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// The most recent round failed at the probe level rather than on health.
    pub probe_failed: bool,
}

/// A healthy backend left out of the group and why.
#[derive(Debug, Serialize)]
pub struct ExclusionView {
    pub name: String,
    pub reason: String,
}

/// Body of `GET /consensus`.
#[derive(Debug, Serialize)]
pub struct ConsensusView {
    pub round: u64,
    pub published_at: Option<DateTime<Utc>>,
    pub fallback_mode: bool,
    pub group: Vec<String>,
    pub latest: BlockRef,
    pub safe: BlockRef,
    pub finalized: BlockRef,
    /// Reason the group is degraded or empty, if it is.
    pub outcome: Option<String>,
    pub unavailable: bool,
    pub excluded: Vec<ExclusionView>,
    pub backends: Vec<BackendView>,
}

impl ConsensusView {
    /// Builds the view from the published snapshot and a copy of every backend's state.
    ///
    /// The two are read one after the other without holding the round lock, so a round that
    /// publishes in between can make the per-backend entries one round newer than the
    /// group-level fields. `round` identifies the snapshot the group-level fields come from.
    #[must_use]
    pub fn from_group(group: &BackendGroup) -> Self {
        let snapshot = group.snapshot();

        let backends = group
            .backends()
            .iter()
            .map(|backend| {
                let state = group.get_backend_state(backend.name()).unwrap_or_default();
                BackendView {
                    name: backend.name().to_string(),
                    class: backend.class(),
                    rank: backend.rank(),
                    in_group: snapshot.contains(backend.name()),
                    healthy: state.healthy,
                    peer_count: state.peer_count,
                    in_sync: state.in_sync,
                    latest: state.latest,
                    safe: state.safe,
                    finalized: state.finalized,
                    last_update: state.last_update,
                    probe_failed: state.last_error.as_ref().is_some_and(TrackerError::is_probe_failure),
                    last_error: state.last_error.map(|e| e.to_string()),
                }
            })
            .collect();

        Self {
            round: snapshot.round,
            published_at: snapshot.published_at,
            fallback_mode: snapshot.fallback_mode,
            group: snapshot.member_names().iter().map(ToString::to_string).collect(),
            latest: snapshot.latest,
            safe: snapshot.safe,
            finalized: snapshot.finalized,
            outcome: snapshot.outcome.as_ref().map(ToString::to_string),
            unavailable: snapshot.outcome.as_ref().is_some_and(TrackerError::is_unavailable),
            excluded: snapshot
                .excluded
                .iter()
                .map(|(name, reason)| ExclusionView { name: name.to_string(), reason: reason.to_string() })
                .collect(),
            backends,
        }
    }
}

pub fn create_router(group: Arc<BackendGroup>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/consensus", get(handle_consensus))
        .with_state(group)
}

/// Reports whether there is anything to serve from.
///
/// Returns `503` while the consensus group is empty, including before the first round.
pub async fn handle_health(State(group): State<Arc<BackendGroup>>) -> impl IntoResponse {
    let snapshot = group.snapshot();
    let available = !snapshot.is_empty();

    let health_status = serde_json::json!({
        "status": if available { "healthy" } else { "unhealthy" },
        "fallback_mode": snapshot.fallback_mode,
        "group_size": snapshot.group.len(),
        "latest_block": snapshot.latest.number,
        "timestamp": Utc::now().to_rfc3339()
    });

    (
        if available { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE },
        Json(health_status),
    )
}

pub async fn handle_consensus(State(group): State<Arc<BackendGroup>>) -> Json<ConsensusView> {
    Json(ConsensusView::from_group(&group))
}
