// GET/POST handlers: version, snapshot, stream health, scan trigger

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::AppState;
use crate::fetch::ScanError;
use crate::models::ScanRequest;
use crate::scan::trigger_scan;
use crate::stream::StreamId;

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// GET /version: returns service name and version (from Cargo.toml at build time).
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /api/snapshot: latest dashboard snapshot.
pub(super) async fn snapshot_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.feed.latest().as_ref().clone())
}

/// GET /api/streams: per-stream health only.
pub(super) async fn streams_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.feed.latest().streams.clone())
}

/// POST /api/security/scan: forwards to the backend; a completed scan refreshes the scans stream.
pub(super) async fn scan_handler(
    State(state): State<AppState>,
    body: Option<Json<ScanRequest>>,
) -> Response {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    match trigger_scan(&state.client, &state.scheduler, &request).await {
        Ok(result) => Json(result).into_response(),
        Err(ScanError::Rejected(error)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "error": error })),
        )
            .into_response(),
        Err(ScanError::Fetch(e)) => {
            tracing::warn!(error = %e, operation = "post_scan", "scan request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({ "error": e.to_string(), "cause": e })),
            )
                .into_response()
        }
    }
}

/// POST /api/streams/{id}/refresh: one out-of-band poll of a registered stream.
/// 202 when queued, 404 for a stream the scheduler does not run, 503 once stopped.
pub(super) async fn refresh_handler(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Response {
    let id = match raw.parse::<StreamId>() {
        Ok(id) if state.feed.latest().stream(id).is_some() => id,
        _ => {
            return (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({ "error": format!("unknown stream {:?}", raw) })),
            )
                .into_response();
        }
    };
    match state.scheduler.refresh(id).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "stream": id })),
        )
            .into_response(),
        Err(e) => {
            tracing::debug!(stream = %id, error = %e, "refresh rejected");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}
