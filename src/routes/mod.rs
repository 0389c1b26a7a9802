// HTTP + WebSocket routes (snapshot surface for the dashboard page)

mod http;
mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tower_http::cors::{Any, CorsLayer};

use crate::fetch::TelemetryClient;
use crate::scheduler::{SchedulerHandle, SnapshotFeed};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) feed: SnapshotFeed,
    pub(crate) scheduler: SchedulerHandle,
    pub(crate) client: TelemetryClient,
    pub(crate) ws_dashboard_connections: Arc<AtomicUsize>,
}

pub fn app(
    feed: SnapshotFeed,
    scheduler: SchedulerHandle,
    client: TelemetryClient,
    ws_dashboard_connections: Arc<AtomicUsize>,
) -> Router {
    let state = AppState {
        feed,
        scheduler,
        client,
        ws_dashboard_connections,
    };
    Router::new()
        .route("/", get(|| async { "opsdash: telemetry poller is running" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/snapshot", get(http::snapshot_handler)) // GET /api/snapshot
        .route("/api/streams", get(http::streams_handler)) // GET /api/streams
        .route("/api/streams/{id}/refresh", post(http::refresh_handler)) // POST /api/streams/{id}/refresh
        .route("/api/security/scan", post(http::scan_handler)) // POST /api/security/scan
        .route("/ws/dashboard", get(ws::ws_dashboard)) // WS /ws/dashboard
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
