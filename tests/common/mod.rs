// Shared test helpers: an in-process mock of the telemetry API, and snapshot waiting.
#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use opsdash::aggregator::DashboardSnapshot;
use opsdash::models::*;
use opsdash::scheduler::SnapshotFeed;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, sleep, timeout};

/// Knobs and counters shared between the test and the mock handlers.
#[derive(Clone, Default)]
pub struct BackendState {
    hits: Arc<Mutex<HashMap<&'static str, usize>>>,
    /// Next CPU sample value; incremented on every successful metrics response.
    next_cpu: Arc<AtomicU64>,
    pub metrics_fail: Arc<AtomicBool>,
    pub metrics_delay_ms: Arc<AtomicU64>,
    metrics_concurrent: Arc<AtomicUsize>,
    metrics_max_concurrent: Arc<AtomicUsize>,
    pub alerts_malformed: Arc<AtomicBool>,
    pub scan_reject: Arc<AtomicBool>,
}

impl BackendState {
    fn hit(&self, key: &'static str) {
        *self.hits.lock().unwrap().entry(key).or_insert(0) += 1;
    }

    pub fn hits(&self, key: &'static str) -> usize {
        self.hits.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn max_concurrent_metrics(&self) -> usize {
        self.metrics_max_concurrent.load(Ordering::SeqCst)
    }
}

pub struct MockBackend {
    pub base_url: String,
    pub state: BackendState,
}

/// Binds the mock API on an ephemeral port; `base_url` points at its `/api` root.
pub async fn spawn_backend() -> MockBackend {
    let state = BackendState::default();
    state.next_cpu.store(1, Ordering::SeqCst);
    let router = Router::new()
        .route("/api/metrics/current", get(metrics))
        .route("/api/alerts", get(alerts))
        .route("/api/security/scans", get(scans))
        .route("/api/security/scan", post(run_scan))
        .route("/api/network/connections", get(connections))
        .route("/api/docker/status", get(docker_status))
        .route("/api/docker/containers", get(docker_containers))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    MockBackend {
        base_url: format!("http://{}/api", addr),
        state,
    }
}

struct ConcurrencyGuard(Arc<AtomicUsize>);

impl Drop for ConcurrencyGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn metrics(State(s): State<BackendState>) -> Response {
    s.hit("metrics");
    let now = s.metrics_concurrent.fetch_add(1, Ordering::SeqCst) + 1;
    let _guard = ConcurrencyGuard(s.metrics_concurrent.clone());
    s.metrics_max_concurrent.fetch_max(now, Ordering::SeqCst);

    let delay = s.metrics_delay_ms.load(Ordering::SeqCst);
    if delay > 0 {
        sleep(Duration::from_millis(delay)).await;
    }
    if s.metrics_fail.load(Ordering::SeqCst) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "psutil failure" })),
        )
            .into_response();
    }
    let cpu = s.next_cpu.fetch_add(1, Ordering::SeqCst) as f64;
    Json(json!({
        "cpu": { "usage_percent": cpu, "core_count": 4, "frequency_mhz": 2400.0 },
        "memory": { "percent": 42.0, "used_gb": 6.7, "total_gb": 16.0 },
        "disk": { "percent": 63.5 },
        "network": { "send_rate_mbps": 0.25, "recv_rate_mbps": 1.5, "bytes_sent": 1024 }
    }))
    .into_response()
}

async fn alerts(State(s): State<BackendState>) -> Response {
    s.hit("alerts");
    if s.alerts_malformed.load(Ordering::SeqCst) {
        return Json(json!({ "alerts": "not a list" })).into_response();
    }
    Json(json!([
        {
            "id": 2, "type": "performance", "severity": "high",
            "message": "CPU above 90%", "timestamp": "2026-10-18T10:00:05", "acknowledged": false
        },
        {
            "id": 1, "type": "security", "severity": "low",
            "message": "New SSH login", "timestamp": "2026-10-18T09:59:00"
        }
    ]))
    .into_response()
}

async fn scans(State(s): State<BackendState>) -> Response {
    s.hit("scans");
    Json(json!([
        {
            "id": 7, "target": "localhost", "scan_type": "quick", "status": "success",
            "risk_level": "medium",
            "open_ports": [22, { "port": 80, "protocol": "tcp", "service": "http" }],
            "vulnerabilities": [
                { "name": "HTTP Open", "description": "consider using HTTPS", "severity": "low" }
            ],
            "timestamp": "2026-10-18T09:00:00"
        }
    ]))
    .into_response()
}

async fn run_scan(State(s): State<BackendState>, Json(req): Json<ScanRequest>) -> Response {
    s.hit("scan_post");
    if s.scan_reject.load(Ordering::SeqCst) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Invalid target. Only localhost scanning is permitted.",
                "allowed_targets": ["localhost", "127.0.0.1", "::1"]
            })),
        )
            .into_response();
    }
    Json(json!({
        "target": req.target,
        "status": "success",
        "risk_level": "low",
        "open_ports": [22],
        "vulnerabilities": [],
        "timestamp": "2026-10-18T10:01:00"
    }))
    .into_response()
}

async fn connections(State(s): State<BackendState>) -> Response {
    s.hit("connections");
    Json(json!([
        { "local_address": "10.0.0.2:22", "remote_address": "10.0.0.9:51514", "status": "ESTABLISHED", "pid": 812 },
        { "local_address": "10.0.0.2:443", "remote_address": "10.0.0.7:40022", "status": "ESTABLISHED", "pid": null }
    ]))
    .into_response()
}

async fn docker_status(State(s): State<BackendState>) -> Response {
    s.hit("docker_status");
    Json(json!({
        "available": true,
        "system_info": { "containers_running": 1, "containers_stopped": 1, "images": 3 }
    }))
    .into_response()
}

async fn docker_containers(State(s): State<BackendState>) -> Response {
    s.hit("docker_containers");
    Json(json!([
        { "id": "4f1c2a9be07d11aa", "name": "web", "image": "nginx:1.27", "status": "running", "created": "2026-10-17 08:00:00" },
        { "id": "9b0e77c1d2f3aa00", "name": "batch", "image": "alpine", "status": "exited", "created": "2026-10-16 21:12:00" }
    ]))
    .into_response()
}

/// Waits (up to 5s) for a published snapshot matching `done`.
pub async fn wait_for_snapshot(
    feed: &SnapshotFeed,
    done: impl Fn(&DashboardSnapshot) -> bool,
) -> Arc<DashboardSnapshot> {
    let mut rx = feed.watch();
    timeout(Duration::from_secs(5), async move {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if done(&snapshot) {
                return snapshot;
            }
            rx.changed().await.expect("scheduler stopped before condition was met");
        }
    })
    .await
    .expect("timed out waiting for snapshot")
}

pub fn sample_metrics(cpu: f64) -> CurrentMetrics {
    CurrentMetrics {
        cpu: CpuMetrics {
            usage_percent: cpu,
            core_count: None,
            frequency_mhz: None,
        },
        memory: MemoryMetrics {
            percent: cpu / 2.0,
            used_gb: None,
            total_gb: None,
        },
        disk: DiskMetrics {
            percent: 10.0,
            used_gb: None,
            total_gb: None,
        },
        network: NetworkMetrics {
            send_rate_mbps: 0.1,
            recv_rate_mbps: 0.2,
        },
    }
}
