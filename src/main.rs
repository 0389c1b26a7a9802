use anyhow::Result;
use opsdash::health::StreamHealth;
use opsdash::*;
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

/// Logs dashboard client count and a per-health stream tally every `every`.
fn spawn_stats_logger(
    feed: scheduler::SnapshotFeed,
    ws_dashboard_connections: Arc<AtomicUsize>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = interval(every);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tick.tick().await;
        loop {
            tick.tick().await;
            let snapshot = feed.latest();
            let count = |h: StreamHealth| {
                snapshot
                    .streams
                    .iter()
                    .filter(|s| s.state.health == h)
                    .count()
            };
            tracing::info!(
                ws_dashboard_clients =
                    ws_dashboard_connections.load(std::sync::atomic::Ordering::Relaxed),
                generation = snapshot.generation,
                streams_healthy = count(StreamHealth::Healthy),
                streams_degraded = count(StreamHealth::Degraded),
                streams_failed = count(StreamHealth::Failed),
                "app stats"
            );
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();

    let app_config = config::AppConfig::load()?;
    let client = fetch::TelemetryClient::new(
        &app_config.backend.base_url,
        Duration::from_millis(app_config.backend.request_timeout_ms),
    )?;
    let descriptors = stream::descriptors_from_config(&app_config);
    tracing::info!(
        backend = %client.base_url(),
        streams = descriptors.len(),
        "Starting telemetry polling"
    );

    let poller = scheduler::spawn(
        descriptors,
        client.clone(),
        scheduler::SchedulerConfig {
            initial_stagger: Duration::from_millis(app_config.polling.initial_stagger_ms),
            series_capacity: app_config.polling.series_capacity,
            broadcast_capacity: app_config.server.broadcast_capacity,
        },
    );

    let ws_dashboard_connections = Arc::new(AtomicUsize::new(0));
    let stats_handle = spawn_stats_logger(
        poller.feed(),
        ws_dashboard_connections.clone(),
        Duration::from_secs(app_config.server.stats_log_interval_secs),
    );

    let app = routes::app(
        poller.feed(),
        poller.handle(),
        client,
        ws_dashboard_connections,
    );
    let addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::select! {
        result = axum::serve(listener, app) => {
            result?;
        }
        _ = async {
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(s) => s,
                    Err(_) => {
                        let _ = tokio::signal::ctrl_c().await;
                        return;
                    }
                };
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            #[cfg(not(unix))]
            {
                let _ = tokio::signal::ctrl_c().await;
            }
        } => {
            tracing::info!("Received shutdown signal");
        }
    }

    stats_handle.abort();
    poller.shutdown().await;
    Ok(())
}
