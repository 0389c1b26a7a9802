// Scheduler tests: staggered start, in-flight guard, failure isolation, stop, out-of-band refresh

mod common;

use common::{spawn_backend, wait_for_snapshot};
use opsdash::fetch::{ScanError, TelemetryClient};
use opsdash::health::StreamHealth;
use opsdash::models::ScanRequest;
use opsdash::scan::trigger_scan;
use opsdash::scheduler::{self, Scheduler, SchedulerConfig};
use opsdash::stream::{StreamDescriptor, StreamId};
use std::sync::atomic::Ordering;
use tokio::time::{Duration, sleep};

fn start(
    base_url: &str,
    descriptors: Vec<StreamDescriptor>,
    initial_stagger: Duration,
) -> (Scheduler, TelemetryClient) {
    let client = TelemetryClient::new(base_url, Duration::from_secs(1)).unwrap();
    let s = scheduler::spawn(
        descriptors,
        client.clone(),
        SchedulerConfig {
            initial_stagger,
            series_capacity: 20,
            broadcast_capacity: 16,
        },
    );
    (s, client)
}

#[tokio::test]
async fn first_polls_are_staggered_by_index() {
    let backend = spawn_backend().await;
    let (s, _) = start(
        &backend.base_url,
        vec![
            StreamDescriptor::metrics(Duration::from_secs(60)),
            StreamDescriptor::alerts(Duration::from_secs(60), 10),
        ],
        Duration::from_millis(400),
    );
    sleep(Duration::from_millis(150)).await;
    assert_eq!(backend.state.hits("metrics"), 1);
    assert_eq!(backend.state.hits("alerts"), 0);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(backend.state.hits("metrics"), 1);
    assert_eq!(backend.state.hits("alerts"), 1);
    s.shutdown().await;
}

#[tokio::test]
async fn slow_endpoint_never_has_overlapping_requests() {
    let backend = spawn_backend().await;
    backend.state.metrics_delay_ms.store(120, Ordering::SeqCst);
    let (s, _) = start(
        &backend.base_url,
        vec![StreamDescriptor::metrics(Duration::from_millis(20))],
        Duration::ZERO,
    );
    let feed = s.feed();
    let snap = wait_for_snapshot(&feed, |snap| snap.metrics.cpu.len() >= 3).await;
    s.shutdown().await;

    assert_eq!(backend.state.max_concurrent_metrics(), 1);
    // Resolutions are folded in dispatch order, so the rolling window stays increasing.
    assert!(snap.metrics.cpu.windows(2).all(|w| w[0] < w[1]), "{:?}", snap.metrics.cpu);
    // With a 20ms tick and 120ms responses, unguarded polling would have issued ~20 requests.
    assert!(backend.state.hits("metrics") <= 6);
}

#[tokio::test]
async fn failing_stream_does_not_disturb_others_and_recovers() {
    let backend = spawn_backend().await;
    backend.state.metrics_fail.store(true, Ordering::SeqCst);
    let (s, _) = start(
        &backend.base_url,
        vec![
            StreamDescriptor::metrics(Duration::from_millis(30)).with_max_consecutive_failures(3),
            StreamDescriptor::alerts(Duration::from_millis(30), 10),
        ],
        Duration::ZERO,
    );
    let feed = s.feed();

    let snap = wait_for_snapshot(&feed, |snap| {
        snap.stream(StreamId::Metrics).map(|st| st.health) == Some(StreamHealth::Failed)
            && !snap.alerts.is_empty()
    })
    .await;
    assert!(snap.metrics.cpu.is_empty());
    assert!(snap.metrics.labels.is_empty());
    assert_eq!(
        snap.stream(StreamId::Alerts).unwrap().health,
        StreamHealth::Healthy
    );

    backend.state.metrics_fail.store(false, Ordering::SeqCst);
    let snap = wait_for_snapshot(&feed, |snap| {
        snap.stream(StreamId::Metrics).map(|st| st.health) == Some(StreamHealth::Healthy)
    })
    .await;
    assert_eq!(snap.stream(StreamId::Metrics).unwrap().consecutive_failures, 0);
    assert!(!snap.metrics.cpu.is_empty());
    assert_eq!(snap.metrics.labels.len(), snap.metrics.cpu.len());
    s.shutdown().await;
}

#[tokio::test]
async fn stop_discards_in_flight_result_and_is_idempotent() {
    let backend = spawn_backend().await;
    backend.state.metrics_delay_ms.store(200, Ordering::SeqCst);
    let (s, _) = start(
        &backend.base_url,
        vec![StreamDescriptor::metrics(Duration::from_millis(50))],
        Duration::ZERO,
    );
    let feed = s.feed();
    let handle = s.handle();

    sleep(Duration::from_millis(60)).await;
    assert_eq!(backend.state.hits("metrics"), 1);
    s.stop();
    s.stop();
    assert!(!handle.is_active());

    sleep(Duration::from_millis(400)).await;
    let snap = feed.latest();
    assert_eq!(snap.generation, 0);
    assert!(snap.metrics.cpu.is_empty());
    assert_eq!(backend.state.hits("metrics"), 1);
    assert!(handle.refresh(StreamId::Metrics).await.is_err());
    s.shutdown().await;
}

#[tokio::test]
async fn warmup_ticks_follow_first_poll() {
    let backend = spawn_backend().await;
    let (s, _) = start(
        &backend.base_url,
        vec![
            StreamDescriptor::metrics(Duration::from_secs(60))
                .with_warmup(3, Duration::from_millis(60)),
        ],
        Duration::ZERO,
    );
    let feed = s.feed();
    let snap = wait_for_snapshot(&feed, |snap| snap.metrics.cpu.len() == 4).await;
    assert_eq!(snap.metrics.cpu, vec![1.0, 2.0, 3.0, 4.0]);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(backend.state.hits("metrics"), 4);
    s.shutdown().await;
}

#[tokio::test]
async fn successful_scan_triggers_exactly_one_scans_refresh() {
    let backend = spawn_backend().await;
    let (s, client) = start(
        &backend.base_url,
        vec![StreamDescriptor::scans(Duration::from_secs(3600), 5)],
        Duration::ZERO,
    );
    let feed = s.feed();
    let handle = s.handle();
    wait_for_snapshot(&feed, |snap| snap.generation >= 1).await;
    assert_eq!(backend.state.hits("scans"), 1);

    let result = trigger_scan(&client, &handle, &ScanRequest::default())
        .await
        .unwrap();
    assert_eq!(result.target, "localhost");
    let snap = wait_for_snapshot(&feed, |snap| snap.generation >= 2).await;
    assert_eq!(snap.scans.len(), 1);
    sleep(Duration::from_millis(150)).await;
    assert_eq!(backend.state.hits("scans"), 2);
    assert_eq!(backend.state.hits("scan_post"), 1);

    backend.state.scan_reject.store(true, Ordering::SeqCst);
    let err = trigger_scan(&client, &handle, &ScanRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::Rejected(_)));
    sleep(Duration::from_millis(150)).await;
    assert_eq!(backend.state.hits("scans"), 2);
    assert_eq!(feed.latest().generation, 2);
    s.shutdown().await;
}

#[tokio::test]
async fn refresh_while_in_flight_runs_once_after_resolution() {
    let backend = spawn_backend().await;
    backend.state.metrics_delay_ms.store(150, Ordering::SeqCst);
    let (s, _) = start(
        &backend.base_url,
        vec![StreamDescriptor::metrics(Duration::from_secs(3600))],
        Duration::ZERO,
    );
    let feed = s.feed();
    let handle = s.handle();

    sleep(Duration::from_millis(50)).await;
    assert_eq!(backend.state.hits("metrics"), 1);
    handle.refresh(StreamId::Metrics).await.unwrap();
    handle.refresh(StreamId::Metrics).await.unwrap();

    let snap = wait_for_snapshot(&feed, |snap| snap.metrics.cpu.len() == 2).await;
    assert_eq!(snap.metrics.cpu, vec![1.0, 2.0]);
    sleep(Duration::from_millis(300)).await;
    assert_eq!(backend.state.hits("metrics"), 2);
    s.shutdown().await;
}

#[tokio::test]
async fn every_resolution_is_broadcast_to_subscribers() {
    let backend = spawn_backend().await;
    let (s, _) = start(
        &backend.base_url,
        vec![
            StreamDescriptor::metrics(Duration::from_secs(3600)),
            StreamDescriptor::connections(Duration::from_secs(3600)),
        ],
        Duration::from_millis(100),
    );
    let mut rx = s.feed().subscribe();
    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.generation, 1);
    assert_eq!(second.generation, 2);
    assert_eq!(first.metrics.cpu, vec![1.0]);
    assert_eq!(second.connections.len(), 2);
    s.shutdown().await;
}

#[tokio::test]
async fn zero_interval_descriptor_still_polls() {
    let backend = spawn_backend().await;
    let (s, _) = start(
        &backend.base_url,
        vec![StreamDescriptor::metrics(Duration::ZERO).with_warmup(1, Duration::ZERO)],
        Duration::ZERO,
    );
    let feed = s.feed();
    let snap = wait_for_snapshot(&feed, |snap| snap.metrics.cpu.len() >= 3).await;
    assert!(snap.metrics.cpu.windows(2).all(|w| w[0] < w[1]));
    s.shutdown().await;
    assert_eq!(backend.state.max_concurrent_metrics(), 1);
}
