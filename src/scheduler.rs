// Poll scheduler.
// One timer task per stream emits ticks; a single coordinator task owns the aggregator and is the
// only place results are folded in. Fetches run as their own tasks so stop() never cancels a
// request mid-flight; a result that resolves after stop() is dropped.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior, interval, sleep};
use tracing::{Instrument, debug, warn};

use crate::aggregator::{DashboardAggregator, DashboardSnapshot};
use crate::fetch::{FetchError, TelemetryClient};
use crate::stream::{StreamBatch, StreamDescriptor, StreamId};

/// Rate limit for the "no subscribers" message (avoid logging every poll when no one is on /ws/dashboard)
const NO_SUBSCRIBERS_LOG_INTERVAL: Duration = Duration::from_secs(60);

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Floor for timer periods; tokio's `interval` panics on a zero period.
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(1);

pub struct SchedulerConfig {
    /// Stream i gets its first poll at `i * initial_stagger`.
    pub initial_stagger: Duration,
    pub series_capacity: usize,
    /// Snapshots buffered per /ws/dashboard subscriber.
    pub broadcast_capacity: usize,
}

enum Event {
    Tick(StreamId),
    Refresh(StreamId),
    Resolved {
        id: StreamId,
        result: Result<StreamBatch, FetchError>,
    },
}

/// Read side for renderers: the latest snapshot, plus one message per poll resolution.
#[derive(Clone)]
pub struct SnapshotFeed {
    latest: watch::Receiver<Arc<DashboardSnapshot>>,
    updates: broadcast::Sender<Arc<DashboardSnapshot>>,
}

impl SnapshotFeed {
    pub fn latest(&self) -> Arc<DashboardSnapshot> {
        self.latest.borrow().clone()
    }

    /// Receives every snapshot published after this call; slow receivers may lag.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DashboardSnapshot>> {
        self.updates.subscribe()
    }

    /// Latest-value view; intermediate snapshots may be coalesced.
    pub fn watch(&self) -> watch::Receiver<Arc<DashboardSnapshot>> {
        self.latest.clone()
    }
}

/// Cloneable control handle.
#[derive(Clone)]
pub struct SchedulerHandle {
    events: mpsc::Sender<Event>,
    active: Arc<AtomicBool>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl SchedulerHandle {
    /// Requests one poll of `id` outside its timer. If a poll is in flight, the refresh runs
    /// as soon as it resolves; requests made meanwhile coalesce into that one refresh.
    pub async fn refresh(&self, id: StreamId) -> anyhow::Result<()> {
        anyhow::ensure!(self.is_active(), "scheduler stopped");
        self.events
            .send(Event::Refresh(id))
            .await
            .map_err(|_| anyhow::anyhow!("scheduler stopped"))
    }

    /// Cancels every timer and the coordinator. In-flight requests are left to resolve and their
    /// results are discarded. Idempotent.
    pub fn stop(&self) {
        if self.active.swap(false, Ordering::SeqCst) {
            self.shutdown.send_replace(true);
            debug!("scheduler stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

pub struct Scheduler {
    handle: SchedulerHandle,
    feed: SnapshotFeed,
    tasks: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    pub fn feed(&self) -> SnapshotFeed {
        self.feed.clone()
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Stops and waits for the timer and coordinator tasks to exit.
    pub async fn shutdown(self) {
        self.handle.stop();
        for result in futures_util::future::join_all(self.tasks).await {
            if let Err(e) = result {
                warn!(error = %e, "scheduler task ended abnormally");
            }
        }
    }
}

/// Starts one timer per descriptor and the coordinator that owns the aggregator.
pub fn spawn(
    descriptors: Vec<StreamDescriptor>,
    client: TelemetryClient,
    config: SchedulerConfig,
) -> Scheduler {
    let aggregator = DashboardAggregator::new(&descriptors, config.series_capacity);
    let (latest_tx, latest_rx) = watch::channel(Arc::new(aggregator.snapshot()));
    let (updates_tx, _) = broadcast::channel(config.broadcast_capacity.max(1));
    let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let active = Arc::new(AtomicBool::new(true));

    let mut tasks = Vec::with_capacity(descriptors.len() + 1);
    for (index, descriptor) in descriptors.iter().enumerate() {
        let delay = config.initial_stagger.saturating_mul(index as u32);
        let span = tracing::debug_span!("timer", stream = %descriptor.id);
        tasks.push(tokio::spawn(
            run_timer(
                TimerPlan::from_descriptor(descriptor, delay),
                events_tx.clone(),
                shutdown_rx.clone(),
            )
            .instrument(span),
        ));
    }

    let coordinator = Coordinator {
        aggregator,
        descriptors: descriptors
            .into_iter()
            .map(|d| (d.id, Arc::new(d)))
            .collect(),
        client,
        events_tx: events_tx.clone(),
        active: active.clone(),
        latest_tx,
        updates_tx: updates_tx.clone(),
        pending_refresh: HashSet::new(),
        last_no_subscribers_log: None,
    };
    tasks.push(tokio::spawn(
        coordinator
            .run(events_rx, shutdown_rx)
            .instrument(tracing::debug_span!("scheduler")),
    ));

    Scheduler {
        handle: SchedulerHandle {
            events: events_tx,
            active,
            shutdown: Arc::new(shutdown_tx),
        },
        feed: SnapshotFeed {
            latest: latest_rx,
            updates: updates_tx,
        },
        tasks,
    }
}

struct TimerPlan {
    id: StreamId,
    delay: Duration,
    warmup_ticks: u32,
    warmup_spacing: Duration,
    interval: Duration,
}

impl TimerPlan {
    fn from_descriptor(d: &StreamDescriptor, delay: Duration) -> Self {
        Self {
            id: d.id,
            delay,
            warmup_ticks: d.warmup_ticks,
            warmup_spacing: d.warmup_spacing.max(MIN_TICK_INTERVAL),
            interval: d.interval.max(MIN_TICK_INTERVAL),
        }
    }
}

/// First tick after `delay`, then `warmup_ticks` more `warmup_spacing` apart, then every `interval`.
async fn run_timer(
    plan: TimerPlan,
    events: mpsc::Sender<Event>,
    mut shutdown: watch::Receiver<bool>,
) {
    let id = plan.id;
    let ticks = async move {
        sleep(plan.delay).await;
        for _ in 0..plan.warmup_ticks {
            if events.send(Event::Tick(id)).await.is_err() {
                return;
            }
            sleep(plan.warmup_spacing).await;
        }
        let mut tick = interval(plan.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tick.tick().await;
            if events.send(Event::Tick(id)).await.is_err() {
                return;
            }
        }
    };
    tokio::select! {
        _ = ticks => {}
        _ = shutdown.changed() => {}
    }
    debug!(stream = %id, "timer stopped");
}

struct Coordinator {
    aggregator: DashboardAggregator,
    descriptors: HashMap<StreamId, Arc<StreamDescriptor>>,
    client: TelemetryClient,
    events_tx: mpsc::Sender<Event>,
    active: Arc<AtomicBool>,
    latest_tx: watch::Sender<Arc<DashboardSnapshot>>,
    updates_tx: broadcast::Sender<Arc<DashboardSnapshot>>,
    pending_refresh: HashSet<StreamId>,
    last_no_subscribers_log: Option<Instant>,
}

impl Coordinator {
    async fn run(
        mut self,
        mut events: mpsc::Receiver<Event>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                event = events.recv() => match event {
                    Some(Event::Tick(id)) => {
                        self.dispatch(id);
                    }
                    Some(Event::Refresh(id)) => {
                        if !self.dispatch(id) && self.descriptors.contains_key(&id) {
                            self.pending_refresh.insert(id);
                        }
                    }
                    Some(Event::Resolved { id, result }) => {
                        if !self.active.load(Ordering::SeqCst) {
                            debug!(stream = %id, "scheduler stopped; result discarded");
                            continue;
                        }
                        self.aggregator.apply_result(id, result, Local::now());
                        self.publish();
                        if self.pending_refresh.remove(&id) {
                            self.dispatch(id);
                        }
                    }
                    None => break,
                },
            }
        }
        debug!("coordinator shutting down");
    }

    /// Starts a poll unless one is already in flight for the stream. Returns whether it started.
    fn dispatch(&mut self, id: StreamId) -> bool {
        let Some(descriptor) = self.descriptors.get(&id).cloned() else {
            warn!(stream = %id, "no descriptor registered; poll ignored");
            return false;
        };
        if !self.aggregator.begin_poll(id) {
            debug!(stream = %id, "previous poll still in flight; tick skipped");
            return false;
        }
        let client = self.client.clone();
        let events = self.events_tx.clone();
        let active = self.active.clone();
        tokio::spawn(
            async move {
                let result = client.fetch(&descriptor).await;
                if let Err(e) = &result {
                    warn!(error = %e, operation = "fetch", "poll failed");
                }
                if !active.load(Ordering::SeqCst) {
                    debug!("scheduler stopped; result discarded");
                    return;
                }
                let _ = events.send(Event::Resolved { id, result }).await;
            }
            .instrument(tracing::debug_span!("poll", stream = %id)),
        );
        true
    }

    fn publish(&mut self) {
        let snapshot = Arc::new(self.aggregator.snapshot());
        self.latest_tx.send_replace(snapshot.clone());
        if self.updates_tx.send(snapshot).is_err() {
            let should_log = self
                .last_no_subscribers_log
                .is_none_or(|t| t.elapsed() >= NO_SUBSCRIBERS_LOG_INTERVAL);
            if should_log {
                debug!(
                    operation = "broadcast_snapshot",
                    "No active dashboard clients; broadcast channel has no receivers"
                );
                self.last_no_subscribers_log = Some(Instant::now());
            }
        }
    }
}
