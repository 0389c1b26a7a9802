// Dashboard aggregator: the single owner of rolling history and stream states.
// Folds poll results in and hands out immutable snapshots; never exposes live buffers.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info};

use crate::fetch::FetchError;
use crate::health::{StreamHealth, StreamState};
use crate::models::{Alert, Connection, ContainerOverview, CurrentMetrics, ScanResult};
use crate::series::{MetricsHistory, MetricsWindow};
use crate::stream::{StreamBatch, StreamDescriptor, StreamId};

/// Label format for the chart x-axis (local wall-clock time).
const TIME_LABEL_FORMAT: &str = "%H:%M:%S";

#[derive(Debug)]
struct StreamEntry {
    threshold: u32,
    state: StreamState,
}

pub struct DashboardAggregator {
    history: MetricsHistory,
    latest_metrics: Option<CurrentMetrics>,
    alerts: Vec<Alert>,
    scans: Vec<ScanResult>,
    connections: Vec<Connection>,
    containers: Option<ContainerOverview>,
    streams: BTreeMap<StreamId, StreamEntry>,
    generation: u64,
}

impl DashboardAggregator {
    /// One stream state per descriptor; `series_capacity` bounds the metrics window.
    pub fn new(descriptors: &[StreamDescriptor], series_capacity: usize) -> Self {
        let streams = descriptors
            .iter()
            .map(|d| {
                (
                    d.id,
                    StreamEntry {
                        threshold: d.max_consecutive_failures,
                        state: StreamState::default(),
                    },
                )
            })
            .collect();
        Self {
            history: MetricsHistory::new(series_capacity),
            latest_metrics: None,
            alerts: Vec::new(),
            scans: Vec::new(),
            connections: Vec::new(),
            containers: None,
            streams,
            generation: 0,
        }
    }

    /// In-flight guard. Marks the stream in flight and returns true, or returns false without
    /// changing anything when a request for it is still outstanding (or the stream is unknown).
    pub fn begin_poll(&mut self, id: StreamId) -> bool {
        match self.streams.get_mut(&id) {
            Some(entry) if !entry.state.in_flight => {
                entry.state.in_flight = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_in_flight(&self, id: StreamId) -> bool {
        self.streams.get(&id).is_some_and(|e| e.state.in_flight)
    }

    /// Folds one poll resolution in and clears the stream's in-flight flag.
    /// Failures only touch health; the history never gets a placeholder sample.
    pub fn apply_result(
        &mut self,
        id: StreamId,
        result: Result<StreamBatch, FetchError>,
        at: DateTime<Local>,
    ) {
        let Some(entry) = self.streams.get_mut(&id) else {
            debug!(stream = %id, "result for unregistered stream ignored");
            return;
        };
        entry.state.in_flight = false;
        let at_ms = u64::try_from(at.timestamp_millis()).unwrap_or(0);
        let previous = entry.state.health;

        let result = result.and_then(|batch| {
            if batch.stream_id() == id {
                Ok(batch)
            } else {
                Err(FetchError::Parse(format!(
                    "{} batch delivered to {} stream",
                    batch.stream_id(),
                    id
                )))
            }
        });

        let batch = match result {
            Ok(batch) => {
                entry.state.record_success(at_ms);
                Some(batch)
            }
            Err(error) => {
                entry.state.record_failure(error, entry.threshold, at_ms);
                None
            }
        };
        let current = entry.state.health;
        let consecutive_failures = entry.state.consecutive_failures;

        if let Some(batch) = batch {
            self.fold(batch, at);
        }
        if current != previous {
            info!(
                stream = %id,
                from = ?previous,
                to = ?current,
                consecutive_failures,
                "stream health changed"
            );
        }
        self.generation += 1;
    }

    fn fold(&mut self, batch: StreamBatch, at: DateTime<Local>) {
        match batch {
            StreamBatch::Metrics(metrics) => {
                self.history
                    .record(at.format(TIME_LABEL_FORMAT).to_string(), &metrics);
                self.latest_metrics = Some(metrics);
            }
            StreamBatch::Alerts(alerts) => self.alerts = alerts,
            StreamBatch::Scans(scans) => self.scans = scans,
            StreamBatch::Connections(connections) => self.connections = connections,
            StreamBatch::Containers(overview) => self.containers = Some(overview),
        }
    }

    pub fn health(&self, id: StreamId) -> Option<StreamHealth> {
        self.streams.get(&id).map(|e| e.state.health)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Point-in-time copy of everything a renderer may read.
    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            generation: self.generation,
            taken_at: u64::try_from(Local::now().timestamp_millis()).unwrap_or(0),
            metrics: self.history.window(),
            latest_metrics: self.latest_metrics.clone(),
            alerts: self.alerts.clone(),
            scans: self.scans.clone(),
            connections: self.connections.clone(),
            containers: self.containers.clone(),
            streams: self
                .streams
                .iter()
                .map(|(id, e)| StreamStatus {
                    id: *id,
                    state: e.state.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatus {
    pub id: StreamId,
    #[serde(flatten)]
    pub state: StreamState,
}

/// Immutable copy of all buffers and stream states at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub generation: u64,
    /// Epoch ms.
    pub taken_at: u64,
    pub metrics: MetricsWindow,
    pub latest_metrics: Option<CurrentMetrics>,
    pub alerts: Vec<Alert>,
    pub scans: Vec<ScanResult>,
    pub connections: Vec<Connection>,
    pub containers: Option<ContainerOverview>,
    pub streams: Vec<StreamStatus>,
}

impl DashboardSnapshot {
    pub fn stream(&self, id: StreamId) -> Option<&StreamState> {
        self.streams.iter().find(|s| s.id == id).map(|s| &s.state)
    }
}
