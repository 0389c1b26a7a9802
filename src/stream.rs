// Stream descriptors: what to fetch, how often, and how to map the response into a batch.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde::de::{DeserializeOwned, Error as _};

use crate::config::AppConfig;
use crate::models::{
    Alert, Connection, Container, ContainerOverview, CurrentMetrics, DockerStatus, ScanResult,
};

/// Identifies one independently scheduled telemetry source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamId {
    Metrics,
    Alerts,
    Scans,
    Connections,
    Containers,
}

impl StreamId {
    pub const ALL: [StreamId; 5] = [
        StreamId::Metrics,
        StreamId::Alerts,
        StreamId::Scans,
        StreamId::Connections,
        StreamId::Containers,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StreamId::Metrics => "metrics",
            StreamId::Alerts => "alerts",
            StreamId::Scans => "scans",
            StreamId::Connections => "connections",
            StreamId::Containers => "containers",
        }
    }
}

impl FromStr for StreamId {
    type Err = UnknownStream;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StreamId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownStream(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stream {0:?}")]
pub struct UnknownStream(pub String);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One successful poll, shaped per stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamBatch {
    Metrics(CurrentMetrics),
    Alerts(Vec<Alert>),
    Scans(Vec<ScanResult>),
    Connections(Vec<Connection>),
    Containers(ContainerOverview),
}

impl StreamBatch {
    pub fn stream_id(&self) -> StreamId {
        match self {
            StreamBatch::Metrics(_) => StreamId::Metrics,
            StreamBatch::Alerts(_) => StreamId::Alerts,
            StreamBatch::Scans(_) => StreamId::Scans,
            StreamBatch::Connections(_) => StreamId::Connections,
            StreamBatch::Containers(_) => StreamId::Containers,
        }
    }
}

/// Maps the response bodies (one per endpoint, in order) into a batch.
pub type MapFn = fn(&[Bytes]) -> Result<StreamBatch, serde_json::Error>;

/// Static configuration of one stream; built once at startup.
#[derive(Debug, Clone)]
pub struct StreamDescriptor {
    pub id: StreamId,
    /// Paths relative to the backend base URL, fetched in order.
    pub endpoints: Vec<String>,
    pub interval: Duration,
    pub map: MapFn,
    pub max_consecutive_failures: u32,
    /// Extra ticks right after the first poll, `warmup_spacing` apart.
    pub warmup_ticks: u32,
    pub warmup_spacing: Duration,
}

impl StreamDescriptor {
    fn new(id: StreamId, endpoints: Vec<String>, interval: Duration, map: MapFn) -> Self {
        Self {
            id,
            endpoints,
            interval,
            map,
            max_consecutive_failures: 3,
            warmup_ticks: 0,
            warmup_spacing: Duration::from_secs(1),
        }
    }

    pub fn metrics(interval: Duration) -> Self {
        Self::new(
            StreamId::Metrics,
            vec!["metrics/current".into()],
            interval,
            map_metrics,
        )
    }

    pub fn alerts(interval: Duration, limit: u32) -> Self {
        Self::new(
            StreamId::Alerts,
            vec![format!("alerts?limit={}", limit)],
            interval,
            map_alerts,
        )
    }

    pub fn scans(interval: Duration, limit: u32) -> Self {
        Self::new(
            StreamId::Scans,
            vec![format!("security/scans?limit={}", limit)],
            interval,
            map_scans,
        )
    }

    pub fn connections(interval: Duration) -> Self {
        Self::new(
            StreamId::Connections,
            vec!["network/connections".into()],
            interval,
            map_connections,
        )
    }

    pub fn containers(interval: Duration) -> Self {
        Self::new(
            StreamId::Containers,
            vec!["docker/status".into(), "docker/containers".into()],
            interval,
            map_containers,
        )
    }

    pub fn with_max_consecutive_failures(mut self, threshold: u32) -> Self {
        self.max_consecutive_failures = threshold.max(1);
        self
    }

    pub fn with_warmup(mut self, ticks: u32, spacing: Duration) -> Self {
        self.warmup_ticks = ticks;
        self.warmup_spacing = spacing;
        self
    }
}

/// Builds the five dashboard streams from config, in stagger order.
pub fn descriptors_from_config(config: &AppConfig) -> Vec<StreamDescriptor> {
    let threshold = config.polling.max_consecutive_failures;
    let s = &config.streams;
    vec![
        StreamDescriptor::metrics(Duration::from_millis(s.metrics.interval_ms)).with_warmup(
            s.metrics.warmup_ticks,
            Duration::from_millis(s.metrics.warmup_spacing_ms),
        ),
        StreamDescriptor::alerts(Duration::from_millis(s.alerts.interval_ms), s.alerts.limit),
        StreamDescriptor::scans(Duration::from_millis(s.scans.interval_ms), s.scans.limit),
        StreamDescriptor::connections(Duration::from_millis(s.connections.interval_ms)),
        StreamDescriptor::containers(Duration::from_millis(s.containers.interval_ms)),
    ]
    .into_iter()
    .map(|d| d.with_max_consecutive_failures(threshold))
    .collect()
}

fn body<T: DeserializeOwned>(bodies: &[Bytes], index: usize) -> Result<T, serde_json::Error> {
    let raw = bodies.get(index).ok_or_else(|| {
        serde_json::Error::custom(format!("missing response body #{}", index))
    })?;
    serde_json::from_slice(raw)
}

pub fn map_metrics(bodies: &[Bytes]) -> Result<StreamBatch, serde_json::Error> {
    body(bodies, 0).map(StreamBatch::Metrics)
}

pub fn map_alerts(bodies: &[Bytes]) -> Result<StreamBatch, serde_json::Error> {
    body(bodies, 0).map(StreamBatch::Alerts)
}

pub fn map_scans(bodies: &[Bytes]) -> Result<StreamBatch, serde_json::Error> {
    body(bodies, 0).map(StreamBatch::Scans)
}

pub fn map_connections(bodies: &[Bytes]) -> Result<StreamBatch, serde_json::Error> {
    body(bodies, 0).map(StreamBatch::Connections)
}

pub fn map_containers(bodies: &[Bytes]) -> Result<StreamBatch, serde_json::Error> {
    let status: DockerStatus = body(bodies, 0)?;
    let containers: Vec<Container> = body(bodies, 1)?;
    Ok(StreamBatch::Containers(ContainerOverview {
        available: status.available,
        system_info: status.system_info,
        containers,
    }))
}
