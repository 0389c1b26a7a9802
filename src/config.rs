use serde::Deserialize;

/// Upper bound on points kept per chart series.
pub const MAX_SERIES_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub streams: StreamsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Max number of snapshots kept in the broadcast channel for /ws/dashboard (slow clients may lag).
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,
    /// How often to log app stats (dashboard clients, stream health) at INFO level.
    #[serde(default = "default_stats_log_interval_secs")]
    pub stats_log_interval_secs: u64,
}

fn default_broadcast_capacity() -> usize {
    32
}

fn default_stats_log_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Telemetry API root, e.g. "http://127.0.0.1:5000/api".
    pub base_url: String,
    /// Per-request timeout; must be shorter than every stream interval.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_request_timeout_ms() -> u64 {
    2_500
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    /// Delay between the first polls of consecutive streams at startup.
    #[serde(default = "default_initial_stagger_ms")]
    pub initial_stagger_ms: u64,
    /// Points kept in the metrics chart window.
    #[serde(default = "default_series_capacity")]
    pub series_capacity: usize,
    /// Consecutive failures after which a stream is marked failed.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

fn default_initial_stagger_ms() -> u64 {
    250
}

fn default_series_capacity() -> usize {
    20
}

fn default_max_consecutive_failures() -> u32 {
    3
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_stagger_ms: default_initial_stagger_ms(),
            series_capacity: default_series_capacity(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamsConfig {
    #[serde(default)]
    pub metrics: MetricsStreamConfig,
    #[serde(default)]
    pub alerts: AlertsStreamConfig,
    #[serde(default)]
    pub scans: ScansStreamConfig,
    #[serde(default)]
    pub connections: ConnectionsStreamConfig,
    #[serde(default)]
    pub containers: ContainersStreamConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsStreamConfig {
    #[serde(default = "default_metrics_interval_ms")]
    pub interval_ms: u64,
    /// Extra polls right after startup to fill the chart quickly.
    #[serde(default)]
    pub warmup_ticks: u32,
    #[serde(default = "default_warmup_spacing_ms")]
    pub warmup_spacing_ms: u64,
}

fn default_metrics_interval_ms() -> u64 {
    3_000
}

fn default_warmup_spacing_ms() -> u64 {
    1_000
}

impl Default for MetricsStreamConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_metrics_interval_ms(),
            warmup_ticks: 0,
            warmup_spacing_ms: default_warmup_spacing_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertsStreamConfig {
    #[serde(default = "default_alerts_interval_ms")]
    pub interval_ms: u64,
    /// `limit` query parameter sent to the backend.
    #[serde(default = "default_alerts_limit")]
    pub limit: u32,
}

fn default_alerts_interval_ms() -> u64 {
    5_000
}

fn default_alerts_limit() -> u32 {
    10
}

impl Default for AlertsStreamConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_alerts_interval_ms(),
            limit: default_alerts_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScansStreamConfig {
    #[serde(default = "default_scans_interval_ms")]
    pub interval_ms: u64,
    /// `limit` query parameter sent to the backend.
    #[serde(default = "default_scans_limit")]
    pub limit: u32,
}

fn default_scans_interval_ms() -> u64 {
    10_000
}

fn default_scans_limit() -> u32 {
    5
}

impl Default for ScansStreamConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_scans_interval_ms(),
            limit: default_scans_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionsStreamConfig {
    #[serde(default = "default_connections_interval_ms")]
    pub interval_ms: u64,
}

fn default_connections_interval_ms() -> u64 {
    5_000
}

impl Default for ConnectionsStreamConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_connections_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainersStreamConfig {
    #[serde(default = "default_containers_interval_ms")]
    pub interval_ms: u64,
}

fn default_containers_interval_ms() -> u64 {
    10_000
}

impl Default for ContainersStreamConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_containers_interval_ms(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            self.server.broadcast_capacity > 0,
            "server.broadcast_capacity must be > 0, got {}",
            self.server.broadcast_capacity
        );
        anyhow::ensure!(
            self.server.stats_log_interval_secs > 0,
            "server.stats_log_interval_secs must be > 0, got {}",
            self.server.stats_log_interval_secs
        );
        anyhow::ensure!(
            self.backend.base_url.starts_with("http://")
                || self.backend.base_url.starts_with("https://"),
            "backend.base_url must be an http(s) URL, got {:?}",
            self.backend.base_url
        );
        anyhow::ensure!(
            self.backend.request_timeout_ms > 0,
            "backend.request_timeout_ms must be > 0, got {}",
            self.backend.request_timeout_ms
        );
        anyhow::ensure!(
            (1..=MAX_SERIES_CAPACITY).contains(&self.polling.series_capacity),
            "polling.series_capacity must be between 1 and {}, got {}",
            MAX_SERIES_CAPACITY,
            self.polling.series_capacity
        );
        anyhow::ensure!(
            self.polling.max_consecutive_failures > 0,
            "polling.max_consecutive_failures must be > 0, got {}",
            self.polling.max_consecutive_failures
        );
        anyhow::ensure!(
            self.streams.alerts.limit > 0,
            "streams.alerts.limit must be > 0, got {}",
            self.streams.alerts.limit
        );
        anyhow::ensure!(
            self.streams.scans.limit > 0,
            "streams.scans.limit must be > 0, got {}",
            self.streams.scans.limit
        );
        anyhow::ensure!(
            self.streams.metrics.warmup_ticks == 0 || self.streams.metrics.warmup_spacing_ms > 0,
            "streams.metrics.warmup_spacing_ms must be > 0 when warmup_ticks is set"
        );
        for (name, interval_ms) in self.stream_intervals() {
            anyhow::ensure!(
                interval_ms > self.backend.request_timeout_ms,
                "streams.{}.interval_ms must be greater than backend.request_timeout_ms ({}), got {}",
                name,
                self.backend.request_timeout_ms,
                interval_ms
            );
        }
        Ok(())
    }

    fn stream_intervals(&self) -> [(&'static str, u64); 5] {
        [
            ("metrics", self.streams.metrics.interval_ms),
            ("alerts", self.streams.alerts.interval_ms),
            ("scans", self.streams.scans.interval_ms),
            ("connections", self.streams.connections.interval_ms),
            ("containers", self.streams.containers.interval_ms),
        ]
    }
}
