// Host metrics models (GET metrics/current)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuMetrics {
    pub usage_percent: f64,
    #[serde(default)]
    pub core_count: Option<u32>,
    #[serde(default)]
    pub frequency_mhz: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub percent: f64,
    #[serde(default)]
    pub used_gb: Option<f64>,
    #[serde(default)]
    pub total_gb: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskMetrics {
    pub percent: f64,
    #[serde(default)]
    pub used_gb: Option<f64>,
    #[serde(default)]
    pub total_gb: Option<f64>,
}

/// Interface throughput, already converted to MB/s by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkMetrics {
    pub send_rate_mbps: f64,
    pub recv_rate_mbps: f64,
}

/// One poll of the current-metrics endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentMetrics {
    pub cpu: CpuMetrics,
    pub memory: MemoryMetrics,
    pub disk: DiskMetrics,
    pub network: NetworkMetrics,
}
