// Telemetry wire models (backend JSON, snake_case)

mod alert;
mod container;
mod metrics;
mod network;
mod scan;

pub use alert::{Alert, Severity};
pub use container::{Container, ContainerOverview, ContainerState, DockerStatus, DockerSystemInfo};
pub use metrics::{CpuMetrics, CurrentMetrics, DiskMetrics, MemoryMetrics, NetworkMetrics};
pub use network::Connection;
pub use scan::{OpenPort, RiskLevel, ScanRequest, ScanResult, Vulnerability};
