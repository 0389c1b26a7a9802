// Security scan models (GET security/scans, POST security/scan)

use serde::{Deserialize, Serialize};

/// Scan risk level; serializes to lowercase JSON (e.g. "high").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Badge color class used by the scan widget.
    pub fn badge(self) -> &'static str {
        match self {
            RiskLevel::Low => "success",
            RiskLevel::Medium => "warning",
            RiskLevel::High => "danger",
        }
    }
}

/// An open port is reported either as a bare number (quick scan) or with service details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpenPort {
    Number(u16),
    Detailed {
        port: u16,
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        service: Option<String>,
        #[serde(default)]
        version: Option<String>,
        #[serde(default)]
        state: Option<String>,
    },
}

impl OpenPort {
    pub fn port(&self) -> u16 {
        match self {
            OpenPort::Number(p) => *p,
            OpenPort::Detailed { port, .. } => *port,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub severity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    #[serde(default)]
    pub id: Option<u64>,
    pub target: String,
    #[serde(default)]
    pub scan_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub open_ports: Vec<OpenPort>,
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
    pub timestamp: String,
}

/// Body of POST security/scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    #[serde(default = "default_scan_target")]
    pub target: String,
    #[serde(rename = "type", default = "default_scan_type")]
    pub scan_type: String,
}

fn default_scan_target() -> String {
    "localhost".into()
}

fn default_scan_type() -> String {
    "quick".into()
}

impl Default for ScanRequest {
    fn default() -> Self {
        Self {
            target: default_scan_target(),
            scan_type: default_scan_type(),
        }
    }
}
