// Alert models (GET alerts?limit=N)

use serde::{Deserialize, Serialize};

/// Alert severity; serializes to lowercase JSON (e.g. "critical").
///
/// The set is closed: an unrecognized severity fails parsing of the whole alerts
/// batch instead of falling back to a neutral badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Badge color class used by the alert widget.
    pub fn badge(self) -> &'static str {
        match self {
            Severity::Low => "info",
            Severity::Medium => "warning",
            Severity::High => "danger",
            Severity::Critical => "dark",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: Severity,
    pub message: String,
    pub timestamp: String,
    #[serde(default)]
    pub acknowledged: bool,
}
