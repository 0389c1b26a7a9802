// Per-stream health: Healthy -> Degraded -> Failed on consecutive failures, any success recovers.

use serde::Serialize;

use crate::fetch::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamHealth {
    #[default]
    Healthy,
    Degraded,
    Failed,
}

/// Mutable per-stream bookkeeping, owned by the aggregator.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamState {
    pub health: StreamHealth,
    pub consecutive_failures: u32,
    /// Epoch ms of the last successful poll.
    pub last_success_at: Option<u64>,
    /// Epoch ms of the last failed poll.
    pub last_failure_at: Option<u64>,
    pub last_error: Option<FetchError>,
    pub in_flight: bool,
}

impl StreamState {
    pub fn record_success(&mut self, at_ms: u64) {
        self.consecutive_failures = 0;
        self.health = StreamHealth::Healthy;
        self.last_success_at = Some(at_ms);
        self.last_error = None;
    }

    /// `threshold` is the number of consecutive failures that marks the stream Failed (>= 1).
    pub fn record_failure(&mut self, error: FetchError, threshold: u32, at_ms: u64) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.health = if self.consecutive_failures < threshold.max(1) {
            StreamHealth::Degraded
        } else {
            StreamHealth::Failed
        };
        self.last_failure_at = Some(at_ms);
        self.last_error = Some(error);
    }
}
