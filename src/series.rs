// Fixed-capacity rolling series (FIFO eviction) and the paired metrics window.

use std::collections::VecDeque;

use serde::Serialize;
use tracing::error;

use crate::models::CurrentMetrics;

/// Samples reserved up front; larger windows grow on demand.
const PREALLOCATED_SAMPLES: usize = 64;

/// Ordered samples with a fixed capacity. Pushing at capacity evicts the oldest sample first.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedSeries<T> {
    samples: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedSeries<T> {
    /// Creates an empty series. A zero capacity is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity.min(PREALLOCATED_SAMPLES)),
            capacity,
        }
    }

    pub fn push(&mut self, value: T) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Oldest to newest.
    pub fn values(&self) -> impl ExactSizeIterator<Item = &T> + DoubleEndedIterator {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T: Clone> BoundedSeries<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.samples.iter().cloned().collect()
    }
}

/// Time labels plus the four charted value series. Every series always has the same length.
#[derive(Debug, Clone)]
pub struct MetricsHistory {
    labels: BoundedSeries<String>,
    cpu: BoundedSeries<f64>,
    memory: BoundedSeries<f64>,
    network_send: BoundedSeries<f64>,
    network_recv: BoundedSeries<f64>,
}

impl MetricsHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            labels: BoundedSeries::new(capacity),
            cpu: BoundedSeries::new(capacity),
            memory: BoundedSeries::new(capacity),
            network_send: BoundedSeries::new(capacity),
            network_recv: BoundedSeries::new(capacity),
        }
    }

    /// Appends one label and one value to every series.
    pub fn record(&mut self, label: String, metrics: &CurrentMetrics) {
        self.labels.push(label);
        self.cpu.push(metrics.cpu.usage_percent);
        self.memory.push(metrics.memory.percent);
        self.network_send.push(metrics.network.send_rate_mbps);
        self.network_recv.push(metrics.network.recv_rate_mbps);
        if !self.is_aligned() {
            error!(
                labels = self.labels.len(),
                cpu = self.cpu.len(),
                memory = self.memory.len(),
                network_send = self.network_send.len(),
                network_recv = self.network_recv.len(),
                "metrics series lengths diverged"
            );
        }
    }

    /// True when all value series have the same length as the label series.
    pub fn is_aligned(&self) -> bool {
        let n = self.labels.len();
        self.cpu.len() == n
            && self.memory.len() == n
            && self.network_send.len() == n
            && self.network_recv.len() == n
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.labels.capacity()
    }

    pub fn labels(&self) -> &BoundedSeries<String> {
        &self.labels
    }

    pub fn cpu(&self) -> &BoundedSeries<f64> {
        &self.cpu
    }

    pub fn memory(&self) -> &BoundedSeries<f64> {
        &self.memory
    }

    pub fn network_send(&self) -> &BoundedSeries<f64> {
        &self.network_send
    }

    pub fn network_recv(&self) -> &BoundedSeries<f64> {
        &self.network_recv
    }

    /// Owned copy for a snapshot.
    pub fn window(&self) -> MetricsWindow {
        MetricsWindow {
            capacity: self.capacity(),
            warming_up: !self.labels.is_full(),
            labels: self.labels.to_vec(),
            cpu: self.cpu.to_vec(),
            memory: self.memory.to_vec(),
            network_send: self.network_send.to_vec(),
            network_recv: self.network_recv.to_vec(),
        }
    }
}

/// Chart-ready copy of [`MetricsHistory`].
///
/// `warming_up` is true while the window is shorter than its capacity, which is normal at startup
/// and independent of the metrics stream's health.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsWindow {
    pub capacity: usize,
    pub warming_up: bool,
    pub labels: Vec<String>,
    pub cpu: Vec<f64>,
    pub memory: Vec<f64>,
    pub network_send: Vec<f64>,
    pub network_recv: Vec<f64>,
}
