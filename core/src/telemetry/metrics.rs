use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Counters sampled by an external supervisor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub samples_ingested: u64,
    /// Ticks where a sample was presented but refused.
    pub input_stalls: u64,
    pub cells_classified: u64,
    pub detections: u64,
    pub scans: u64,
    pub track_reports: u64,
}

pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, f: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            f(&mut metrics);
        }
    }

    pub fn record_sample(&self) {
        self.update(|m| m.samples_ingested += 1);
    }

    pub fn record_input_stall(&self) {
        self.update(|m| m.input_stalls += 1);
    }

    pub fn record_cell(&self, detection: bool) {
        self.update(|m| {
            m.cells_classified += 1;
            if detection {
                m.detections += 1;
            }
        });
    }

    pub fn record_scan(&self, reports: usize) {
        self.update(|m| {
            m.scans += 1;
            m.track_reports += reports as u64;
        });
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }

    pub fn clear(&self) {
        self.update(|m| *m = MetricsSnapshot::default());
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
