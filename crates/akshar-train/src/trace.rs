//! Sampled loss history for one network.

use serde::{Deserialize, Serialize};

/// Append-only loss trace that keeps one value every `interval` steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LossTrace {
    interval: usize,
    values: Vec<f64>,
}

impl LossTrace {
    pub fn new(interval: usize) -> Self {
        assert!(interval > 0, "trace interval must be > 0");
        Self {
            interval,
            values: Vec::new(),
        }
    }

    /// Record `loss` if `step` (1-based) falls on the sampling interval.
    /// Returns whether the value was kept.
    pub fn record(&mut self, step: usize, loss: f64) -> bool {
        if step > 0 && step.is_multiple_of(self.interval) {
            self.values.push(loss);
            true
        } else {
            false
        }
    }

    pub fn interval(&self) -> usize {
        self.interval
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

/// Both networks' traces, as exported for external plotting.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LossHistory {
    pub discriminator: LossTrace,
    pub generator: LossTrace,
}

impl LossHistory {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
