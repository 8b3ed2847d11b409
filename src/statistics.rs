//! Latency statistics and measurement stability detection.

#![allow(clippy::cast_precision_loss)]

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStatistics {
    pub avg_ms: f64,
    pub std_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub request_count: u64,
    /// Client-side throughput in infer/sec when the measuring tool reports
    /// one. Per-sample statistics leave it unset.
    #[serde(default)]
    pub throughput: Option<f64>,
}

impl LatencyStatistics {
    /// Summarizes per-request latencies. `None` for an empty slice.
    pub fn from_samples(samples_ms: &[f64]) -> Option<Self> {
        if samples_ms.is_empty() {
            return None;
        }
        let mut sorted = samples_ms.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len() as f64;
        let avg_ms = sorted.iter().sum::<f64>() / n;
        let variance = sorted.iter().map(|v| (v - avg_ms).powi(2)).sum::<f64>() / n;
        Some(Self {
            avg_ms,
            std_ms: variance.sqrt(),
            p50_ms: percentile(&sorted, 50.0),
            p90_ms: percentile(&sorted, 90.0),
            p95_ms: percentile(&sorted, 95.0),
            p99_ms: percentile(&sorted, 99.0),
            request_count: sorted.len() as u64,
            throughput: None,
        })
    }
}

/// Linearly interpolated percentile of an ascending slice, `p` in `0..=100`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (len - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Streaming stability check over per-trial measurements.
///
/// The series is stable once the trailing `window` values all lie within
/// `tolerance_pct` percent of their mean.
#[derive(Debug, Clone)]
pub struct StabilityWindow {
    window: usize,
    tolerance_pct: f64,
    values: Vec<f64>,
}

impl StabilityWindow {
    pub fn new(window: usize, tolerance_pct: f64) -> Self {
        Self {
            window: window.max(1),
            tolerance_pct,
            values: Vec::new(),
        }
    }

    /// Appends a trial value and reports whether the series is now stable.
    pub fn push(&mut self, value: f64) -> bool {
        self.values.push(value);
        self.is_stable()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The last `window` values (fewer while the series is short).
    pub fn trailing(&self) -> &[f64] {
        let start = self.values.len().saturating_sub(self.window);
        &self.values[start..]
    }

    /// Largest deviation from the trailing mean, in percent of that mean.
    pub fn spread_pct(&self) -> Option<f64> {
        let trailing = self.trailing();
        if trailing.len() < self.window {
            return None;
        }
        let mean = trailing.iter().sum::<f64>() / trailing.len() as f64;
        if mean.abs() < f64::EPSILON {
            return None;
        }
        let max_dev = trailing
            .iter()
            .map(|v| (v - mean).abs())
            .fold(0.0_f64, f64::max);
        Some(max_dev / mean.abs() * 100.0)
    }

    pub fn is_stable(&self) -> bool {
        self.spread_pct()
            .is_some_and(|spread| spread <= self.tolerance_pct)
    }
}
