//! In-process metrics.
//!
//! Counters and histograms live in a global registry and are exposed as a
//! JSON snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Latency histogram in milliseconds.
#[derive(Debug)]
pub struct Histogram {
    /// Upper bounds: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// (upper bound, count) per bucket.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct Metrics {
    // Tokens
    pub tokens_issued: Counter,
    pub tokens_rejected: Counter,

    // Heartbeats
    pub heartbeats_accepted: Counter,
    pub heartbeats_rejected: Counter,

    // Finalization
    pub lectures_finalized: Counter,
    pub students_finalized: Counter,
    pub finalize_errors: Counter,
    pub worker_sweeps: Counter,

    // Latency
    pub heartbeat_latency_ms: Histogram,
    pub finalize_latency_ms: Histogram,

    /// Unix seconds of the worker's finalization watermark.
    pub worker_watermark: Gauge,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            tokens_issued: self.tokens_issued.get(),
            tokens_rejected: self.tokens_rejected.get(),
            heartbeats_accepted: self.heartbeats_accepted.get(),
            heartbeats_rejected: self.heartbeats_rejected.get(),
            lectures_finalized: self.lectures_finalized.get(),
            students_finalized: self.students_finalized.get(),
            finalize_errors: self.finalize_errors.get(),
            worker_sweeps: self.worker_sweeps.get(),
            heartbeat_latency_mean_ms: self.heartbeat_latency_ms.mean(),
            finalize_latency_mean_ms: self.finalize_latency_ms.mean(),
            worker_watermark: self.worker_watermark.get(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub tokens_issued: u64,
    pub tokens_rejected: u64,
    pub heartbeats_accepted: u64,
    pub heartbeats_rejected: u64,
    pub lectures_finalized: u64,
    pub students_finalized: u64,
    pub finalize_errors: u64,
    pub worker_sweeps: u64,
    pub heartbeat_latency_mean_ms: f64,
    pub finalize_latency_mean_ms: f64,
    pub worker_watermark: u64,
}

pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_buckets() {
        let histogram = Histogram::new();
        histogram.observe(3);
        histogram.observe(3);
        histogram.observe(60_000);

        let buckets = histogram.buckets();
        assert_eq!(buckets[1], (5, 2));
        assert_eq!(buckets[10], (10000, 1));
        assert_eq!(histogram.count(), 3);
        assert_eq!(histogram.sum(), 60_006);
    }

    #[test]
    fn test_snapshot_reads_counters() {
        let metrics = Metrics::new();
        metrics.heartbeats_accepted.inc();
        metrics.students_finalized.inc_by(30);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.heartbeats_accepted, 1);
        assert_eq!(snapshot.students_finalized, 30);
        assert_eq!(snapshot.finalize_latency_mean_ms, 0.0);
    }
}
