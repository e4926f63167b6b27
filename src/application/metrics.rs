use crate::domain::metrics::MetricsSample;
use crate::domain::transaction::now_millis;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Rolling-window length in one-second buckets.
const WINDOW_SECONDS: u64 = 60;

#[derive(Debug)]
struct Bucket {
    second: u64,
    completed: u32,
    failed: u32,
    processing_ms_total: u64,
}

#[derive(Debug, Default)]
struct Inner {
    buckets: VecDeque<Bucket>,
    /// Millisecond timestamps of successful completions in the last second.
    completions: VecDeque<u64>,
    total_submitted: u64,
    total_completed: u64,
    total_failed: u64,
    max_tps: f64,
}

impl Inner {
    fn prune_completions(&mut self, now_ms: u64) {
        while self
            .completions
            .front()
            .is_some_and(|&t| t + 1000 <= now_ms)
        {
            self.completions.pop_front();
        }
    }
}

/// Aggregates dispatcher outcomes into per-second buckets.
///
/// Derived views (`current_tps`, `average_processing_time`, `success_rate`)
/// read the window; lifetime totals and the TPS high-water mark are kept
/// separately. All methods take a short internal lock, so the collector can
/// be shared across the dispatcher tasks without further coordination.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    inner: Mutex<Inner>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn now_second() -> u64 {
        now_millis() / 1000
    }

    pub fn record_submitted(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.total_submitted += 1;
    }

    /// Feeds one execution outcome into the window.
    pub fn record_outcome(&self, success: bool, processing_time_ms: u64) {
        self.record_at(success, processing_time_ms, now_millis());
    }

    fn record_at(&self, success: bool, processing_time_ms: u64, now_ms: u64) {
        let second = now_ms / 1000;
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if inner.buckets.back().is_none_or(|b| b.second != second) {
            inner.buckets.push_back(Bucket {
                second,
                completed: 0,
                failed: 0,
                processing_ms_total: 0,
            });
        }
        let Some(bucket) = inner.buckets.back_mut() else {
            return;
        };
        if success {
            bucket.completed += 1;
        } else {
            bucket.failed += 1;
        }
        bucket.processing_ms_total += processing_time_ms;

        if success {
            inner.total_completed += 1;
            inner.completions.push_back(now_ms);
        } else {
            inner.total_failed += 1;
        }

        while inner
            .buckets
            .front()
            .is_some_and(|b| b.second + WINDOW_SECONDS < second)
        {
            inner.buckets.pop_front();
        }

        inner.prune_completions(now_ms);
        let tps = inner.completions.len() as f64;
        if tps > inner.max_tps {
            inner.max_tps = tps;
        }
    }

    /// Completions in the trailing 1000 ms. Each completion is counted in
    /// exactly one window position, so a steady rate reads as that rate.
    fn tps_at(&self, now_ms: u64) -> f64 {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.prune_completions(now_ms);
        inner.completions.len() as f64
    }

    pub fn current_tps(&self) -> f64 {
        self.tps_at(now_millis())
    }

    pub fn max_tps(&self) -> f64 {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.max_tps
    }

    /// Mean processing time over the window, in milliseconds.
    pub fn average_processing_time(&self) -> f64 {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let (count, total) = inner.buckets.iter().fold((0u64, 0u64), |(c, t), b| {
            (
                c + b.completed as u64 + b.failed as u64,
                t + b.processing_ms_total,
            )
        });
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    /// Share of successful outcomes over the window, as a percentage.
    /// Reports 100 when the window is empty.
    pub fn success_rate(&self) -> f64 {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let (completed, failed) = inner.buckets.iter().fold((0u64, 0u64), |(c, f), b| {
            (c + b.completed as u64, f + b.failed as u64)
        });
        let total = completed + failed;
        if total == 0 {
            100.0
        } else {
            completed as f64 / total as f64 * 100.0
        }
    }

    /// (submitted, completed, failed) lifetime totals.
    pub fn totals(&self) -> (u64, u64, u64) {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        (
            inner.total_submitted,
            inner.total_completed,
            inner.total_failed,
        )
    }

    /// Builds a point-in-time sample for persistence.
    pub fn snapshot(&self) -> MetricsSample {
        MetricsSample {
            timestamp_bucket: Self::now_second() * 1000,
            tps: self.current_tps(),
            avg_processing_time_ms: self.average_processing_time(),
            success_rate_percent: self.success_rate(),
        }
    }
}
