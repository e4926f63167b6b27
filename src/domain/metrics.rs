use serde::{Deserialize, Serialize};

/// A persisted point-in-time throughput snapshot.
///
/// Append-only: samples are produced on the metrics timer and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSample {
    /// Second-granularity bucket the sample describes, in epoch millis.
    pub timestamp_bucket: u64,
    /// Transactions completed per second over the rolling window.
    pub tps: f64,
    pub avg_processing_time_ms: f64,
    pub success_rate_percent: f64,
}
