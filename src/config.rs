use rust_decimal::Decimal;
use std::time::Duration;

/// Tunables for the transfer engine.
///
/// The defaults reflect production settings: zero seed balance for unknown
/// accounts and no admission cap. Test and staging profiles typically raise
/// `default_balance` and shrink the timer intervals.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum transactions drained from the queue per dispatch tick.
    pub batch_size: usize,
    /// Interval between dispatch ticks.
    pub dispatch_interval: Duration,
    /// Execute batch items concurrently; sequential when false.
    pub parallel_processing: bool,
    /// Concurrency permits for parallel execution, independent of batch size.
    pub max_concurrency: usize,
    /// Upper bound on how long a dispatch cycle waits for its batch.
    pub batch_timeout: Duration,
    /// Interval between persisted metrics snapshots.
    pub metrics_interval: Duration,
    /// Enforced admission cap on `submit`, in transactions per second.
    pub max_transactions_per_second: Option<u32>,
    /// Balance reported for addresses with no ledger row yet.
    pub default_balance: Decimal,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            dispatch_interval: Duration::from_millis(100),
            parallel_processing: true,
            max_concurrency: 64,
            batch_timeout: Duration::from_secs(30),
            metrics_interval: Duration::from_secs(5),
            max_transactions_per_second: None,
            default_balance: Decimal::ZERO,
        }
    }
}

impl EngineConfig {
    /// Staging profile: every unknown address starts with a seed balance so
    /// load generators do not have to fund accounts first. Never the default.
    pub fn with_seed_balance(mut self, balance: Decimal) -> Self {
        self.default_balance = balance;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_dispatch_interval(mut self, interval: Duration) -> Self {
        self.dispatch_interval = interval;
        self
    }

    pub fn with_parallel_processing(mut self, enabled: bool) -> Self {
        self.parallel_processing = enabled;
        self
    }

    pub fn with_admission_cap(mut self, tps: u32) -> Self {
        self.max_transactions_per_second = Some(tps);
        self
    }
}
