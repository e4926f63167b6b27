use crate::domain::metrics::MetricsSample;
use crate::domain::money::{Amount, Balance};
use crate::domain::transaction::{Transaction, TransactionId};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// The authoritative balance table, keyed by (address, asset).
///
/// `transfer` is the only mutation and must be atomic: both legs apply or
/// neither does, and no interleaved call may observe a state where the asset
/// total differs from the pre-transfer total.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Balance for an (address, asset) pair; unknown addresses report the
    /// configured default balance.
    async fn get_balance(&self, address: &str, asset: &str) -> Result<Balance>;

    /// Atomic debit(from) + credit(to). Fails with `InsufficientFunds` when
    /// `from` cannot cover `amount`; a self-transfer is a funds-checked
    /// no-op on balances.
    async fn transfer(&self, from: &str, to: &str, amount: Amount, asset: &str) -> Result<()>;
}

/// Durable transaction rows.
#[async_trait]
pub trait TransactionStore: Send + Sync {
    async fn store(&self, tx: Transaction) -> Result<()>;
    async fn get(&self, id: &TransactionId) -> Result<Option<Transaction>>;
    /// Number of stored transactions, terminal or not.
    async fn count(&self) -> Result<u64>;
}

/// FIFO staging area between submission and dispatch.
///
/// At-least-once: a dequeued id that is never acked must become visible
/// again after a restart. `ack` is called exactly when the transaction
/// reaches a terminal status.
#[async_trait]
pub trait TransactionQueue: Send + Sync {
    async fn enqueue(&self, id: TransactionId) -> Result<()>;

    /// Removes up to `max` ids in submission order and marks them in-flight.
    async fn dequeue_batch(&self, max: usize) -> Result<Vec<TransactionId>>;

    /// Permanently drops an in-flight id.
    async fn ack(&self, id: &TransactionId) -> Result<()>;

    /// Number of ids waiting to be dequeued (in-flight ids excluded).
    async fn len(&self) -> Result<usize>;
}

/// Historical throughput snapshots.
#[async_trait]
pub trait MetricsStore: Send + Sync {
    async fn store_sample(&self, sample: MetricsSample) -> Result<()>;
    async fn samples_since(&self, since_ms: u64) -> Result<Vec<MetricsSample>>;
}

pub type LedgerStoreRef = Arc<dyn LedgerStore>;
pub type TransactionStoreRef = Arc<dyn TransactionStore>;
pub type TransactionQueueRef = Arc<dyn TransactionQueue>;
pub type MetricsStoreRef = Arc<dyn MetricsStore>;
