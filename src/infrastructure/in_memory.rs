use crate::domain::metrics::MetricsSample;
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::{LedgerStore, MetricsStore, TransactionQueue, TransactionStore};
use crate::domain::transaction::{Transaction, TransactionId};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Thread-safe in-memory balance table.
///
/// `transfer` holds the write lock across the funds check and both legs, so
/// concurrent transfers serialize on it and no caller can observe a state
/// where the asset total has changed. Ideal for tests and staging.
#[derive(Clone)]
pub struct InMemoryLedgerStore {
    balances: Arc<RwLock<HashMap<(String, String), Balance>>>,
    default_balance: Decimal,
}

impl InMemoryLedgerStore {
    pub fn new(default_balance: Decimal) -> Self {
        Self {
            balances: Arc::new(RwLock::new(HashMap::new())),
            default_balance,
        }
    }

    fn key(address: &str, asset: &str) -> (String, String) {
        (address.to_string(), asset.to_string())
    }

    /// Seeds one account directly. Account initialization only — everything
    /// after setup must go through `transfer`.
    pub async fn set_balance(&self, address: &str, asset: &str, balance: Balance) {
        let mut balances = self.balances.write().await;
        balances.insert(Self::key(address, asset), balance);
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn get_balance(&self, address: &str, asset: &str) -> Result<Balance> {
        let balances = self.balances.read().await;
        Ok(balances
            .get(&Self::key(address, asset))
            .copied()
            .unwrap_or(Balance::new(self.default_balance)))
    }

    async fn transfer(&self, from: &str, to: &str, amount: Amount, asset: &str) -> Result<()> {
        let mut balances = self.balances.write().await;

        let from_key = Self::key(from, asset);
        let from_balance = balances
            .get(&from_key)
            .copied()
            .unwrap_or(Balance::new(self.default_balance));
        if !from_balance.covers(amount) {
            return Err(EngineError::InsufficientFunds {
                address: from.to_string(),
                asset: asset.to_string(),
                amount: amount.value(),
            });
        }

        if from == to {
            // Funds-checked no-op: the row is materialized, balances stay put.
            balances.insert(from_key, from_balance);
            return Ok(());
        }

        let to_key = Self::key(to, asset);
        let to_balance = balances
            .get(&to_key)
            .copied()
            .unwrap_or(Balance::new(self.default_balance));

        balances.insert(from_key, from_balance - amount.into());
        balances.insert(to_key, to_balance + amount.into());
        Ok(())
    }
}

/// Thread-safe in-memory transaction table keyed by id.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    transactions: Arc<RwLock<HashMap<TransactionId, Transaction>>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn store(&self, tx: Transaction) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        transactions.insert(tx.id.clone(), tx);
        Ok(())
    }

    async fn get(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        let transactions = self.transactions.read().await;
        Ok(transactions.get(id).cloned())
    }

    async fn count(&self) -> Result<u64> {
        let transactions = self.transactions.read().await;
        Ok(transactions.len() as u64)
    }
}

struct QueueInner {
    pending: VecDeque<TransactionId>,
    in_flight: HashSet<TransactionId>,
}

/// FIFO queue with in-flight tracking.
///
/// Mirrors the delivery contract of the durable queue so tests exercise the
/// same ack discipline; being process-local it cannot survive a restart.
#[derive(Clone)]
pub struct InMemoryQueue {
    inner: Arc<Mutex<QueueInner>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueInner {
                pending: VecDeque::new(),
                in_flight: HashSet::new(),
            })),
        }
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransactionQueue for InMemoryQueue {
    async fn enqueue(&self, id: TransactionId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.pending.push_back(id);
        Ok(())
    }

    async fn dequeue_batch(&self, max: usize) -> Result<Vec<TransactionId>> {
        let mut inner = self.inner.lock().await;
        let take = max.min(inner.pending.len());
        let mut batch = Vec::with_capacity(take);
        for _ in 0..take {
            if let Some(id) = inner.pending.pop_front() {
                inner.in_flight.insert(id.clone());
                batch.push(id);
            }
        }
        Ok(batch)
    }

    async fn ack(&self, id: &TransactionId) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.in_flight.remove(id);
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        let inner = self.inner.lock().await;
        Ok(inner.pending.len())
    }
}

/// Append-only in-memory metrics history.
#[derive(Default, Clone)]
pub struct InMemoryMetricsStore {
    samples: Arc<RwLock<Vec<MetricsSample>>>,
}

impl InMemoryMetricsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetricsStore for InMemoryMetricsStore {
    async fn store_sample(&self, sample: MetricsSample) -> Result<()> {
        let mut samples = self.samples.write().await;
        samples.push(sample);
        Ok(())
    }

    async fn samples_since(&self, since_ms: u64) -> Result<Vec<MetricsSample>> {
        let samples = self.samples.read().await;
        Ok(samples
            .iter()
            .filter(|s| s.timestamp_bucket >= since_ms)
            .cloned()
            .collect())
    }
}
