use crate::domain::metrics::MetricsSample;
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::{LedgerStore, MetricsStore, TransactionQueue, TransactionStore};
use crate::domain::transaction::{Transaction, TransactionId};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Column Family for (address, asset) balances.
pub const CF_BALANCES: &str = "balances";
/// Column Family for transaction rows.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for the pending-transaction queue.
pub const CF_QUEUE: &str = "queue";
/// Column Family for metrics snapshots.
pub const CF_METRICS: &str = "metrics";

/// A persistent store backed by RocksDB, implementing all four ports.
///
/// Each table lives in its own Column Family. Queue entries are keyed by a
/// monotonic sequence number so iteration order is submission order; the
/// in-flight set is kept only in memory, which is what makes delivery
/// at-least-once — a crash clears it and unacked entries become visible
/// again on the next open.
///
/// `Clone` shares the underlying `Arc<DB>` and the transfer lock.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    default_balance: Decimal,
    /// Serializes check-and-transfer so the funds check and the write batch
    /// are atomic with respect to other transfers.
    transfer_lock: Arc<Mutex<()>>,
    next_seq: Arc<AtomicU64>,
    pending_len: Arc<AtomicI64>,
    tx_count: Arc<AtomicU64>,
    in_flight: Arc<Mutex<HashMap<TransactionId, u64>>>,
}

impl RocksDbStore {
    /// Opens or creates the database at `path`, ensuring all column
    /// families exist and recovering the queue sequence counter.
    pub fn open<P: AsRef<Path>>(path: P, default_balance: Decimal) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_BALANCES, CF_TRANSACTIONS, CF_QUEUE, CF_METRICS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        // Recover queue state: the next sequence follows the highest stored
        // key, and everything still present counts as pending.
        let cf = db
            .cf_handle(CF_QUEUE)
            .ok_or_else(|| EngineError::StoreUnavailable("queue column family".to_string()))?;
        let mut next_seq = 0u64;
        let mut pending = 0i64;
        for item in db.iterator_cf(cf, IteratorMode::Start) {
            let (key, _) = item?;
            if key.len() == 8 {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(&key);
                next_seq = next_seq.max(u64::from_be_bytes(buf) + 1);
            }
            pending += 1;
        }

        // Recover the row count so `count` stays cheap after a restart.
        let cf_tx = db
            .cf_handle(CF_TRANSACTIONS)
            .ok_or_else(|| EngineError::StoreUnavailable("transactions column family".to_string()))?;
        let mut tx_count = 0u64;
        for item in db.iterator_cf(cf_tx, IteratorMode::Start) {
            item?;
            tx_count += 1;
        }

        Ok(Self {
            db: Arc::new(db),
            default_balance,
            transfer_lock: Arc::new(Mutex::new(())),
            next_seq: Arc::new(AtomicU64::new(next_seq)),
            pending_len: Arc::new(AtomicI64::new(pending)),
            tx_count: Arc::new(AtomicU64::new(tx_count)),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| EngineError::StoreUnavailable(format!("{name} column family")))
    }

    fn balance_key(address: &str, asset: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(address.len() + asset.len() + 1);
        key.extend_from_slice(address.as_bytes());
        key.push(0);
        key.extend_from_slice(asset.as_bytes());
        key
    }

    fn read_balance(&self, address: &str, asset: &str) -> Result<Balance> {
        let cf = self.cf(CF_BALANCES)?;
        match self.db.get_cf(cf, Self::balance_key(address, asset))? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(Balance::new(self.default_balance)),
        }
    }
}

#[async_trait]
impl LedgerStore for RocksDbStore {
    async fn get_balance(&self, address: &str, asset: &str) -> Result<Balance> {
        self.read_balance(address, asset)
    }

    async fn transfer(&self, from: &str, to: &str, amount: Amount, asset: &str) -> Result<()> {
        let _guard = self.transfer_lock.lock().await;

        let from_balance = self.read_balance(from, asset)?;
        if !from_balance.covers(amount) {
            return Err(EngineError::InsufficientFunds {
                address: from.to_string(),
                asset: asset.to_string(),
                amount: amount.value(),
            });
        }

        let cf = self.cf(CF_BALANCES)?;
        let mut batch = WriteBatch::default();
        if from == to {
            // Funds-checked no-op; materialize the row only.
            batch.put_cf(
                cf,
                Self::balance_key(from, asset),
                serde_json::to_vec(&from_balance)?,
            );
        } else {
            let to_balance = self.read_balance(to, asset)?;
            batch.put_cf(
                cf,
                Self::balance_key(from, asset),
                serde_json::to_vec(&(from_balance - amount.into()))?,
            );
            batch.put_cf(
                cf,
                Self::balance_key(to, asset),
                serde_json::to_vec(&(to_balance + amount.into()))?,
            );
        }
        self.db.write(batch)?;
        Ok(())
    }
}

#[async_trait]
impl TransactionStore for RocksDbStore {
    async fn store(&self, tx: Transaction) -> Result<()> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        // Status updates overwrite the row; only a fresh key bumps the count.
        let is_new = self.db.get_pinned_cf(cf, tx.id.as_str().as_bytes())?.is_none();
        self.db
            .put_cf(cf, tx.id.as_str().as_bytes(), serde_json::to_vec(&tx)?)?;
        if is_new {
            self.tx_count.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn get(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        match self.db.get_cf(cf, id.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.tx_count.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl TransactionQueue for RocksDbStore {
    async fn enqueue(&self, id: TransactionId) -> Result<()> {
        let cf = self.cf(CF_QUEUE)?;
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.db
            .put_cf(cf, seq.to_be_bytes(), id.as_str().as_bytes())?;
        self.pending_len.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn dequeue_batch(&self, max: usize) -> Result<Vec<TransactionId>> {
        let mut in_flight = self.in_flight.lock().await;
        let cf = self.cf(CF_QUEUE)?;

        let mut batch = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            if batch.len() >= max {
                break;
            }
            let (key, value) = item?;
            if key.len() != 8 {
                continue;
            }
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&key);
            let seq = u64::from_be_bytes(buf);
            let id = TransactionId::from(String::from_utf8_lossy(&value).into_owned());
            if in_flight.contains_key(&id) {
                continue;
            }
            in_flight.insert(id.clone(), seq);
            self.pending_len.fetch_sub(1, Ordering::SeqCst);
            batch.push(id);
        }
        Ok(batch)
    }

    async fn ack(&self, id: &TransactionId) -> Result<()> {
        let mut in_flight = self.in_flight.lock().await;
        if let Some(seq) = in_flight.remove(id) {
            let cf = self.cf(CF_QUEUE)?;
            self.db.delete_cf(cf, seq.to_be_bytes())?;
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.pending_len.load(Ordering::SeqCst).max(0) as usize)
    }
}

#[async_trait]
impl MetricsStore for RocksDbStore {
    async fn store_sample(&self, sample: MetricsSample) -> Result<()> {
        let cf = self.cf(CF_METRICS)?;
        self.db.put_cf(
            cf,
            sample.timestamp_bucket.to_be_bytes(),
            serde_json::to_vec(&sample)?,
        )?;
        Ok(())
    }

    async fn samples_since(&self, since_ms: u64) -> Result<Vec<MetricsSample>> {
        let cf = self.cf(CF_METRICS)?;
        let start = since_ms.to_be_bytes();
        let mut samples = Vec::new();
        for item in self.db.iterator_cf(
            cf,
            IteratorMode::From(&start, rocksdb::Direction::Forward),
        ) {
            let (_, value) = item?;
            samples.push(serde_json::from_slice(&value)?);
        }
        Ok(samples)
    }
}
