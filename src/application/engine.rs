use crate::application::dispatcher::BatchDispatcher;
use crate::application::metrics::MetricsCollector;
use crate::config::EngineConfig;
use crate::domain::metrics::MetricsSample;
use crate::domain::money::Amount;
use crate::domain::ports::{
    LedgerStoreRef, MetricsStoreRef, TransactionQueueRef, TransactionStoreRef,
};
use crate::domain::signature::SignatureValidator;
use crate::domain::transaction::{Transaction, TransactionId, now_millis};
use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Capacity of the event broadcast channel; slow subscribers lag and lose
/// old events rather than backpressure the engine.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// An asset-transfer request as received from callers.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    pub asset: String,
    pub auth_token: String,
}

/// Observable lifecycle notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Submitted { id: TransactionId },
    Completed { id: TransactionId },
    Failed { id: TransactionId, reason: String },
}

/// Metrics exposed to collaborators via `performance_metrics`.
#[derive(Debug, Clone)]
pub struct PerformanceReport {
    pub samples: Vec<MetricsSample>,
    pub current_tps: f64,
    pub queue_length: usize,
}

/// Coarse counters exposed via `stats`.
///
/// `total_transactions` is read from the transaction store, so on durable
/// backends it survives a restart; the TPS figures are per-process.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineStats {
    pub total_transactions: u64,
    pub pending_transactions: usize,
    pub current_tps: f64,
    pub max_tps: f64,
    pub queue_length: usize,
}

/// Per-second admission counter for the enforced submission cap.
#[derive(Debug, Default)]
struct AdmissionWindow {
    second: u64,
    admitted: u32,
}

/// The engine's public face: admits transfers into the queue and answers
/// status/metrics queries. Execution is asynchronous; `start` spawns the
/// dispatcher and metrics-snapshot loops.
///
/// The stores are the single source of truth — the engine holds no balance
/// or transaction state of its own, only the rolling metrics window.
pub struct TransferEngine {
    config: EngineConfig,
    ledger: LedgerStoreRef,
    transactions: TransactionStoreRef,
    queue: TransactionQueueRef,
    metrics_store: MetricsStoreRef,
    validator: Arc<dyn SignatureValidator>,
    metrics: Arc<MetricsCollector>,
    events: broadcast::Sender<EngineEvent>,
    admissions: Mutex<AdmissionWindow>,
}

impl TransferEngine {
    pub fn new(
        config: EngineConfig,
        ledger: LedgerStoreRef,
        transactions: TransactionStoreRef,
        queue: TransactionQueueRef,
        metrics_store: MetricsStoreRef,
        validator: Arc<dyn SignatureValidator>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            ledger,
            transactions,
            queue,
            metrics_store,
            validator,
            metrics: Arc::new(MetricsCollector::new()),
            events,
            admissions: Mutex::new(AdmissionWindow::default()),
        }
    }

    /// Engine wired to in-memory adapters and the entropy validator.
    pub fn in_memory(config: EngineConfig) -> Self {
        use crate::domain::signature::EntropyValidator;
        use crate::infrastructure::in_memory::{
            InMemoryLedgerStore, InMemoryMetricsStore, InMemoryQueue, InMemoryTransactionStore,
        };

        let ledger = Arc::new(InMemoryLedgerStore::new(config.default_balance));
        Self::new(
            config,
            ledger,
            Arc::new(InMemoryTransactionStore::new()),
            Arc::new(InMemoryQueue::new()),
            Arc::new(InMemoryMetricsStore::new()),
            Arc::new(EntropyValidator::new()),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validates and admits a transfer. Returns the id synchronously; the
    /// transfer itself runs on a later dispatch tick.
    ///
    /// The balance check here is optimistic: it keeps obviously unfunded
    /// requests out of the queue but does not reserve funds, so a
    /// transaction can still fail with `InsufficientFunds` at execution.
    pub async fn submit(&self, request: SubmitRequest) -> Result<TransactionId> {
        if request.from.trim().is_empty() || request.to.trim().is_empty() {
            return Err(EngineError::Validation("address must not be empty".to_string()));
        }
        if request.asset.trim().is_empty() {
            return Err(EngineError::Validation("asset must not be empty".to_string()));
        }
        let amount = Amount::new(request.amount)?;

        self.check_admission()?;

        if !self.validator.validate(&request.auth_token, &request.from) {
            return Err(EngineError::InvalidSignature(
                "authorization token rejected".to_string(),
            ));
        }

        let balance = self
            .ledger
            .get_balance(&request.from, &request.asset)
            .await?;
        if !balance.covers(amount) {
            return Err(EngineError::InsufficientFunds {
                address: request.from,
                asset: request.asset,
                amount: amount.value(),
            });
        }

        let tx = Transaction::new(
            request.from,
            request.to,
            amount,
            request.asset,
            request.auth_token,
        );
        let id = tx.id.clone();

        self.transactions.store(tx).await?;
        self.metrics.record_submitted();
        // Emit before the id becomes dispatchable so subscribers always see
        // `Submitted` ahead of the terminal event.
        let _ = self.events.send(EngineEvent::Submitted { id: id.clone() });
        self.queue.enqueue(id.clone()).await?;

        Ok(id)
    }

    /// Enforced admission control: when a cap is configured, submissions
    /// beyond it within one wall-clock second are rejected.
    fn check_admission(&self) -> Result<()> {
        let Some(cap) = self.config.max_transactions_per_second else {
            return Ok(());
        };
        let second = now_millis() / 1000;
        let mut window = self.admissions.lock().unwrap_or_else(|e| e.into_inner());
        if window.second != second {
            window.second = second;
            window.admitted = 0;
        }
        if window.admitted >= cap {
            return Err(EngineError::RateLimited);
        }
        window.admitted += 1;
        Ok(())
    }

    /// Current view of a transaction; terminal results are stable.
    pub async fn get_transaction(&self, id: &TransactionId) -> Result<Transaction> {
        self.transactions
            .get(id)
            .await?
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    /// Persisted samples within the window plus live throughput figures.
    pub async fn performance_metrics(&self, window_hours: u64) -> Result<PerformanceReport> {
        let since_ms = now_millis().saturating_sub(window_hours.saturating_mul(3_600_000));
        Ok(PerformanceReport {
            samples: self.metrics_store.samples_since(since_ms).await?,
            current_tps: self.metrics.current_tps(),
            queue_length: self.queue.len().await?,
        })
    }

    pub async fn stats(&self) -> Result<EngineStats> {
        let queue_length = self.queue.len().await?;
        Ok(EngineStats {
            total_transactions: self.transactions.count().await?,
            pending_transactions: queue_length,
            current_tps: self.metrics.current_tps(),
            max_tps: self.metrics.max_tps(),
            queue_length,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Builds a dispatcher sharing this engine's stores and collector.
    /// Tests drive ticks through it directly instead of starting the timers.
    pub fn dispatcher(&self) -> BatchDispatcher {
        BatchDispatcher::new(
            self.config.clone(),
            Arc::clone(&self.ledger),
            Arc::clone(&self.transactions),
            Arc::clone(&self.queue),
            Arc::clone(&self.validator),
            Arc::clone(&self.metrics),
            self.events.clone(),
        )
    }

    /// Spawns the dispatch and metrics-snapshot loops.
    pub fn start(&self) -> EngineHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let dispatcher = self.dispatcher();
        let dispatcher_task = tokio::spawn(dispatcher.run(shutdown_rx.clone()));

        let metrics = Arc::clone(&self.metrics);
        let metrics_store = Arc::clone(&self.metrics_store);
        let interval = self.config.metrics_interval;
        let mut snapshot_shutdown = shutdown_rx;
        let snapshot_task = tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            // The immediate first tick would persist an all-zero sample.
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        let sample = metrics.snapshot();
                        if let Err(err) = metrics_store.store_sample(sample).await {
                            warn!(error = %err, "failed to persist metrics sample");
                        }
                    }
                    _ = snapshot_shutdown.changed() => break,
                }
            }
        });

        info!(
            batch_size = self.config.batch_size,
            interval_ms = self.config.dispatch_interval.as_millis() as u64,
            parallel = self.config.parallel_processing,
            "transfer engine started"
        );
        EngineHandle {
            shutdown: shutdown_tx,
            dispatcher: dispatcher_task,
            snapshots: snapshot_task,
        }
    }
}

/// Handle to the background loops spawned by [`TransferEngine::start`].
pub struct EngineHandle {
    shutdown: watch::Sender<bool>,
    dispatcher: JoinHandle<()>,
    snapshots: JoinHandle<()>,
}

impl EngineHandle {
    /// Stops both loops and waits for them to finish. In-flight batch items
    /// already spawned will still reach a terminal state.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.dispatcher.await;
        let _ = self.snapshots.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn token() -> String {
        "0123456789abcdef".repeat(8)
    }

    fn request(from: &str, to: &str, amount: Decimal) -> SubmitRequest {
        SubmitRequest {
            from: from.to_string(),
            to: to.to_string(),
            amount,
            asset: "XAU".to_string(),
            auth_token: token(),
        }
    }

    fn seeded_engine() -> TransferEngine {
        TransferEngine::in_memory(EngineConfig::default().with_seed_balance(dec!(1000)))
    }

    #[tokio::test]
    async fn test_submit_enqueues_pending_transaction() {
        let engine = seeded_engine();
        let id = engine
            .submit(request("alice", "bob", dec!(100)))
            .await
            .unwrap();

        let tx = engine.get_transaction(&id).await.unwrap();
        assert_eq!(tx.status, crate::domain::transaction::TransactionStatus::Pending);
        assert_eq!(engine.stats().await.unwrap().queue_length, 1);
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_requests() {
        let engine = seeded_engine();

        let err = engine.submit(request("", "bob", dec!(1))).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let err = engine
            .submit(request("alice", "bob", dec!(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let mut bad_asset = request("alice", "bob", dec!(1));
        bad_asset.asset = " ".to_string();
        let err = engine.submit(bad_asset).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_submit_rejects_short_token() {
        let engine = seeded_engine();
        let mut req = request("alice", "bob", dec!(1));
        req.auth_token = "0123456789abcdef".repeat(4); // 64 chars
        let err = engine.submit(req).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidSignature(_)));
    }

    #[tokio::test]
    async fn test_submit_rejects_unfunded_sender() {
        let engine = seeded_engine();
        let err = engine
            .submit(request("alice", "bob", dec!(1001)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFunds { .. }));
        // Never enqueued.
        assert_eq!(engine.stats().await.unwrap().queue_length, 0);
    }

    #[tokio::test]
    async fn test_get_transaction_not_found() {
        let engine = seeded_engine();
        let err = engine.get_transaction(&"nope".into()).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_admission_cap_enforced() {
        let engine = TransferEngine::in_memory(
            EngineConfig::default()
                .with_seed_balance(dec!(1000))
                .with_admission_cap(2),
        );

        engine.submit(request("alice", "bob", dec!(1))).await.unwrap();
        engine.submit(request("alice", "bob", dec!(1))).await.unwrap();
        let err = engine
            .submit(request("alice", "bob", dec!(1)))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::RateLimited));
    }

    #[tokio::test]
    async fn test_submit_emits_event() {
        let engine = seeded_engine();
        let mut events = engine.subscribe();
        let id = engine
            .submit(request("alice", "bob", dec!(10)))
            .await
            .unwrap();
        assert_eq!(events.recv().await.unwrap(), EngineEvent::Submitted { id });
    }
}
