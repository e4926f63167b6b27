use crate::application::engine::EngineEvent;
use crate::application::metrics::MetricsCollector;
use crate::config::EngineConfig;
use crate::domain::money::Amount;
use crate::domain::ports::{LedgerStoreRef, TransactionQueueRef, TransactionStoreRef};
use crate::domain::signature::SignatureValidator;
use crate::domain::transaction::{Transaction, TransactionStatus};
use crate::error::Result;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Semaphore, broadcast, watch};
use tokio::time::{MissedTickBehavior, timeout};
use tracing::{debug, error, warn};

/// Flat gas charged for any transfer.
const GAS_BASE: u64 = 21_000;
/// Gas per authorization-token character.
const GAS_PER_TOKEN_CHAR: u64 = 10;
/// Gas per doubling of the transferred amount.
const GAS_PER_AMOUNT_LOG2: u64 = 100;

/// Deterministic gas-equivalent cost of a transfer.
pub fn gas_cost(auth_token: &str, amount: Amount) -> u64 {
    let log2 = amount
        .value()
        .to_f64()
        .filter(|v| *v >= 1.0)
        .map(|v| v.log2().floor() as u64)
        .unwrap_or(0);
    GAS_BASE + GAS_PER_TOKEN_CHAR * auth_token.len() as u64 + GAS_PER_AMOUNT_LOG2 * log2
}

/// Timer-driven batch executor.
///
/// Every tick drains up to `batch_size` ids from the queue in submission
/// order and executes them, concurrently when `parallel_processing` is set.
/// Items are independent: each one reaches its own terminal state, acks its
/// own queue entry and feeds the metrics window, so one failure never rolls
/// back or aborts its siblings. Completion order within a batch is
/// therefore unspecified.
#[derive(Clone)]
pub struct BatchDispatcher {
    config: EngineConfig,
    ledger: LedgerStoreRef,
    transactions: TransactionStoreRef,
    queue: TransactionQueueRef,
    validator: Arc<dyn SignatureValidator>,
    metrics: Arc<MetricsCollector>,
    events: broadcast::Sender<EngineEvent>,
}

impl BatchDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        ledger: LedgerStoreRef,
        transactions: TransactionStoreRef,
        queue: TransactionQueueRef,
        validator: Arc<dyn SignatureValidator>,
        metrics: Arc<MetricsCollector>,
        events: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            config,
            ledger,
            transactions,
            queue,
            validator,
            metrics,
            events,
        }
    }

    /// Tick loop; runs until `shutdown` flips to true. A failed cycle is
    /// logged and retried on the next tick.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut tick = tokio::time::interval(self.config.dispatch_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(err) = self.run_tick().await {
                        warn!(error = %err, "dispatch cycle aborted, retrying next tick");
                    }
                }
                _ = shutdown.changed() => {
                    debug!("dispatcher shutting down");
                    break;
                }
            }
        }
    }

    /// One dispatch cycle. Returns how many transactions were dispatched.
    /// Waiting for the batch is capped by `batch_timeout` in both execution
    /// modes.
    ///
    /// Exposed so tests can drive the dispatcher without the timer.
    pub async fn run_tick(&self) -> Result<usize> {
        let ids = self.queue.dequeue_batch(self.config.batch_size).await?;
        if ids.is_empty() {
            return Ok(0);
        }

        // Load and mark the batch before executing anything. Redelivered ids
        // whose row is already terminal are acked and dropped here.
        let mut batch = Vec::with_capacity(ids.len());
        for id in ids {
            match self.transactions.get(&id).await? {
                Some(mut tx) if !tx.status.is_terminal() => {
                    tx.status = TransactionStatus::Processing;
                    self.transactions.store(tx.clone()).await?;
                    batch.push(tx);
                }
                Some(_) => {
                    self.queue.ack(&id).await?;
                }
                None => {
                    warn!(%id, "queued id has no transaction row, dropping");
                    self.queue.ack(&id).await?;
                }
            }
        }

        // Execution runs on its own task so a timeout only abandons the
        // wait; slow items are never cancelled mid-transfer and still reach
        // a terminal state and ack on their own.
        let count = batch.len();
        let dispatcher = self.clone();
        let worker = tokio::spawn(async move {
            if dispatcher.config.parallel_processing {
                dispatcher.execute_parallel(batch).await;
            } else {
                for tx in batch {
                    dispatcher.execute_one(tx).await;
                }
            }
        });
        match timeout(self.config.batch_timeout, worker).await {
            Ok(Ok(())) => {
                debug!(count, tps = self.metrics.current_tps(), "batch dispatched");
            }
            Ok(Err(err)) => error!(error = %err, "batch worker panicked"),
            Err(_) => {
                let err = crate::error::EngineError::ExecutionTimeout(self.config.batch_timeout);
                error!(error = %err, "abandoning batch wait; in-flight items finish on their own");
            }
        }
        Ok(count)
    }

    /// Fan the batch out over tasks, bounded by the concurrency gate rather
    /// than the batch size.
    async fn execute_parallel(&self, batch: Vec<Transaction>) {
        let gate = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut handles = Vec::with_capacity(batch.len());
        for tx in batch {
            let dispatcher = self.clone();
            let gate = Arc::clone(&gate);
            handles.push(tokio::spawn(async move {
                // The gate is never closed while the dispatcher runs.
                let Ok(_permit) = gate.acquire_owned().await else {
                    return;
                };
                dispatcher.execute_one(tx).await;
            }));
        }

        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "batch item task panicked");
            }
        }
    }

    /// Executes one transaction to a terminal state.
    ///
    /// Persistence failures leave the queue entry unacked so the item is
    /// redelivered on a later tick.
    async fn execute_one(&self, mut tx: Transaction) {
        let started = Instant::now();
        let outcome = self.execute_transfer(&tx).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let event = match outcome {
            Ok(gas_used) => {
                tx.complete(elapsed_ms, gas_used);
                EngineEvent::Completed { id: tx.id.clone() }
            }
            Err(err) => {
                debug!(id = %tx.id, reason = err.reason(), "transaction failed");
                tx.fail(elapsed_ms, err.reason());
                EngineEvent::Failed {
                    id: tx.id.clone(),
                    reason: err.reason().to_string(),
                }
            }
        };
        let success = tx.status == TransactionStatus::Completed;

        if let Err(err) = self.transactions.store(tx.clone()).await {
            error!(id = %tx.id, error = %err, "failed to persist terminal state");
            return;
        }
        if let Err(err) = self.queue.ack(&tx.id).await {
            error!(id = %tx.id, error = %err, "failed to ack queue entry");
            return;
        }

        self.metrics.record_outcome(success, elapsed_ms);
        let _ = self.events.send(event);
    }

    /// The authoritative per-item checks: signature first, then the atomic
    /// funds-checked ledger transfer. Returns the gas cost on success.
    async fn execute_transfer(&self, tx: &Transaction) -> Result<u64> {
        if !self.validator.validate(&tx.auth_token, &tx.from) {
            return Err(crate::error::EngineError::InvalidSignature(
                "authorization token rejected at execution".to_string(),
            ));
        }
        self.ledger
            .transfer(&tx.from, &tx.to, tx.amount, &tx.asset)
            .await?;
        Ok(gas_cost(&tx.auth_token, tx.amount))
    }
}
