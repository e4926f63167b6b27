#![allow(dead_code)]

use batchpay::domain::ports::LedgerStoreRef;
use batchpay::domain::signature::EntropyValidator;
use batchpay::infrastructure::in_memory::{
    InMemoryLedgerStore, InMemoryMetricsStore, InMemoryQueue, InMemoryTransactionStore,
};
use batchpay::{EngineConfig, SubmitRequest, TransferEngine};
use rust_decimal::Decimal;
use std::sync::Arc;

/// A well-formed high-entropy 128-char hex token.
pub fn token() -> String {
    "0123456789abcdef".repeat(8)
}

pub fn request(from: &str, to: &str, amount: Decimal) -> SubmitRequest {
    SubmitRequest {
        from: from.to_string(),
        to: to.to_string(),
        amount,
        asset: "XAU".to_string(),
        auth_token: token(),
    }
}

/// Engine over in-memory adapters, returning the ledger so tests can seed
/// specific accounts and inspect balances directly.
pub fn engine_with_ledger(config: EngineConfig) -> (TransferEngine, Arc<InMemoryLedgerStore>) {
    let ledger = Arc::new(InMemoryLedgerStore::new(config.default_balance));
    let ledger_port: LedgerStoreRef = ledger.clone();
    let engine = TransferEngine::new(
        config,
        ledger_port,
        Arc::new(InMemoryTransactionStore::new()),
        Arc::new(InMemoryQueue::new()),
        Arc::new(InMemoryMetricsStore::new()),
        Arc::new(EntropyValidator::new()),
    );
    (engine, ledger)
}
