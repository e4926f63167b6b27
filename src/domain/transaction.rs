use crate::domain::money::Amount;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the UNIX epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Engine-assigned transaction identifier.
///
/// Epoch millis plus a per-process counter keeps ids unique and roughly
/// sortable by submission time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn generate() -> Self {
        let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("{:012x}-{:08x}", now_millis(), seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TransactionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TransactionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// An asset-transfer request and its lifecycle state.
///
/// Created by the submission path with status `Pending`; only the dispatcher
/// mutates it afterwards, and only until it reaches a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub from: String,
    pub to: String,
    pub amount: Amount,
    pub asset: String,
    pub auth_token: String,
    pub status: TransactionStatus,
    pub submitted_at_ms: u64,
    pub completed_at_ms: Option<u64>,
    pub processing_time_ms: Option<u64>,
    pub gas_used: Option<u64>,
    pub failure_reason: Option<String>,
}

impl Transaction {
    pub fn new(from: String, to: String, amount: Amount, asset: String, auth_token: String) -> Self {
        Self {
            id: TransactionId::generate(),
            from,
            to,
            amount,
            asset,
            auth_token,
            status: TransactionStatus::Pending,
            submitted_at_ms: now_millis(),
            completed_at_ms: None,
            processing_time_ms: None,
            gas_used: None,
            failure_reason: None,
        }
    }

    pub fn is_self_transfer(&self) -> bool {
        self.from == self.to
    }

    /// Records a successful execution.
    pub fn complete(&mut self, processing_time_ms: u64, gas_used: u64) {
        self.status = TransactionStatus::Completed;
        self.completed_at_ms = Some(now_millis());
        self.processing_time_ms = Some(processing_time_ms);
        self.gas_used = Some(gas_used);
        self.failure_reason = None;
    }

    /// Records a failed execution. The ledger is untouched on this path.
    pub fn fail(&mut self, processing_time_ms: u64, reason: &str) {
        self.status = TransactionStatus::Failed;
        self.completed_at_ms = Some(now_millis());
        self.processing_time_ms = Some(processing_time_ms);
        self.failure_reason = Some(reason.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_tx() -> Transaction {
        Transaction::new(
            "alice".to_string(),
            "bob".to_string(),
            Amount::new(dec!(10.0)).unwrap(),
            "XAU".to_string(),
            "ab".repeat(64),
        )
    }

    #[test]
    fn test_ids_are_unique() {
        let a = TransactionId::generate();
        let b = TransactionId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_new_transaction_is_pending() {
        let tx = sample_tx();
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(tx.completed_at_ms.is_none());
        assert!(tx.failure_reason.is_none());
    }

    #[test]
    fn test_complete_sets_terminal_fields() {
        let mut tx = sample_tx();
        tx.complete(12, 21_000);
        assert_eq!(tx.status, TransactionStatus::Completed);
        assert!(tx.status.is_terminal());
        assert_eq!(tx.processing_time_ms, Some(12));
        assert_eq!(tx.gas_used, Some(21_000));
        assert!(tx.completed_at_ms.is_some());
    }

    #[test]
    fn test_fail_records_reason() {
        let mut tx = sample_tx();
        tx.fail(3, "insufficient_funds");
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert_eq!(tx.failure_reason.as_deref(), Some("insufficient_funds"));
        assert!(tx.gas_used.is_none());
    }

    #[test]
    fn test_self_transfer_detection() {
        let mut tx = sample_tx();
        assert!(!tx.is_self_transfer());
        tx.to = "alice".to_string();
        assert!(tx.is_self_transfer());
    }

    #[test]
    fn test_transaction_json_round_trip() {
        let tx = sample_tx();
        let bytes = serde_json::to_vec(&tx).unwrap();
        let back: Transaction = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, tx);
    }
}
