use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure taxonomy for the transfer engine.
///
/// `Validation`, `InvalidSignature`, `InsufficientFunds` and `RateLimited`
/// are surfaced synchronously at submission; the rest are produced during
/// batch execution and recorded on the transaction itself.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("insufficient funds: {address} holds less than {amount} {asset}")]
    InsufficientFunds {
        address: String,
        asset: String,
        amount: rust_decimal::Decimal,
    },
    #[error("transaction not found: {0}")]
    NotFound(String),
    #[error("submission rate limit exceeded")]
    RateLimited,
    #[error("batch execution exceeded {0:?}")]
    ExecutionTimeout(Duration),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("storage error: {0}")]
    Storage(#[from] rocksdb::Error),
}

impl EngineError {
    /// Short machine-readable tag, used as `failure_reason` on failed
    /// transactions and in log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation_error",
            EngineError::InvalidSignature(_) => "invalid_signature",
            EngineError::InsufficientFunds { .. } => "insufficient_funds",
            EngineError::NotFound(_) => "not_found",
            EngineError::RateLimited => "rate_limited",
            EngineError::ExecutionTimeout(_) => "execution_timeout",
            EngineError::StoreUnavailable(_) => "store_unavailable",
            EngineError::Serialization(_) => "serialization_error",
            #[cfg(feature = "storage-rocksdb")]
            EngineError::Storage(_) => "storage_error",
        }
    }
}
