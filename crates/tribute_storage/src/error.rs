#![forbid(unsafe_code)]

use tribute_contracts::ContractViolation;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid slot key: {0}")]
    InvalidKey(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("contract violation: {0}")]
    Contract(#[from] ContractViolation),
    #[error("slot store lock poisoned")]
    LockPoisoned,
}
