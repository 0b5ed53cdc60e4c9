//! Error types for the ledger.

use crate::models::GrantId;
use thiserror::Error;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The grant is not the open, most recent grant
    #[error("grant #{0} is not the active grant")]
    GrantNotActive(GrantId),

    /// A grant is still open; a new one cannot be appended
    #[error("grant #{0} is still outstanding")]
    GrantOutstanding(GrantId),

    /// A grant id that was never issued
    #[error("grant #{0} not found")]
    GrantNotFound(GrantId),

    /// A grant already carries a token
    #[error("grant #{0} already has a token")]
    TokenAlreadyAttached(GrantId),

    /// Bootstrap on a ledger that already holds grants
    #[error("ledger already holds {0} grant(s); bootstrap refused")]
    AlreadyBootstrapped(u64),
}

impl LedgerError {
    /// Whether this error came from the storage layer rather than a rejected
    /// operation.
    pub fn is_storage(&self) -> bool {
        matches!(self, LedgerError::Storage(_) | LedgerError::Serialization(_))
    }
}

impl From<rocksdb::Error> for LedgerError {
    fn from(e: rocksdb::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}
