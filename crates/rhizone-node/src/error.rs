//! Error types for the daemon.

use rhizone_ledger::LedgerError;
use thiserror::Error;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur running a node.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad environment configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ledger error
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Succession error
    #[error("Succession error: {0}")]
    Succession(#[from] rhizone_succession::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
