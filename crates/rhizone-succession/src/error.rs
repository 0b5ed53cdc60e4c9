//! Error types for succession.

use rhizone_ledger::{LedgerError, MemberId};
use rhizone_lottery::LotteryError;
use thiserror::Error;

/// Result type for succession operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while driving succession.
#[derive(Debug, Error)]
pub enum Error {
    /// The ledger rejected or failed to persist a write
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The lottery could not produce a custodian
    #[error("Lottery error: {0}")]
    Lottery(#[from] LotteryError),

    /// The membership platform failed
    #[error("Platform error: {0}")]
    Platform(String),

    /// A draw is already running
    #[error("a draw is already in progress")]
    DrawInProgress,

    /// The controller is in the wrong state for the operation
    #[error("invalid succession state: expected {expected}, got {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    /// Only the current custodian may skip
    #[error("member {requester} is not the current custodian")]
    NotCustodian { requester: MemberId },

    /// Automatic succession is halted
    #[error("automatic succession is suspended: {0}")]
    Suspended(String),

    /// The service loop is gone
    #[error("succession service has stopped")]
    ServiceStopped,
}

impl Error {
    /// Errors after which the controller simply stays where it was.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Lottery(LotteryError::NoEligibleCandidates) | Error::DrawInProgress
        )
    }

    /// Storage failures, fatal to the operation in flight.
    pub fn is_storage(&self) -> bool {
        matches!(self, Error::Ledger(e) if e.is_storage())
    }
}
