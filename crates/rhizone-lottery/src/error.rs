//! Error types for the lottery.

use thiserror::Error;

/// Result type for lottery operations.
pub type Result<T> = std::result::Result<T, LotteryError>;

/// Errors that can occur while drawing a custodian.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LotteryError {
    /// Nobody may receive the token: the eligible set is empty, or every
    /// eligible member holds zero tickets under a rejecting policy.
    #[error("no eligible candidates")]
    NoEligibleCandidates,
}
