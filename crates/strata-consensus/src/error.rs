//! Consensus error types.

use thiserror::Error;

/// Errors returned by difficulty retargeting and proof-of-work checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConsensusError {
    /// Intermediate or final difficulty value did not fit its integer width.
    #[error("difficulty computation overflowed")]
    DifficultyOverflow,

    /// Retargeting produced zero, which is never a valid difficulty.
    #[error("difficulty computation produced zero")]
    ZeroDifficulty,

    /// Proof-of-work hash did not meet the required difficulty.
    #[error("insufficient proof of work")]
    InsufficientPoW,
}
