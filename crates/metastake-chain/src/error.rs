//! Error types for contract operations.

use metastake_core::FailureReason;
use thiserror::Error;

/// Failure of a contract read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Contract call failed: {0}")]
    Call(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Failure of a contract write or of waiting for its receipt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("User rejected the request")]
    Rejected,

    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    #[error("Execution reverted: {0}")]
    Reverted(String),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl WriteError {
    /// Classify an error returned while the wallet was signing or broadcasting.
    pub fn into_submit_failure(self) -> FailureReason {
        match self {
            WriteError::Rejected => FailureReason::WalletRejected,
            WriteError::Reverted(reason) => FailureReason::Reverted(reason),
            WriteError::Broadcast(msg) => FailureReason::SubmissionFailed(msg),
            WriteError::Chain(e) => FailureReason::SubmissionFailed(e.to_string()),
        }
    }

    /// Classify an error returned while waiting for inclusion.
    pub fn into_receipt_failure(self) -> FailureReason {
        match self {
            WriteError::Reverted(reason) => FailureReason::Reverted(reason),
            WriteError::Rejected => FailureReason::WalletRejected,
            WriteError::Broadcast(msg) => FailureReason::SubmissionFailed(msg),
            WriteError::Chain(e) => FailureReason::SubmissionFailed(e.to_string()),
        }
    }
}
