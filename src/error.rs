use chrono::{DateTime, Utc};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Ledger entry references unknown withdrawal {0}")]
    UnknownWithdrawal(Uuid),

    #[error("Injected storage failure: {0}")]
    Injected(&'static str),
}

#[derive(Debug, Error)]
pub enum WithdrawalError {
    #[error("Withdrawal {0} not found")]
    NotFound(Uuid),

    #[error("Withdrawal {withdrawal_id} has been modified since it was last read (version {expected}); re-fetch and retry")]
    StaleVersion {
        withdrawal_id: Uuid,
        expected: DateTime<Utc>,
    },

    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Broadcast requires {required} distinct signatures, {present} present")]
    QuorumNotReached { required: i32, present: usize },

    #[error("Withdrawal {0} has an empty ledger")]
    EmptyLedger(Uuid),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl WithdrawalError {
    /// True for failures a caller can resolve by re-fetching and retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WithdrawalError::StaleVersion { .. }
                | WithdrawalError::Storage(_)
                | WithdrawalError::Timeout(_)
        )
    }
}
