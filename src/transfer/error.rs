//! Transfer Error Types

use thiserror::Error;

use crate::store::StoreError;

/// Transfer error types
///
/// Storage failures are carried through unchanged in meaning; the coordinator
/// never recovers from any of them locally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    // === Request Guards ===
    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Source and target account cannot be the same")]
    SameAccount,

    // === Storage Failures ===
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Serialization conflict, retry the transfer: {0}")]
    SerializationConflict(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    // === Caller ===
    #[error("Transfer cancelled before commit")]
    Cancelled,

    #[error("Internal system error: {0}")]
    Internal(String),
}

impl TransferError {
    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidAmount => "INVALID_AMOUNT",
            TransferError::SameAccount => "SAME_ACCOUNT",
            TransferError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            TransferError::SerializationConflict(_) => "SERIALIZATION_CONFLICT",
            TransferError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            TransferError::Constraint(_) => "CONSTRAINT_VIOLATION",
            TransferError::Cancelled => "CANCELLED",
            TransferError::Internal(_) => "SYSTEM_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            TransferError::InvalidAmount | TransferError::SameAccount => 400,
            TransferError::AccountNotFound(_) => 404,
            TransferError::SerializationConflict(_) => 409,
            TransferError::Constraint(_) => 422,
            TransferError::Cancelled => 408,
            TransferError::Internal(_) => 500,
            TransferError::Unavailable(_) => 503,
        }
    }

    /// Whether re-invoking the whole transfer may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::SerializationConflict(_))
    }
}

impl From<StoreError> for TransferError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => TransferError::AccountNotFound(msg),
            StoreError::SerializationConflict(msg) => TransferError::SerializationConflict(msg),
            StoreError::Unavailable(msg) => TransferError::Unavailable(msg),
            StoreError::Constraint(msg) => TransferError::Constraint(msg),
            StoreError::UnitClosed => TransferError::Internal(e.to_string()),
            StoreError::Internal(msg) => TransferError::Internal(msg),
        }
    }
}
