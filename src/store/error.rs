//! Persistence port error types

use thiserror::Error;

/// Failures any ledger store may report.
///
/// Every variant is propagated unchanged through the coordinator; none are
/// recovered from locally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Referenced row does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Another unit touched the same row; the whole unit must be retried
    #[error("Serialization conflict: {0}")]
    SerializationConflict(String),

    /// Storage unreachable, or a unit could not begin
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Unique, foreign-key, check or range violation
    #[error("Constraint violation: {0}")]
    Constraint(String),

    /// Unit already committed or rolled back
    #[error("Unit of work is closed")]
    UnitClosed,

    #[error("Internal storage error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn account_not_found(account_id: i64) -> Self {
        StoreError::NotFound(format!("account {}", account_id))
    }

    /// Only serialization conflicts are worth re-running the whole unit for
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::SerializationConflict(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => StoreError::NotFound("row".to_string()),
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // serialization_failure, deadlock_detected
                Some("40001") | Some("40P01") => {
                    StoreError::SerializationConflict(db_err.message().to_string())
                }
                // foreign_key_violation: insert referencing a missing account
                Some("23503") => StoreError::NotFound(db_err.message().to_string()),
                // unique_violation, check_violation, numeric_value_out_of_range
                Some("23505") | Some("23514") | Some("22003") => {
                    StoreError::Constraint(db_err.message().to_string())
                }
                // admin_shutdown, cannot_connect_now
                Some("57P01") | Some("57P03") => StoreError::Unavailable(e.to_string()),
                _ => StoreError::Internal(e.to_string()),
            },
            _ => StoreError::Internal(e.to_string()),
        }
    }
}
