use thiserror::Error;

use crate::core_types::UnsupportedCurrency;
use crate::store::StoreError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error(transparent)]
    UnsupportedCurrency(#[from] UnsupportedCurrency),

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(i64),

    #[error("Transfer not found: {0}")]
    TransferNotFound(i64),

    #[error("Account already exists for {owner} in {currency}")]
    AlreadyExists { owner: String, currency: String },

    /// Entries or transfers still reference the account
    #[error("Account {0} has ledger history and cannot be deleted")]
    HasHistory(i64),

    #[error("Invalid page: limit must be 1..=100 and offset >= 0")]
    InvalidPage,

    #[error(transparent)]
    Store(StoreError),
}

impl AccountError {
    pub fn code(&self) -> &'static str {
        match self {
            AccountError::UnsupportedCurrency(_) => "UNSUPPORTED_CURRENCY",
            AccountError::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            AccountError::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            AccountError::TransferNotFound(_) => "TRANSFER_NOT_FOUND",
            AccountError::AlreadyExists { .. } => "ACCOUNT_EXISTS",
            AccountError::HasHistory(_) => "ACCOUNT_HAS_HISTORY",
            AccountError::InvalidPage => "INVALID_PAGE",
            AccountError::Store(e) if e.is_retryable() => "SERIALIZATION_CONFLICT",
            AccountError::Store(StoreError::Unavailable(_)) => "SERVICE_UNAVAILABLE",
            AccountError::Store(_) => "SYSTEM_ERROR",
        }
    }
}

impl From<StoreError> for AccountError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(what) => AccountError::AccountNotFound(what),
            other => AccountError::Store(other),
        }
    }
}
