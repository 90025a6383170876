//! Transfer request type

use serde::{Deserialize, Serialize};

use super::error::TransferError;
use crate::core_types::{AccountId, Amount};

/// A validated `(from, to, amount)` triple handed over by the API layer.
///
/// Ownership and currency checks happen before this is built; the
/// coordinator trusts them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Amount,
}

impl TransferRequest {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: Amount) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    /// Reject requests no unit of work should be opened for
    pub fn validate(&self) -> Result<(), TransferError> {
        if self.amount <= 0 {
            return Err(TransferError::InvalidAmount);
        }
        if self.from_account_id == self.to_account_id {
            return Err(TransferError::SameAccount);
        }
        Ok(())
    }

    /// Accounts in the order their rows must be locked: ascending id,
    /// independent of transfer direction
    #[inline]
    pub fn lock_order(&self) -> [AccountId; 2] {
        if self.from_account_id < self.to_account_id {
            [self.from_account_id, self.to_account_id]
        } else {
            [self.to_account_id, self.from_account_id]
        }
    }
}
