//! Ledger rows: Account, Entry, Transfer
//!
//! Rows are plain data; they are created and mutated only through a
//! [`LedgerUnit`](crate::store::LedgerUnit).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::core_types::{AccountId, Amount, Currency, EntryId, TransferId};

/// A customer account.
///
/// `balance` always equals the sum of all [`Entry`] amounts posted against
/// the account. `currency` never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    pub balance: Amount,
    #[sqlx(try_from = "String")]
    pub currency: Currency,
    pub created_at: DateTime<Utc>,
}

/// One immutable ledger line (negative = debit, positive = credit)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Entry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    #[inline]
    pub fn is_debit(&self) -> bool {
        self.amount < 0
    }
}

/// A committed money movement. Owns exactly two entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Transfer {
    pub id: TransferId,
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Amount,
    pub created_at: DateTime<Utc>,
}

/// Everything a successful transfer produced, accounts as of after the commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

/// Limit/offset window for list queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const MAX_LIMIT: i64 = 100;

    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    /// Page `page_id` (1-based) of `page_size` rows.
    ///
    /// An offset that does not fit in `i64` comes out negative, which
    /// [`Page::is_valid`] rejects.
    pub fn numbered(page_id: i64, page_size: i64) -> Self {
        let offset = page_id
            .saturating_sub(1)
            .max(0)
            .checked_mul(page_size)
            .unwrap_or(-1);
        Self {
            limit: page_size,
            offset,
        }
    }

    pub fn is_valid(&self) -> bool {
        (1..=Self::MAX_LIMIT).contains(&self.limit) && self.offset >= 0
    }

    /// Apply the window to an already ordered slice
    pub(crate) fn slice<'a, T>(&self, rows: &'a [T]) -> &'a [T] {
        let start = (self.offset.max(0) as usize).min(rows.len());
        let end = start
            .saturating_add(self.limit.max(0) as usize)
            .min(rows.len());
        &rows[start..end]
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
        }
    }
}
