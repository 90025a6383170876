//! Persistence port for the ledger
//!
//! The coordinator only ever talks to a [`LedgerUnit`]: a transactional unit of
//! work obtained from a [`LedgerStore`]. Writes made through a unit are invisible
//! to other units until [`LedgerUnit::commit`] and are discarded on
//! [`LedgerUnit::rollback`] or when the unit is dropped uncommitted.
//!
//! # Adapters
//!
//! - [`postgres::PgLedgerStore`] - PostgreSQL via sqlx, row locks from `UPDATE`
//! - [`memory::InMemoryLedgerStore`] - in-process, per-account async mutexes

pub mod error;
pub mod memory;
pub mod postgres;
pub mod schema;

pub use error::StoreError;
pub use memory::InMemoryLedgerStore;
pub use postgres::PgLedgerStore;

use async_trait::async_trait;

use crate::core_types::{AccountId, Amount, Currency, EntryId, TransferId};
use crate::models::{Account, Entry, Page, Transfer};

/// Source of units of work
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Adapter name for logging
    fn name(&self) -> &'static str;

    /// Open a new unit of work.
    ///
    /// Fails with [`StoreError::Unavailable`] when storage cannot be reached.
    async fn begin(&self) -> Result<Box<dyn LedgerUnit>, StoreError>;
}

/// One transactional unit of work.
///
/// After `commit` or `rollback` every further call returns
/// [`StoreError::UnitClosed`].
#[async_trait]
pub trait LedgerUnit: Send {
    /// Make every write of this unit durable and visible, release row locks
    async fn commit(&mut self) -> Result<(), StoreError>;

    /// Discard every write of this unit, release row locks
    async fn rollback(&mut self) -> Result<(), StoreError>;

    // === Transfer path ===

    /// Insert a transfer row. Fails with `NotFound` if either account is missing.
    async fn insert_transfer(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Amount,
    ) -> Result<Transfer, StoreError>;

    /// Insert a ledger line. Fails with `NotFound` if the account is missing.
    async fn insert_entry(
        &mut self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<Entry, StoreError>;

    /// Atomically add `delta` to the account balance.
    ///
    /// Takes the account row lock (held until the unit ends) and returns the
    /// account carrying its new balance. Never a separate read and write.
    async fn apply_balance_delta(
        &mut self,
        account_id: AccountId,
        delta: Amount,
    ) -> Result<Account, StoreError>;

    /// Read an account as seen by this unit
    async fn get_account(&mut self, account_id: AccountId) -> Result<Account, StoreError>;

    /// Read an account, taking its row lock
    async fn get_account_for_update(&mut self, account_id: AccountId)
    -> Result<Account, StoreError>;

    // === Account administration and ledger queries ===

    /// Insert an account with a zero balance
    async fn insert_account(
        &mut self,
        owner: &str,
        currency: Currency,
    ) -> Result<Account, StoreError>;

    /// Hard delete. Fails with `Constraint` while ledger rows reference it.
    async fn delete_account(&mut self, account_id: AccountId) -> Result<(), StoreError>;

    async fn list_accounts(&mut self, owner: &str, page: Page)
    -> Result<Vec<Account>, StoreError>;

    async fn get_entry(&mut self, entry_id: EntryId) -> Result<Entry, StoreError>;

    async fn list_entries(
        &mut self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, StoreError>;

    async fn get_transfer(&mut self, transfer_id: TransferId) -> Result<Transfer, StoreError>;

    /// Transfers leaving `from_account_id` or arriving at `to_account_id`
    async fn list_transfers(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Transfer>, StoreError>;
}
