//! Account administration and ledger queries
//!
//! Each call runs in its own short unit of work.

use std::str::FromStr;
use std::sync::Arc;

use super::error::AccountError;
use crate::core_types::{AccountId, Currency, EntryId, TransferId};
use crate::models::{Account, Entry, Page, Transfer};
use crate::store::{LedgerStore, LedgerUnit, StoreError};

pub struct AccountService {
    store: Arc<dyn LedgerStore>,
}

impl AccountService {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    async fn unit(&self) -> Result<Box<dyn LedgerUnit>, AccountError> {
        Ok(self.store.begin().await?)
    }

    /// Open a zero-balance account for `owner` in `currency_code`
    pub async fn open_account(
        &self,
        owner: &str,
        currency_code: &str,
    ) -> Result<Account, AccountError> {
        let currency = Currency::from_str(currency_code)?;
        let already_exists = || AccountError::AlreadyExists {
            owner: owner.to_string(),
            currency: currency.code().to_string(),
        };

        let mut unit = self.unit().await?;
        let account = match unit.insert_account(owner, currency).await {
            Ok(account) => account,
            Err(StoreError::Constraint(_)) => return Err(already_exists()),
            Err(e) => return Err(e.into()),
        };
        // A concurrent open of the same pair may only surface at commit
        match unit.commit().await {
            Ok(()) => {}
            Err(StoreError::Constraint(_)) => return Err(already_exists()),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            account_id = account.id,
            owner,
            currency = currency.code(),
            "Account opened"
        );
        Ok(account)
    }

    pub async fn get_account(&self, account_id: AccountId) -> Result<Account, AccountError> {
        let mut unit = self.unit().await?;
        let account = unit.get_account(account_id).await?;
        unit.commit().await?;
        Ok(account)
    }

    pub async fn list_accounts(
        &self,
        owner: &str,
        page: Page,
    ) -> Result<Vec<Account>, AccountError> {
        check_page(page)?;
        let mut unit = self.unit().await?;
        let accounts = unit.list_accounts(owner, page).await?;
        unit.commit().await?;
        Ok(accounts)
    }

    /// Hard delete; refused once the account has entries or transfers
    pub async fn delete_account(&self, account_id: AccountId) -> Result<(), AccountError> {
        let mut unit = self.unit().await?;
        match unit.delete_account(account_id).await {
            Ok(()) => {}
            Err(StoreError::Constraint(_)) => return Err(AccountError::HasHistory(account_id)),
            Err(e) => return Err(e.into()),
        }
        unit.commit().await?;
        tracing::info!(account_id, "Account deleted");
        Ok(())
    }

    pub async fn get_entry(&self, entry_id: EntryId) -> Result<Entry, AccountError> {
        let mut unit = self.unit().await?;
        let entry = unit.get_entry(entry_id).await.map_err(|e| match e {
            StoreError::NotFound(_) => AccountError::EntryNotFound(entry_id),
            other => other.into(),
        })?;
        unit.commit().await?;
        Ok(entry)
    }

    pub async fn list_entries(
        &self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, AccountError> {
        check_page(page)?;
        let mut unit = self.unit().await?;
        let entries = unit.list_entries(account_id, page).await?;
        unit.commit().await?;
        Ok(entries)
    }

    pub async fn get_transfer(&self, transfer_id: TransferId) -> Result<Transfer, AccountError> {
        let mut unit = self.unit().await?;
        let transfer = unit.get_transfer(transfer_id).await.map_err(|e| match e {
            StoreError::NotFound(_) => AccountError::TransferNotFound(transfer_id),
            other => other.into(),
        })?;
        unit.commit().await?;
        Ok(transfer)
    }

    /// Transfers leaving `from_account_id` or arriving at `to_account_id`
    pub async fn list_transfers(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Transfer>, AccountError> {
        check_page(page)?;
        let mut unit = self.unit().await?;
        let transfers = unit
            .list_transfers(from_account_id, to_account_id, page)
            .await?;
        unit.commit().await?;
        Ok(transfers)
    }
}

fn check_page(page: Page) -> Result<(), AccountError> {
    if page.is_valid() {
        Ok(())
    } else {
        Err(AccountError::InvalidPage)
    }
}
