//! In-memory ledger store
//!
//! Each account has an async mutex standing in for its row lock. A unit takes
//! the lock on the first balance change (or locking read / delete) of an
//! account and holds it until commit, rollback or drop. All writes are
//! buffered in the unit and applied to the shared tables at commit, so other
//! units never observe uncommitted state.
//!
//! Intended for tests and local development.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, trace};

use super::error::StoreError;
use super::{LedgerStore, LedgerUnit};
use crate::core_types::{AccountId, Amount, Currency, EntryId, TransferId};
use crate::models::{Account, Entry, Page, Transfer};

#[derive(Default)]
struct Tables {
    accounts: BTreeMap<AccountId, Account>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
}

impl Tables {
    fn references(&self, account_id: AccountId) -> bool {
        self.entries.iter().any(|e| e.account_id == account_id)
            || self
                .transfers
                .iter()
                .any(|t| t.from_account_id == account_id || t.to_account_id == account_id)
    }
}

/// Failure switches for exercising error paths
#[derive(Default)]
struct Faults {
    unavailable: bool,
    conflict_on: HashSet<AccountId>,
}

struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<AccountId, Arc<tokio::sync::Mutex<()>>>>,
    faults: Mutex<Faults>,
    next_account_id: AtomicI64,
    next_entry_id: AtomicI64,
    next_transfer_id: AtomicI64,
}

fn guard<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    m.lock()
        .map_err(|_| StoreError::Internal("lock poisoned".to_string()))
}

/// In-process [`LedgerStore`]. Cloning shares the same tables.
#[derive(Clone)]
pub struct InMemoryLedgerStore {
    shared: Arc<Shared>,
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                row_locks: Mutex::new(HashMap::new()),
                faults: Mutex::new(Faults::default()),
                next_account_id: AtomicI64::new(1),
                next_entry_id: AtomicI64::new(1),
                next_transfer_id: AtomicI64::new(1),
            }),
        }
    }

    /// Make `begin` and every open unit fail with `Unavailable`
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut f) = self.shared.faults.lock() {
            f.unavailable = unavailable;
        }
    }

    /// Make balance changes on `account_id` fail with `SerializationConflict`
    pub fn inject_conflict(&self, account_id: AccountId) {
        if let Ok(mut f) = self.shared.faults.lock() {
            f.conflict_on.insert(account_id);
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut f) = self.shared.faults.lock() {
            *f = Faults::default();
        }
    }

    // === Committed-state inspection ===

    pub fn account(&self, account_id: AccountId) -> Option<Account> {
        self.shared
            .tables
            .lock()
            .ok()
            .and_then(|t| t.accounts.get(&account_id).cloned())
    }

    pub fn transfer_count(&self) -> usize {
        self.shared
            .tables
            .lock()
            .map(|t| t.transfers.len())
            .unwrap_or(0)
    }

    pub fn entry_count(&self) -> usize {
        self.shared
            .tables
            .lock()
            .map(|t| t.entries.len())
            .unwrap_or(0)
    }

    /// Committed entries of one account, ordered by id
    pub fn entries_of(&self, account_id: AccountId) -> Vec<Entry> {
        let mut rows: Vec<Entry> = self
            .shared
            .tables
            .lock()
            .map(|t| {
                t.entries
                    .iter()
                    .filter(|e| e.account_id == account_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(|e| e.id);
        rows
    }

    /// Committed transfers, ordered by id
    pub fn transfers(&self) -> Vec<Transfer> {
        let mut rows = self
            .shared
            .tables
            .lock()
            .map(|t| t.transfers.clone())
            .unwrap_or_default();
        rows.sort_by_key(|t| t.id);
        rows
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn begin(&self) -> Result<Box<dyn LedgerUnit>, StoreError> {
        if guard(&self.shared.faults)?.unavailable {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(Box::new(InMemoryUnit::new(self.shared.clone())))
    }
}

/// Unit of work over [`InMemoryLedgerStore`]
pub struct InMemoryUnit {
    shared: Arc<Shared>,
    open: bool,
    held: HashMap<AccountId, OwnedMutexGuard<()>>,
    new_accounts: BTreeMap<AccountId, Account>,
    deleted: HashSet<AccountId>,
    deltas: HashMap<AccountId, Amount>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
}

impl InMemoryUnit {
    fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            open: true,
            held: HashMap::new(),
            new_accounts: BTreeMap::new(),
            deleted: HashSet::new(),
            deltas: HashMap::new(),
            entries: Vec::new(),
            transfers: Vec::new(),
        }
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if !self.open {
            return Err(StoreError::UnitClosed);
        }
        if guard(&self.shared.faults)?.unavailable {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }

    fn check_conflict(&self, account_id: AccountId) -> Result<(), StoreError> {
        if guard(&self.shared.faults)?.conflict_on.contains(&account_id) {
            return Err(StoreError::SerializationConflict(format!(
                "account {} modified concurrently",
                account_id
            )));
        }
        Ok(())
    }

    /// Block until this unit owns the row lock of `account_id`
    async fn lock_row(&mut self, account_id: AccountId) -> Result<(), StoreError> {
        if self.held.contains_key(&account_id) {
            return Ok(());
        }
        let row_lock = guard(&self.shared.row_locks)?
            .entry(account_id)
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        trace!(account_id, "waiting for row lock");
        let owned = row_lock.lock_owned().await;
        self.held.insert(account_id, owned);
        Ok(())
    }

    /// Account as seen by this unit: committed row plus own pending changes
    fn visible_account(&self, account_id: AccountId) -> Result<Option<Account>, StoreError> {
        if self.deleted.contains(&account_id) {
            return Ok(None);
        }
        let base = match self.new_accounts.get(&account_id) {
            Some(a) => Some(a.clone()),
            None => guard(&self.shared.tables)?.accounts.get(&account_id).cloned(),
        };
        Ok(base.map(|mut a| {
            a.balance += self.deltas.get(&account_id).copied().unwrap_or(0);
            a
        }))
    }

    fn require_account(&self, account_id: AccountId) -> Result<Account, StoreError> {
        self.visible_account(account_id)?
            .ok_or_else(|| StoreError::account_not_found(account_id))
    }

    fn release(&mut self) {
        self.open = false;
        self.new_accounts.clear();
        self.deleted.clear();
        self.deltas.clear();
        self.entries.clear();
        self.transfers.clear();
        // dropping the owned guards releases the row locks
        self.held.clear();
    }

    /// Check the buffered writes against committed state, then apply them
    fn apply(&mut self, tables: &mut Tables) -> Result<(), StoreError> {
        let exists = |tables: &Tables, id: AccountId| {
            !self.deleted.contains(&id)
                && (self.new_accounts.contains_key(&id) || tables.accounts.contains_key(&id))
        };

        for a in self.new_accounts.values() {
            if tables
                .accounts
                .values()
                .any(|c| c.owner == a.owner && c.currency == a.currency)
            {
                return Err(duplicate_account(&a.owner, a.currency));
            }
        }
        for e in &self.entries {
            if !exists(tables, e.account_id) {
                return Err(StoreError::account_not_found(e.account_id));
            }
        }
        for t in &self.transfers {
            for id in [t.from_account_id, t.to_account_id] {
                if !exists(tables, id) {
                    return Err(StoreError::account_not_found(id));
                }
            }
        }
        for id in self.deltas.keys() {
            if !exists(tables, *id) {
                return Err(StoreError::account_not_found(*id));
            }
        }
        // Entries and transfers only take a reference, never the row lock
        for id in &self.deleted {
            if tables.references(*id) {
                return Err(referenced_account(*id));
            }
        }

        for id in &self.deleted {
            tables.accounts.remove(id);
        }
        tables.accounts.append(&mut self.new_accounts);
        for (id, delta) in self.deltas.drain() {
            if let Some(account) = tables.accounts.get_mut(&id) {
                account.balance += delta;
            }
        }
        tables.entries.append(&mut self.entries);
        tables.transfers.append(&mut self.transfers);
        Ok(())
    }
}

fn referenced_account(account_id: AccountId) -> StoreError {
    StoreError::Constraint(format!(
        "account {} is referenced by ledger rows",
        account_id
    ))
}

fn duplicate_account(owner: &str, currency: Currency) -> StoreError {
    StoreError::Constraint(format!(
        "account for owner {} in {} already exists",
        owner, currency
    ))
}

#[async_trait]
impl LedgerUnit for InMemoryUnit {
    async fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        let shared = self.shared.clone();
        let result = {
            let mut tables = guard(&shared.tables)?;
            self.apply(&mut tables)
        };
        debug!(
            ok = result.is_ok(),
            locks = self.held.len(),
            "memory unit commit"
        );
        self.release();
        result
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        if !self.open {
            return Err(StoreError::UnitClosed);
        }
        self.release();
        Ok(())
    }

    async fn insert_transfer(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Amount,
    ) -> Result<Transfer, StoreError> {
        self.ensure_open()?;
        self.require_account(from_account_id)?;
        self.require_account(to_account_id)?;
        if amount <= 0 {
            return Err(StoreError::Constraint(
                "transfer amount must be positive".to_string(),
            ));
        }
        let transfer = Transfer {
            id: self.shared.next_transfer_id.fetch_add(1, Ordering::SeqCst),
            from_account_id,
            to_account_id,
            amount,
            created_at: Utc::now(),
        };
        self.transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn insert_entry(
        &mut self,
        account_id: AccountId,
        amount: Amount,
    ) -> Result<Entry, StoreError> {
        self.ensure_open()?;
        self.require_account(account_id)?;
        let entry = Entry {
            id: self.shared.next_entry_id.fetch_add(1, Ordering::SeqCst),
            account_id,
            amount,
            created_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    async fn apply_balance_delta(
        &mut self,
        account_id: AccountId,
        delta: Amount,
    ) -> Result<Account, StoreError> {
        self.ensure_open()?;
        self.check_conflict(account_id)?;
        self.lock_row(account_id).await?;
        let mut account = self.require_account(account_id)?;
        account.balance = account.balance.checked_add(delta).ok_or_else(|| {
            StoreError::Constraint(format!("balance overflow on account {}", account_id))
        })?;
        *self.deltas.entry(account_id).or_insert(0) += delta;
        Ok(account)
    }

    async fn get_account(&mut self, account_id: AccountId) -> Result<Account, StoreError> {
        self.ensure_open()?;
        self.require_account(account_id)
    }

    async fn get_account_for_update(
        &mut self,
        account_id: AccountId,
    ) -> Result<Account, StoreError> {
        self.ensure_open()?;
        self.lock_row(account_id).await?;
        self.require_account(account_id)
    }

    async fn insert_account(
        &mut self,
        owner: &str,
        currency: Currency,
    ) -> Result<Account, StoreError> {
        self.ensure_open()?;
        let taken_in_unit = self
            .new_accounts
            .values()
            .any(|a| a.owner == owner && a.currency == currency);
        let taken_committed = guard(&self.shared.tables)?
            .accounts
            .values()
            .any(|a| a.owner == owner && a.currency == currency && !self.deleted.contains(&a.id));
        if taken_in_unit || taken_committed {
            return Err(duplicate_account(owner, currency));
        }
        let account = Account {
            id: self.shared.next_account_id.fetch_add(1, Ordering::SeqCst),
            owner: owner.to_string(),
            balance: 0,
            currency,
            created_at: Utc::now(),
        };
        self.new_accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn delete_account(&mut self, account_id: AccountId) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.lock_row(account_id).await?;
        self.require_account(account_id)?;

        let pending_refs = self.entries.iter().any(|e| e.account_id == account_id)
            || self
                .transfers
                .iter()
                .any(|t| t.from_account_id == account_id || t.to_account_id == account_id);
        if pending_refs || guard(&self.shared.tables)?.references(account_id) {
            return Err(referenced_account(account_id));
        }

        self.deltas.remove(&account_id);
        if self.new_accounts.remove(&account_id).is_none() {
            self.deleted.insert(account_id);
        }
        Ok(())
    }

    async fn list_accounts(
        &mut self,
        owner: &str,
        page: Page,
    ) -> Result<Vec<Account>, StoreError> {
        self.ensure_open()?;
        let mut ids: Vec<AccountId> = guard(&self.shared.tables)?
            .accounts
            .values()
            .filter(|a| a.owner == owner)
            .map(|a| a.id)
            .collect();
        ids.extend(
            self.new_accounts
                .values()
                .filter(|a| a.owner == owner)
                .map(|a| a.id),
        );
        ids.sort_unstable();

        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(a) = self.visible_account(id)? {
                rows.push(a);
            }
        }
        Ok(page.slice(&rows).to_vec())
    }

    async fn get_entry(&mut self, entry_id: EntryId) -> Result<Entry, StoreError> {
        self.ensure_open()?;
        if let Some(e) = self.entries.iter().find(|e| e.id == entry_id) {
            return Ok(e.clone());
        }
        guard(&self.shared.tables)?
            .entries
            .iter()
            .find(|e| e.id == entry_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("entry {}", entry_id)))
    }

    async fn list_entries(
        &mut self,
        account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Entry>, StoreError> {
        self.ensure_open()?;
        let mut rows: Vec<Entry> = guard(&self.shared.tables)?
            .entries
            .iter()
            .chain(self.entries.iter())
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.id);
        Ok(page.slice(&rows).to_vec())
    }

    async fn get_transfer(&mut self, transfer_id: TransferId) -> Result<Transfer, StoreError> {
        self.ensure_open()?;
        if let Some(t) = self.transfers.iter().find(|t| t.id == transfer_id) {
            return Ok(t.clone());
        }
        guard(&self.shared.tables)?
            .transfers
            .iter()
            .find(|t| t.id == transfer_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("transfer {}", transfer_id)))
    }

    async fn list_transfers(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        page: Page,
    ) -> Result<Vec<Transfer>, StoreError> {
        self.ensure_open()?;
        let mut rows: Vec<Transfer> = guard(&self.shared.tables)?
            .transfers
            .iter()
            .chain(self.transfers.iter())
            .filter(|t| t.from_account_id == from_account_id || t.to_account_id == to_account_id)
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.id);
        Ok(page.slice(&rows).to_vec())
    }
}
