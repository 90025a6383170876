//! Transfer Coordinator
//!
//! Executes one transfer as a single unit of work:
//!
//! ```text
//! BEGIN → transfer row → debit entry → credit entry
//!       → balance delta (lower id) → balance delta (higher id) → COMMIT
//! ```
//!
//! Any failure or cancellation before COMMIT rolls the whole unit back.
//!
//! # Deadlock freedom
//!
//! Balance deltas take row locks. They are always issued in ascending account
//! id order, so two transfers A→B and B→A both lock `min(A, B)` first and the
//! wait graph between in-flight transfers can never contain a cycle.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::error::TransferError;
use super::types::TransferRequest;
use crate::config::LedgerConfig;
use crate::models::TransferResult;
use crate::store::{LedgerStore, LedgerUnit, StoreError};

/// Transfer Coordinator - stateless apart from its store handle, safe to share
/// across any number of concurrent callers
pub struct TransferCoordinator {
    store: Arc<dyn LedgerStore>,
    default_timeout: Duration,
}

impl TransferCoordinator {
    /// Create a coordinator with the default ledger settings
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self::with_config(store, &LedgerConfig::default())
    }

    pub fn with_config(store: Arc<dyn LedgerStore>, config: &LedgerConfig) -> Self {
        Self {
            store,
            default_timeout: config.transfer_timeout(),
        }
    }

    /// Execute a transfer bounded by the configured transfer timeout
    pub async fn execute(&self, req: TransferRequest) -> Result<TransferResult, TransferError> {
        self.execute_transfer_with_timeout(req, self.default_timeout)
            .await
    }

    /// Execute a transfer, cancelling it if `timeout` elapses before commit
    pub async fn execute_transfer_with_timeout(
        &self,
        req: TransferRequest,
        timeout: Duration,
    ) -> Result<TransferResult, TransferError> {
        self.execute_transfer(req, tokio::time::sleep(timeout))
            .await
    }

    /// Execute a transfer as one all-or-nothing unit of work.
    ///
    /// `cancel` resolving before the unit reaches commit rolls the unit back
    /// and yields [`TransferError::Cancelled`]. Once commit is issued the call
    /// runs to completion.
    ///
    /// Every error leaves zero durable side effects. Nothing is retried here;
    /// see [`TransferError::is_retryable`].
    pub async fn execute_transfer<C>(
        &self,
        req: TransferRequest,
        cancel: C,
    ) -> Result<TransferResult, TransferError>
    where
        C: Future<Output = ()> + Send,
    {
        req.validate()?;
        tokio::pin!(cancel);

        debug!(
            from = req.from_account_id,
            to = req.to_account_id,
            amount = req.amount,
            store = self.store.name(),
            "Executing transfer"
        );

        let mut unit = tokio::select! {
            biased;
            _ = &mut cancel => {
                debug!(from = req.from_account_id, to = req.to_account_id, "Transfer cancelled before begin");
                return Err(TransferError::Cancelled);
            }
            unit = self.store.begin() => unit.map_err(|e| {
                error!(error = %e, "Failed to begin unit of work");
                TransferError::from(e)
            })?,
        };

        let outcome = tokio::select! {
            biased;
            _ = &mut cancel => Err(TransferError::Cancelled),
            result = Self::apply(unit.as_mut(), &req) => result.map_err(TransferError::from),
        };

        match outcome {
            Ok(result) => {
                if let Err(e) = unit.commit().await {
                    error!(
                        from = req.from_account_id,
                        to = req.to_account_id,
                        error = %e,
                        "Transfer commit failed"
                    );
                    return Err(e.into());
                }
                info!(
                    transfer_id = result.transfer.id,
                    from = req.from_account_id,
                    to = req.to_account_id,
                    amount = req.amount,
                    "Transfer committed"
                );
                Ok(result)
            }
            Err(e) => {
                if let Err(rb) = unit.rollback().await {
                    // the store discards the unit on drop regardless
                    warn!(error = %rb, "Rollback failed");
                }
                debug!(
                    from = req.from_account_id,
                    to = req.to_account_id,
                    code = e.code(),
                    error = %e,
                    "Transfer rolled back"
                );
                Err(e)
            }
        }
    }

    /// The four writes and two balance changes, inside `unit`
    async fn apply(
        unit: &mut dyn LedgerUnit,
        req: &TransferRequest,
    ) -> Result<TransferResult, StoreError> {
        let from = req.from_account_id;
        let to = req.to_account_id;

        let transfer = unit.insert_transfer(from, to, req.amount).await?;
        let from_entry = unit.insert_entry(from, -req.amount).await?;
        let to_entry = unit.insert_entry(to, req.amount).await?;

        let delta_for = |account_id| {
            if account_id == from {
                -req.amount
            } else {
                req.amount
            }
        };

        let [first, second] = req.lock_order();
        let first_account = unit.apply_balance_delta(first, delta_for(first)).await?;
        let second_account = unit.apply_balance_delta(second, delta_for(second)).await?;

        let (from_account, to_account) = if first == from {
            (first_account, second_account)
        } else {
            (second_account, first_account)
        };

        // Overdraft is the caller's policy, not the ledger's
        if from_account.balance < 0 {
            warn!(
                account_id = from,
                balance = from_account.balance,
                "Transfer leaves source balance negative"
            );
        }

        Ok(TransferResult {
            transfer,
            from_account,
            to_account,
            from_entry,
            to_entry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_types::{AccountId, Amount, Currency, EntryId, TransferId};
    use crate::models::{Account, Entry, Page, Transfer};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;

    /// Records every call; optionally fails one named operation
    #[derive(Default)]
    struct MockStore {
        ops: Arc<Mutex<Vec<String>>>,
        fail_on: Option<&'static str>,
        fail_begin: bool,
    }

    impl MockStore {
        fn failing_on(op: &'static str) -> Self {
            Self {
                fail_on: Some(op),
                ..Default::default()
            }
        }

        fn ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LedgerStore for MockStore {
        fn name(&self) -> &'static str {
            "mock"
        }

        async fn begin(&self) -> Result<Box<dyn LedgerUnit>, StoreError> {
            if self.fail_begin {
                return Err(StoreError::Unavailable("mock offline".into()));
            }
            self.ops.lock().unwrap().push("begin".into());
            Ok(Box::new(MockUnit {
                ops: self.ops.clone(),
                fail_on: self.fail_on,
            }))
        }
    }

    struct MockUnit {
        ops: Arc<Mutex<Vec<String>>>,
        fail_on: Option<&'static str>,
    }

    impl MockUnit {
        fn record(&self, op: &'static str, detail: String) -> Result<(), StoreError> {
            self.ops.lock().unwrap().push(format!("{}{}", op, detail));
            if self.fail_on == Some(op) {
                return Err(StoreError::SerializationConflict(format!("mock {}", op)));
            }
            Ok(())
        }

        fn account(id: AccountId, balance: Amount) -> Account {
            Account {
                id,
                owner: format!("owner{}", id),
                balance,
                currency: Currency::Usd,
                created_at: Utc::now(),
            }
        }
    }

    #[async_trait]
    impl LedgerUnit for MockUnit {
        async fn commit(&mut self) -> Result<(), StoreError> {
            self.record("commit", String::new())
        }

        async fn rollback(&mut self) -> Result<(), StoreError> {
            self.record("rollback", String::new())
        }

        async fn insert_transfer(
            &mut self,
            from_account_id: AccountId,
            to_account_id: AccountId,
            amount: Amount,
        ) -> Result<Transfer, StoreError> {
            self.record("transfer", format!(" {}->{}", from_account_id, to_account_id))?;
            Ok(Transfer {
                id: 1,
                from_account_id,
                to_account_id,
                amount,
                created_at: Utc::now(),
            })
        }

        async fn insert_entry(
            &mut self,
            account_id: AccountId,
            amount: Amount,
        ) -> Result<Entry, StoreError> {
            self.record("entry", format!(" {} {}", account_id, amount))?;
            Ok(Entry {
                id: 1,
                account_id,
                amount,
                created_at: Utc::now(),
            })
        }

        async fn apply_balance_delta(
            &mut self,
            account_id: AccountId,
            delta: Amount,
        ) -> Result<Account, StoreError> {
            self.record("delta", format!(" {} {}", account_id, delta))?;
            Ok(Self::account(account_id, delta))
        }

        async fn get_account(&mut self, account_id: AccountId) -> Result<Account, StoreError> {
            Ok(Self::account(account_id, 0))
        }

        async fn get_account_for_update(
            &mut self,
            account_id: AccountId,
        ) -> Result<Account, StoreError> {
            Ok(Self::account(account_id, 0))
        }

        async fn insert_account(
            &mut self,
            _owner: &str,
            _currency: Currency,
        ) -> Result<Account, StoreError> {
            Err(StoreError::Internal("unused".into()))
        }

        async fn delete_account(&mut self, _account_id: AccountId) -> Result<(), StoreError> {
            Err(StoreError::Internal("unused".into()))
        }

        async fn list_accounts(
            &mut self,
            _owner: &str,
            _page: Page,
        ) -> Result<Vec<Account>, StoreError> {
            Ok(vec![])
        }

        async fn get_entry(&mut self, entry_id: EntryId) -> Result<Entry, StoreError> {
            Err(StoreError::NotFound(format!("entry {}", entry_id)))
        }

        async fn list_entries(
            &mut self,
            _account_id: AccountId,
            _page: Page,
        ) -> Result<Vec<Entry>, StoreError> {
            Ok(vec![])
        }

        async fn get_transfer(&mut self, transfer_id: TransferId) -> Result<Transfer, StoreError> {
            Err(StoreError::NotFound(format!("transfer {}", transfer_id)))
        }

        async fn list_transfers(
            &mut self,
            _from_account_id: AccountId,
            _to_account_id: AccountId,
            _page: Page,
        ) -> Result<Vec<Transfer>, StoreError> {
            Ok(vec![])
        }
    }

    fn coordinator(store: Arc<MockStore>) -> TransferCoordinator {
        TransferCoordinator::new(store)
    }

    #[tokio::test]
    async fn test_steps_in_order_lower_id_first() {
        let store = Arc::new(MockStore::default());
        let result = coordinator(store.clone())
            .execute(TransferRequest::new(9, 4, 30))
            .await
            .unwrap();

        assert_eq!(
            store.ops(),
            vec![
                "begin",
                "transfer 9->4",
                "entry 9 -30",
                "entry 4 30",
                "delta 4 30",
                "delta 9 -30",
                "commit",
            ]
        );
        assert_eq!(result.from_account.id, 9);
        assert_eq!(result.to_account.id, 4);
        assert_eq!(result.from_entry.amount, -30);
        assert_eq!(result.to_entry.amount, 30);
    }

    #[tokio::test]
    async fn test_ascending_direction_locks_source_first() {
        let store = Arc::new(MockStore::default());
        coordinator(store.clone())
            .execute(TransferRequest::new(4, 9, 30))
            .await
            .unwrap();

        let deltas: Vec<String> = store
            .ops()
            .into_iter()
            .filter(|op| op.starts_with("delta"))
            .collect();
        assert_eq!(deltas, vec!["delta 4 -30", "delta 9 30"]);
    }

    #[tokio::test]
    async fn test_failure_at_any_step_rolls_back() {
        for op in ["transfer", "entry", "delta"] {
            let store = Arc::new(MockStore::failing_on(op));
            let err = coordinator(store.clone())
                .execute(TransferRequest::new(1, 2, 10))
                .await
                .unwrap_err();

            assert!(err.is_retryable(), "{}: {:?}", op, err);
            let ops = store.ops();
            assert_eq!(ops.last().map(String::as_str), Some("rollback"), "{}", op);
            assert!(!ops.iter().any(|o| o == "commit"), "{}", op);
        }
    }

    #[tokio::test]
    async fn test_commit_failure_is_returned() {
        let store = Arc::new(MockStore::failing_on("commit"));
        let err = coordinator(store.clone())
            .execute(TransferRequest::new(1, 2, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::SerializationConflict(_)));
        assert!(!store.ops().iter().any(|o| o == "rollback"));
    }

    #[tokio::test]
    async fn test_guards_open_no_unit() {
        let store = Arc::new(MockStore::default());
        let c = coordinator(store.clone());

        assert_eq!(
            c.execute(TransferRequest::new(1, 2, 0)).await.unwrap_err(),
            TransferError::InvalidAmount
        );
        assert_eq!(
            c.execute(TransferRequest::new(5, 5, 10)).await.unwrap_err(),
            TransferError::SameAccount
        );
        assert!(store.ops().is_empty());
    }

    #[tokio::test]
    async fn test_begin_failure_is_unavailable() {
        let store = Arc::new(MockStore {
            fail_begin: true,
            ..Default::default()
        });
        let err = coordinator(store)
            .execute(TransferRequest::new(1, 2, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_already_cancelled_never_begins() {
        let store = Arc::new(MockStore::default());
        let err = coordinator(store.clone())
            .execute_transfer(TransferRequest::new(1, 2, 10), std::future::ready(()))
            .await
            .unwrap_err();
        assert_eq!(err, TransferError::Cancelled);
        assert!(store.ops().is_empty());
    }
}
