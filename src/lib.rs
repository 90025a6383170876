//! simple_ledger - double-entry money transfers between accounts
//!
//! # Modules
//!
//! - [`core_types`] - Ids, amounts and the supported currencies
//! - [`models`] - Account, Entry and Transfer records
//! - [`store`] - Persistence port with PostgreSQL and in-memory adapters
//! - [`transfer`] - Transfer coordinator (one all-or-nothing unit per transfer)
//! - [`account`] - Account administration and ledger queries
//! - [`config`] - YAML configuration
//! - [`logging`] - tracing subscriber setup
//! - [`db`] - PostgreSQL connection pool

// Core types - must be first!
pub mod core_types;
pub mod models;

pub mod account;
pub mod config;
pub mod db;
pub mod logging;
pub mod store;
pub mod transfer;

// Convenient re-exports at crate root
pub use account::{AccountError, AccountService};
pub use core_types::{AccountId, Amount, Currency, EntryId, TransferId};
pub use models::{Account, Entry, Page, Transfer, TransferResult};
pub use store::{InMemoryLedgerStore, LedgerStore, LedgerUnit, PgLedgerStore, StoreError};
pub use transfer::{TransferCoordinator, TransferError, TransferRequest};
