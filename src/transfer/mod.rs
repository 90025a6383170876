//! Money transfers between two accounts
//!
//! # Flow
//!
//! ```text
//! TransferRequest ──validate──▶ TransferCoordinator ──unit of work──▶ LedgerStore
//!                                     │
//!                                     ├─ transfer row
//!                                     ├─ debit entry  (-amount, source)
//!                                     ├─ credit entry (+amount, target)
//!                                     └─ balance deltas, ascending account id
//! ```
//!
//! # Safety Invariants
//!
//! 1. **All-or-nothing**: a transfer either commits all five writes or none
//! 2. **Double entry**: the two entries of a transfer sum to zero
//! 3. **Lock order**: row locks are always taken lower account id first
//! 4. **No retry**: conflicts are surfaced to the caller, never retried here

pub mod coordinator;
pub mod error;
pub mod types;

pub use coordinator::TransferCoordinator;
pub use error::TransferError;
pub use types::TransferRequest;
