//! Account management module
//!
//! Opening, looking up and deleting accounts, plus read access to the ledger
//! rows (entries and transfers) that the transfer coordinator writes.

pub mod error;
pub mod service;

pub use error::AccountError;
pub use service::AccountService;
