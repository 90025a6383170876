//! Core types used throughout the ledger
//!
//! Identifiers map 1:1 onto PostgreSQL `BIGSERIAL` columns, amounts are
//! signed minor currency units (cents, pesewas, kobo).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Account ID - assigned by storage, immutable.
///
/// # Lock order
/// Balance updates inside one unit of work are always issued in ascending
/// `AccountId` order, so this type's ordering is the global lock order.
pub type AccountId = i64;

/// Entry ID - one ledger line
pub type EntryId = i64;

/// Transfer ID
pub type TransferId = i64;

/// Amount in minor currency units. Negative = debit, positive = credit.
pub type Amount = i64;

/// Currency code not in the supported set
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unsupported currency: {0}")]
pub struct UnsupportedCurrency(pub String);

/// Supported account currencies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    Usd,
    Ghs,
    Ngn,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Ghs, Currency::Ngn];

    /// ISO 4217 code as stored in `accounts.currency`
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Ghs => "GHS",
            Currency::Ngn => "NGN",
        }
    }

    /// Whether `code` names a supported currency (exact, upper-case match)
    pub fn is_supported(code: &str) -> bool {
        code.parse::<Currency>().is_ok()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = UnsupportedCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Currency::Usd),
            "GHS" => Ok(Currency::Ghs),
            "NGN" => Ok(Currency::Ngn),
            other => Err(UnsupportedCurrency(other.to_string())),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = UnsupportedCurrency;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(c: Currency) -> Self {
        c.code().to_string()
    }
}
