//! # Account Module
//!
//! Account identity and the balance-ledger contract. The ledger itself is
//! an external collaborator — this crate mutates it only through the
//! additive/subtractive [`AccountLedger`] API and never reads back
//! intermediate computed totals. [`MemoryLedger`] is the in-process
//! reference implementation used by the tests and by single-node tooling.

pub mod ledger;

pub use ledger::{AccountLedger, LedgerError, MemoryLedger};

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config;

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// A 64-bit account identifier, derived from the low-order 8 bytes of the
/// SHA-256 digest of the account's public key.
///
/// Displayed as an unsigned decimal string — ids routinely have the high
/// bit set and printing them signed confuses everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(u64);

impl AccountId {
    /// The genesis account. Zero-timestamp transactions from this account
    /// bypass the unconfirmed-balance check when the initial supply is
    /// seeded.
    pub const GENESIS: AccountId = AccountId(config::GENESIS_ACCOUNT_ID);

    /// Wraps a raw id. Prefer deriving ids from public keys; this exists
    /// for deserialization boundaries and tests.
    pub const fn from_raw(raw: u64) -> Self {
        AccountId(raw)
    }

    /// Returns the raw 64-bit value.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// HoldingId
// ---------------------------------------------------------------------------

/// Identifier of a holding (an issued asset). Holdings are created by
/// asset-issuance transactions and take the issuing transaction's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HoldingId(u64);

impl HoldingId {
    pub const fn from_raw(raw: u64) -> Self {
        HoldingId(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HoldingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_displays_unsigned() {
        // High-bit-set ids must not print with a minus sign.
        let id = AccountId::from_raw(u64::MAX);
        assert_eq!(id.to_string(), "18446744073709551615");
    }

    #[test]
    fn genesis_id_matches_config() {
        assert_eq!(AccountId::GENESIS.raw(), config::GENESIS_ACCOUNT_ID);
    }

    #[test]
    fn account_id_serde_is_transparent() {
        let id = AccountId::from_raw(42);
        assert_eq!(serde_json::to_string(&id).unwrap(), "42");
        let back: AccountId = serde_json::from_str("42").unwrap();
        assert_eq!(back, id);
    }
}
