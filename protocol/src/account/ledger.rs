//! The balance-ledger contract and its in-memory reference implementation.
//!
//! Confirmed and unconfirmed balances are kept per (chain, account);
//! holding quantities per (account, holding). The unconfirmed balance is a
//! speculative reservation: it must never exceed what would be committable
//! if every currently-reserved transaction settled. That invariant is
//! maintained by the transaction protocol's reserve/commit/rollback hooks
//! — the ledger itself only adds and subtracts, loudly refusing overflow.
//!
//! Implementations must serialize mutations per account: the hooks are not
//! idempotent and must not interleave for the same account. [`MemoryLedger`]
//! takes the coarse route (one mutex around everything), which is correct
//! and plenty for a single node; a persistent implementation may shard.

use std::collections::HashMap;

use parking_lot::Mutex;
use thiserror::Error;

use super::{AccountId, HoldingId};
use crate::chain::{ChainId, PARENT_CHAIN};
use crate::config;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by ledger mutations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A delta would overflow the 64-bit balance range. If you're hitting
    /// this, someone is moving more money than can exist.
    #[error("balance overflow for account {account}: delta {delta}")]
    BalanceOverflow {
        /// The account whose balance was being adjusted.
        account: AccountId,
        /// The delta that caused the overflow.
        delta: i64,
    },
}

// ---------------------------------------------------------------------------
// AccountLedger contract
// ---------------------------------------------------------------------------

/// The additive/subtractive balance API consumed by the transaction
/// protocol, the forging engine, and the bundler.
///
/// All deltas are signed and denominated in ledger sub-units (see
/// `config::BALANCE_SCALE`). Overflow is an error, never a wrap.
pub trait AccountLedger: Send + Sync {
    /// Confirmed balance of `account` on `chain`, in sub-units.
    fn balance(&self, chain: ChainId, account: AccountId) -> i64;

    /// Unconfirmed (reservation-adjusted) balance, in sub-units.
    fn unconfirmed_balance(&self, chain: ChainId, account: AccountId) -> i64;

    /// Adjusts the confirmed balance by `delta`.
    fn add_to_balance(
        &self,
        chain: ChainId,
        account: AccountId,
        delta: i64,
    ) -> Result<(), LedgerError>;

    /// Adjusts the unconfirmed balance by `delta`.
    fn add_to_unconfirmed_balance(
        &self,
        chain: ChainId,
        account: AccountId,
        delta: i64,
    ) -> Result<(), LedgerError>;

    /// Adjusts confirmed and unconfirmed balance together. Used when a
    /// credit lands in both views atomically, e.g. a payment recipient.
    fn add_to_balance_and_unconfirmed(
        &self,
        chain: ChainId,
        account: AccountId,
        delta: i64,
    ) -> Result<(), LedgerError>;

    /// Confirmed quantity of `holding` owned by `account`.
    fn holding_balance(&self, account: AccountId, holding: HoldingId) -> i64;

    /// Unconfirmed (reservation-adjusted) holding quantity.
    fn unconfirmed_holding_balance(&self, account: AccountId, holding: HoldingId) -> i64;

    /// Adjusts the confirmed holding quantity by `delta`.
    fn add_to_holding_balance(
        &self,
        account: AccountId,
        holding: HoldingId,
        delta: i64,
    ) -> Result<(), LedgerError>;

    /// Adjusts the unconfirmed holding quantity by `delta`.
    fn add_to_unconfirmed_holding_balance(
        &self,
        account: AccountId,
        holding: HoldingId,
        delta: i64,
    ) -> Result<(), LedgerError>;

    /// Adjusts confirmed and unconfirmed holding quantity together.
    fn add_to_holding_and_unconfirmed(
        &self,
        account: AccountId,
        holding: HoldingId,
        delta: i64,
    ) -> Result<(), LedgerError>;

    /// The stake used in leader election, in transaction units (not
    /// sub-units). Lease-adjusted: an account that leased its balance out
    /// forges with zero; the lessee forges with the combined stake.
    fn effective_balance(&self, account: AccountId) -> i64;

    /// Leases `lessor`'s effective balance to `lessee` for `period`
    /// blocks.
    fn lease_effective_balance(&self, lessor: AccountId, lessee: AccountId, period: u16);
}

// ---------------------------------------------------------------------------
// MemoryLedger
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Clone, Copy)]
struct BalancePair {
    confirmed: i64,
    unconfirmed: i64,
}

#[derive(Debug, Default)]
struct LedgerInner {
    balances: HashMap<(ChainId, AccountId), BalancePair>,
    holdings: HashMap<(AccountId, HoldingId), BalancePair>,
    /// lessor → lessee. A lease shifts the lessor's stake to the lessee
    /// until it lapses; lapsing is block-driven and outside this crate.
    leases: HashMap<AccountId, AccountId>,
}

/// In-memory [`AccountLedger`] implementation.
///
/// One mutex guards all state. Per-account serialization falls out for
/// free; so does the batch-wide consistency the duplicate checker needs.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    inner: Mutex<LedgerInner>,
}

impl MemoryLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an account with a confirmed+unconfirmed balance, in
    /// sub-units. Genesis tooling and tests only — regular balance flow
    /// goes through the additive API.
    pub fn seed_balance(&self, chain: ChainId, account: AccountId, sub_units: i64) {
        let mut inner = self.inner.lock();
        inner.balances.insert(
            (chain, account),
            BalancePair {
                confirmed: sub_units,
                unconfirmed: sub_units,
            },
        );
    }

    /// Seeds a holding quantity, confirmed and unconfirmed.
    pub fn seed_holding(&self, account: AccountId, holding: HoldingId, quantity: i64) {
        let mut inner = self.inner.lock();
        inner.holdings.insert(
            (account, holding),
            BalancePair {
                confirmed: quantity,
                unconfirmed: quantity,
            },
        );
    }
}

fn checked_apply(
    slot: &mut i64,
    account: AccountId,
    delta: i64,
) -> Result<(), LedgerError> {
    *slot = slot
        .checked_add(delta)
        .ok_or(LedgerError::BalanceOverflow { account, delta })?;
    Ok(())
}

impl AccountLedger for MemoryLedger {
    fn balance(&self, chain: ChainId, account: AccountId) -> i64 {
        self.inner
            .lock()
            .balances
            .get(&(chain, account))
            .map(|pair| pair.confirmed)
            .unwrap_or(0)
    }

    fn unconfirmed_balance(&self, chain: ChainId, account: AccountId) -> i64 {
        self.inner
            .lock()
            .balances
            .get(&(chain, account))
            .map(|pair| pair.unconfirmed)
            .unwrap_or(0)
    }

    fn add_to_balance(
        &self,
        chain: ChainId,
        account: AccountId,
        delta: i64,
    ) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock();
        let pair = inner.balances.entry((chain, account)).or_default();
        checked_apply(&mut pair.confirmed, account, delta)
    }

    fn add_to_unconfirmed_balance(
        &self,
        chain: ChainId,
        account: AccountId,
        delta: i64,
    ) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock();
        let pair = inner.balances.entry((chain, account)).or_default();
        checked_apply(&mut pair.unconfirmed, account, delta)
    }

    fn add_to_balance_and_unconfirmed(
        &self,
        chain: ChainId,
        account: AccountId,
        delta: i64,
    ) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock();
        let pair = inner.balances.entry((chain, account)).or_default();
        checked_apply(&mut pair.confirmed, account, delta)?;
        checked_apply(&mut pair.unconfirmed, account, delta)
    }

    fn holding_balance(&self, account: AccountId, holding: HoldingId) -> i64 {
        self.inner
            .lock()
            .holdings
            .get(&(account, holding))
            .map(|pair| pair.confirmed)
            .unwrap_or(0)
    }

    fn unconfirmed_holding_balance(&self, account: AccountId, holding: HoldingId) -> i64 {
        self.inner
            .lock()
            .holdings
            .get(&(account, holding))
            .map(|pair| pair.unconfirmed)
            .unwrap_or(0)
    }

    fn add_to_holding_balance(
        &self,
        account: AccountId,
        holding: HoldingId,
        delta: i64,
    ) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock();
        let pair = inner.holdings.entry((account, holding)).or_default();
        checked_apply(&mut pair.confirmed, account, delta)
    }

    fn add_to_unconfirmed_holding_balance(
        &self,
        account: AccountId,
        holding: HoldingId,
        delta: i64,
    ) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock();
        let pair = inner.holdings.entry((account, holding)).or_default();
        checked_apply(&mut pair.unconfirmed, account, delta)
    }

    fn add_to_holding_and_unconfirmed(
        &self,
        account: AccountId,
        holding: HoldingId,
        delta: i64,
    ) -> Result<(), LedgerError> {
        let mut inner = self.inner.lock();
        let pair = inner.holdings.entry((account, holding)).or_default();
        checked_apply(&mut pair.confirmed, account, delta)?;
        checked_apply(&mut pair.unconfirmed, account, delta)
    }

    fn effective_balance(&self, account: AccountId) -> i64 {
        let inner = self.inner.lock();
        let own = if inner.leases.contains_key(&account) {
            0
        } else {
            inner
                .balances
                .get(&(PARENT_CHAIN, account))
                .map(|pair| pair.confirmed)
                .unwrap_or(0)
        };
        let leased_in: i64 = inner
            .leases
            .iter()
            .filter(|(_, lessee)| **lessee == account)
            .map(|(lessor, _)| {
                inner
                    .balances
                    .get(&(PARENT_CHAIN, *lessor))
                    .map(|pair| pair.confirmed)
                    .unwrap_or(0)
            })
            .sum();
        (own + leased_in) / config::BALANCE_SCALE
    }

    fn lease_effective_balance(&self, lessor: AccountId, lessee: AccountId, _period: u16) {
        // Lease expiry is driven by block heights outside this crate; the
        // reference ledger keeps only the current assignment.
        self.inner.lock().leases.insert(lessor, lessee);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::CHILD_CHAIN_SPARK;

    fn account(n: u64) -> AccountId {
        AccountId::from_raw(n)
    }

    #[test]
    fn unknown_account_has_zero_balances() {
        let ledger = MemoryLedger::new();
        assert_eq!(ledger.balance(PARENT_CHAIN, account(1)), 0);
        assert_eq!(ledger.unconfirmed_balance(PARENT_CHAIN, account(1)), 0);
        assert_eq!(
            ledger.holding_balance(account(1), HoldingId::from_raw(7)),
            0
        );
    }

    #[test]
    fn balances_are_chain_scoped() {
        let ledger = MemoryLedger::new();
        ledger.seed_balance(PARENT_CHAIN, account(1), 1_000);
        assert_eq!(ledger.balance(PARENT_CHAIN, account(1)), 1_000);
        assert_eq!(ledger.balance(CHILD_CHAIN_SPARK, account(1)), 0);
    }

    #[test]
    fn add_to_balance_accumulates() {
        let ledger = MemoryLedger::new();
        ledger.add_to_balance(PARENT_CHAIN, account(1), 500).unwrap();
        ledger.add_to_balance(PARENT_CHAIN, account(1), -200).unwrap();
        assert_eq!(ledger.balance(PARENT_CHAIN, account(1)), 300);
        // Confirmed-only adjustment leaves the unconfirmed view alone.
        assert_eq!(ledger.unconfirmed_balance(PARENT_CHAIN, account(1)), 0);
    }

    #[test]
    fn combined_add_touches_both_views() {
        let ledger = MemoryLedger::new();
        ledger
            .add_to_balance_and_unconfirmed(PARENT_CHAIN, account(1), 700)
            .unwrap();
        assert_eq!(ledger.balance(PARENT_CHAIN, account(1)), 700);
        assert_eq!(ledger.unconfirmed_balance(PARENT_CHAIN, account(1)), 700);
    }

    #[test]
    fn overflow_is_an_error_not_a_wrap() {
        let ledger = MemoryLedger::new();
        ledger
            .add_to_balance(PARENT_CHAIN, account(1), i64::MAX)
            .unwrap();
        let result = ledger.add_to_balance(PARENT_CHAIN, account(1), 1);
        assert!(matches!(
            result,
            Err(LedgerError::BalanceOverflow { delta: 1, .. })
        ));
        // The failed add must not have moved the balance.
        assert_eq!(ledger.balance(PARENT_CHAIN, account(1)), i64::MAX);
    }

    #[test]
    fn holding_balances_track_separately() {
        let ledger = MemoryLedger::new();
        let asset = HoldingId::from_raw(99);
        ledger.seed_holding(account(1), asset, 50);
        ledger
            .add_to_unconfirmed_holding_balance(account(1), asset, -20)
            .unwrap();
        assert_eq!(ledger.holding_balance(account(1), asset), 50);
        assert_eq!(ledger.unconfirmed_holding_balance(account(1), asset), 30);
    }

    #[test]
    fn effective_balance_is_in_transaction_units() {
        let ledger = MemoryLedger::new();
        ledger.seed_balance(PARENT_CHAIN, account(1), 1_000 * config::BALANCE_SCALE);
        assert_eq!(ledger.effective_balance(account(1)), 1_000);
    }

    #[test]
    fn lease_moves_stake_to_lessee() {
        let ledger = MemoryLedger::new();
        ledger.seed_balance(PARENT_CHAIN, account(1), 1_000 * config::BALANCE_SCALE);
        ledger.seed_balance(PARENT_CHAIN, account(2), 400 * config::BALANCE_SCALE);

        ledger.lease_effective_balance(account(1), account(2), 1440);

        assert_eq!(ledger.effective_balance(account(1)), 0);
        assert_eq!(ledger.effective_balance(account(2)), 1_400);
    }

    #[test]
    fn concurrent_adds_stay_consistent() {
        use std::sync::Arc;
        use std::thread;

        let ledger = Arc::new(MemoryLedger::new());
        let mut handles = vec![];
        for _ in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(thread::spawn(move || {
                for _ in 0..1_000 {
                    ledger
                        .add_to_unconfirmed_balance(PARENT_CHAIN, account(1), 1)
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().expect("thread panicked");
        }
        assert_eq!(ledger.unconfirmed_balance(PARENT_CHAIN, account(1)), 8_000);
    }
}
