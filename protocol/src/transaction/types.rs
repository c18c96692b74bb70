//! Core type definitions for Meridian transactions.
//!
//! These types form the vocabulary of the transaction protocol: the closed
//! kind enumeration, transaction ids, the batch-scoped duplicate tracker,
//! and the whole-block totals accumulator. They are intentionally small
//! and `Copy`-friendly where possible — this is the hot validation path.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::{AccountId, AccountLedger, HoldingId};
use crate::chain::ChainId;

// ---------------------------------------------------------------------------
// TxId
// ---------------------------------------------------------------------------

/// A 64-bit transaction identifier: the low-order 8 bytes of the SHA-256
/// digest of the signed transaction bytes, read little-endian.
///
/// Ids exist only for signed transactions — signing is what pins the
/// bytes down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(u64);

impl TxId {
    pub const fn from_raw(raw: u64) -> Self {
        TxId(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// TransactionKind
// ---------------------------------------------------------------------------

/// Errors raised when resolving a (type, subtype) code pair.
#[derive(Debug, Error)]
pub enum KindError {
    /// The code pair does not name any known kind. This is a configuration
    /// error on the submitting side, caught before validation — an unknown
    /// kind never reaches the lifecycle hooks.
    #[error("unknown transaction type code {type_code}:{subtype_code}")]
    UnknownCode { type_code: u8, subtype_code: u8 },
}

/// The closed set of transaction behaviors.
///
/// Each kind defines the complete economic effect of its transactions —
/// speculative reservation, commit, and reversal — through the lifecycle
/// hooks in [`super::processor`]. Dispatch is an exhaustive `match`: adding
/// a kind without wiring every hook is a compile error, and an unknown
/// wire code fails at [`TransactionKind::from_code`], never at runtime
/// dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Plain value transfer between two accounts.
    OrdinaryPayment,
    /// Zero-amount transaction carrying an opaque payload.
    ArbitraryMessage,
    /// Binds a name to a URI, owned by the sender.
    AliasAssignment,
    /// Creates a new holding, credited to the issuer.
    AssetIssuance,
    /// Moves holding quantity between accounts.
    AssetTransfer,
    /// Opens a sell order, escrowing the offered quantity.
    AskOrderPlacement,
    /// Opens a buy order, escrowing quantity times price.
    BidOrderPlacement,
    /// Cancels an open ask order, releasing its escrow.
    AskOrderCancellation,
    /// Cancels an open bid order, releasing its escrow.
    BidOrderCancellation,
    /// Leases the sender's forging stake to the recipient.
    EffectiveBalanceLeasing,
    /// Parent-chain carrier for a batch of child-chain transactions whose
    /// settlement fee it pays. Built by bundlers.
    ChildBlock,
}

impl TransactionKind {
    /// The (type, subtype) wire code of this kind.
    pub fn code(self) -> (u8, u8) {
        match self {
            Self::OrdinaryPayment => (0, 0),
            Self::ArbitraryMessage => (1, 0),
            Self::AliasAssignment => (1, 1),
            Self::AssetIssuance => (2, 0),
            Self::AssetTransfer => (2, 1),
            Self::AskOrderPlacement => (2, 2),
            Self::BidOrderPlacement => (2, 3),
            Self::AskOrderCancellation => (2, 4),
            Self::BidOrderCancellation => (2, 5),
            Self::EffectiveBalanceLeasing => (4, 0),
            Self::ChildBlock => (5, 0),
        }
    }

    /// Resolves a (type, subtype) code pair to a kind.
    pub fn from_code(type_code: u8, subtype_code: u8) -> Result<Self, KindError> {
        match (type_code, subtype_code) {
            (0, 0) => Ok(Self::OrdinaryPayment),
            (1, 0) => Ok(Self::ArbitraryMessage),
            (1, 1) => Ok(Self::AliasAssignment),
            (2, 0) => Ok(Self::AssetIssuance),
            (2, 1) => Ok(Self::AssetTransfer),
            (2, 2) => Ok(Self::AskOrderPlacement),
            (2, 3) => Ok(Self::BidOrderPlacement),
            (2, 4) => Ok(Self::AskOrderCancellation),
            (2, 5) => Ok(Self::BidOrderCancellation),
            (4, 0) => Ok(Self::EffectiveBalanceLeasing),
            (5, 0) => Ok(Self::ChildBlock),
            _ => Err(KindError::UnknownCode {
                type_code,
                subtype_code,
            }),
        }
    }

    /// Which tier this kind may appear on.
    ///
    /// Payments run anywhere. Feature kinds live on child chains, where a
    /// bundler sponsors their settlement. Stake operations and bundles are
    /// parent-chain matters.
    pub fn allowed_on(self, chain: ChainId) -> bool {
        match self {
            Self::OrdinaryPayment => chain.is_parent() || chain.is_child(),
            Self::ArbitraryMessage
            | Self::AliasAssignment
            | Self::AssetIssuance
            | Self::AssetTransfer
            | Self::AskOrderPlacement
            | Self::BidOrderPlacement
            | Self::AskOrderCancellation
            | Self::BidOrderCancellation => chain.is_child(),
            Self::EffectiveBalanceLeasing | Self::ChildBlock => chain.is_parent(),
        }
    }

    /// Short name for logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            Self::OrdinaryPayment => "OrdinaryPayment",
            Self::ArbitraryMessage => "ArbitraryMessage",
            Self::AliasAssignment => "AliasAssignment",
            Self::AssetIssuance => "AssetIssuance",
            Self::AssetTransfer => "AssetTransfer",
            Self::AskOrderPlacement => "AskOrderPlacement",
            Self::BidOrderPlacement => "BidOrderPlacement",
            Self::AskOrderCancellation => "AskOrderCancellation",
            Self::BidOrderCancellation => "BidOrderCancellation",
            Self::EffectiveBalanceLeasing => "EffectiveBalanceLeasing",
            Self::ChildBlock => "ChildBlock",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ---------------------------------------------------------------------------
// DuplicateTracker
// ---------------------------------------------------------------------------

/// Batch-scoped conflict detector.
///
/// One tracker covers exactly one unconfirmed batch: within the batch, no
/// two transactions may both pass if they conflict (two assignments of the
/// same alias, two cancellations of the same order). Across batches there
/// is no memory — a fresh tracker per batch, by construction.
#[derive(Debug, Default)]
pub struct DuplicateTracker {
    seen: HashMap<TransactionKind, HashSet<String>>,
}

impl DuplicateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `key` under `kind`. Returns `true` when the key was already
    /// present — i.e. the caller's transaction conflicts with an earlier
    /// one in this batch.
    pub fn is_duplicate(&mut self, kind: TransactionKind, key: impl Into<String>) -> bool {
        !self.seen.entry(kind).or_default().insert(key.into())
    }
}

// ---------------------------------------------------------------------------
// BlockTotals
// ---------------------------------------------------------------------------

/// Whole-block double-spend pre-check accumulator.
///
/// Unconfirmed reservation order is not block-inclusion order, so the
/// per-transaction balance checks are not enough: a block is only
/// acceptable if each sender's *total* spend and holding movement is
/// covered by confirmed state. The totals are accumulated per sender by
/// `TransactionProcessor::block_totals` and checked here.
#[derive(Debug, Default)]
pub struct BlockTotals {
    /// Accumulated spend (amount + fee, scaled) per (chain, sender).
    amounts: HashMap<(ChainId, AccountId), i64>,
    /// Accumulated outbound holding quantity per (sender, holding).
    holding_quantities: HashMap<(AccountId, HoldingId), i64>,
}

impl BlockTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `sub_units` to a sender's accumulated spend. Saturates rather
    /// than wraps — a saturated total can only make the check stricter.
    pub fn add_amount(&mut self, chain: ChainId, sender: AccountId, sub_units: i64) {
        let slot = self.amounts.entry((chain, sender)).or_insert(0);
        *slot = slot.saturating_add(sub_units);
    }

    /// Adds `quantity` to a sender's accumulated outbound holding total.
    pub fn add_holding_quantity(&mut self, sender: AccountId, holding: HoldingId, quantity: i64) {
        let slot = self.holding_quantities.entry((sender, holding)).or_insert(0);
        *slot = slot.saturating_add(quantity);
    }

    /// Returns the senders whose accumulated totals exceed their confirmed
    /// balances. An empty result means the block passes the pre-check.
    pub fn uncovered_senders(&self, ledger: &dyn AccountLedger) -> Vec<AccountId> {
        let mut uncovered: Vec<AccountId> = self
            .amounts
            .iter()
            .filter(|((chain, sender), total)| ledger.balance(*chain, *sender) < **total)
            .map(|((_, sender), _)| *sender)
            .chain(
                self.holding_quantities
                    .iter()
                    .filter(|((sender, holding), total)| {
                        ledger.holding_balance(*sender, *holding) < **total
                    })
                    .map(|((sender, _), _)| *sender),
            )
            .collect();
        uncovered.sort_unstable();
        uncovered.dedup();
        uncovered
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::MemoryLedger;
    use crate::chain::{CHILD_CHAIN_EMBER, CHILD_CHAIN_SPARK, PARENT_CHAIN};

    const ALL_KINDS: [TransactionKind; 11] = [
        TransactionKind::OrdinaryPayment,
        TransactionKind::ArbitraryMessage,
        TransactionKind::AliasAssignment,
        TransactionKind::AssetIssuance,
        TransactionKind::AssetTransfer,
        TransactionKind::AskOrderPlacement,
        TransactionKind::BidOrderPlacement,
        TransactionKind::AskOrderCancellation,
        TransactionKind::BidOrderCancellation,
        TransactionKind::EffectiveBalanceLeasing,
        TransactionKind::ChildBlock,
    ];

    #[test]
    fn code_roundtrip_for_every_kind() {
        for kind in ALL_KINDS {
            let (type_code, subtype_code) = kind.code();
            assert_eq!(
                TransactionKind::from_code(type_code, subtype_code).unwrap(),
                kind
            );
        }
    }

    #[test]
    fn codes_are_unique() {
        let codes: HashSet<(u8, u8)> = ALL_KINDS.iter().map(|kind| kind.code()).collect();
        assert_eq!(codes.len(), ALL_KINDS.len());
    }

    #[test]
    fn unknown_code_is_a_configuration_error() {
        let err = TransactionKind::from_code(0, 7).unwrap_err();
        assert!(matches!(
            err,
            KindError::UnknownCode {
                type_code: 0,
                subtype_code: 7
            }
        ));
        assert!(TransactionKind::from_code(9, 0).is_err());
    }

    #[test]
    fn chain_placement_rules() {
        use TransactionKind::*;
        assert!(OrdinaryPayment.allowed_on(PARENT_CHAIN));
        assert!(OrdinaryPayment.allowed_on(CHILD_CHAIN_SPARK));
        assert!(AliasAssignment.allowed_on(CHILD_CHAIN_SPARK));
        assert!(!AliasAssignment.allowed_on(PARENT_CHAIN));
        assert!(AskOrderPlacement.allowed_on(CHILD_CHAIN_EMBER));
        assert!(ChildBlock.allowed_on(PARENT_CHAIN));
        assert!(!ChildBlock.allowed_on(CHILD_CHAIN_SPARK));
        assert!(EffectiveBalanceLeasing.allowed_on(PARENT_CHAIN));
        assert!(!EffectiveBalanceLeasing.allowed_on(CHILD_CHAIN_EMBER));
    }

    #[test]
    fn duplicate_tracker_flags_second_occurrence() {
        let mut tracker = DuplicateTracker::new();
        assert!(!tracker.is_duplicate(TransactionKind::AliasAssignment, "bob"));
        assert!(tracker.is_duplicate(TransactionKind::AliasAssignment, "bob"));
    }

    #[test]
    fn duplicate_tracker_is_scoped_per_kind() {
        let mut tracker = DuplicateTracker::new();
        assert!(!tracker.is_duplicate(TransactionKind::AliasAssignment, "42"));
        // The same key under a different kind is not a conflict.
        assert!(!tracker.is_duplicate(TransactionKind::AskOrderCancellation, "42"));
    }

    #[test]
    fn fresh_tracker_has_no_memory() {
        let mut first = DuplicateTracker::new();
        assert!(!first.is_duplicate(TransactionKind::AliasAssignment, "bob"));
        // A new batch gets a new tracker — no cross-batch detection.
        let mut second = DuplicateTracker::new();
        assert!(!second.is_duplicate(TransactionKind::AliasAssignment, "bob"));
    }

    #[test]
    fn block_totals_flags_overspending_sender() {
        let ledger = MemoryLedger::new();
        let alice = AccountId::from_raw(1);
        let bob = AccountId::from_raw(2);
        ledger.seed_balance(CHILD_CHAIN_SPARK, alice, 500);
        ledger.seed_balance(CHILD_CHAIN_SPARK, bob, 500);

        let mut totals = BlockTotals::new();
        totals.add_amount(CHILD_CHAIN_SPARK, alice, 300);
        totals.add_amount(CHILD_CHAIN_SPARK, alice, 300); // 600 > 500
        totals.add_amount(CHILD_CHAIN_SPARK, bob, 500); // exactly covered

        assert_eq!(totals.uncovered_senders(&ledger), vec![alice]);
    }

    #[test]
    fn block_totals_checks_holdings_independently() {
        let ledger = MemoryLedger::new();
        let alice = AccountId::from_raw(1);
        let asset = HoldingId::from_raw(9);
        ledger.seed_balance(CHILD_CHAIN_EMBER, alice, 10_000);
        ledger.seed_holding(alice, asset, 10);

        let mut totals = BlockTotals::new();
        totals.add_amount(CHILD_CHAIN_EMBER, alice, 100);
        totals.add_holding_quantity(alice, asset, 15); // 15 > 10

        assert_eq!(totals.uncovered_senders(&ledger), vec![alice]);
    }
}
