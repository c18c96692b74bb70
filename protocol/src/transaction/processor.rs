//! The transaction lifecycle pipeline.
//!
//! [`TransactionProcessor`] is where the kind-agnostic half of the
//! protocol lives. Every kind's economic effect decomposes the same way:
//!
//! 1. A **generic** movement of `amount + fee` against the sender's
//!    general balance, identical for all kinds.
//! 2. A **kind-specific** effect — crediting a recipient, escrowing a
//!    holding, registering an alias — dispatched by exhaustive `match`.
//!
//! The wrapper guarantees atomicity of reservation: `apply_unconfirmed`
//! first deducts the generic total, then runs the kind-specific
//! reservation, and rolls the generic deduction back if that fails. A
//! transaction either fully reserves or has no effect.
//!
//! Failure channels are asymmetric by design (see [`super::error`]):
//! insufficient funds is a silent `false` — a routine double-spend race,
//! not worth a log line — while structural problems are typed errors.

use std::sync::Arc;

use tracing::{debug, error};

use super::attachment::Attachment;
use super::builder::Transaction;
use super::child_block;
use super::control;
use super::error::{UndoError, ValidationError};
use super::exchange::{self, AssetHome, OrderHome, OrderSide};
use super::messaging::{self, AliasHome};
use super::payment;
use super::types::{BlockTotals, DuplicateTracker};
use crate::account::{AccountId, AccountLedger, LedgerError};
use crate::chain::ChainView;
use crate::config;

// ---------------------------------------------------------------------------
// TransactionProcessor
// ---------------------------------------------------------------------------

/// Validates and applies transactions against the ledger and the
/// kind-specific state homes.
///
/// One processor serves the whole node. The ledger serializes per-account
/// mutation internally; the homes guard themselves; the processor adds no
/// locking of its own and can be called concurrently from many inbound
/// submissions.
pub struct TransactionProcessor {
    ledger: Arc<dyn AccountLedger>,
    chain_view: Arc<dyn ChainView>,
    aliases: AliasHome,
    assets: AssetHome,
    orders: OrderHome,
}

impl TransactionProcessor {
    /// Creates a processor with empty state homes.
    pub fn new(ledger: Arc<dyn AccountLedger>, chain_view: Arc<dyn ChainView>) -> Self {
        Self {
            ledger,
            chain_view,
            aliases: AliasHome::new(),
            assets: AssetHome::new(),
            orders: OrderHome::new(),
        }
    }

    /// The alias registry.
    pub fn aliases(&self) -> &AliasHome {
        &self.aliases
    }

    /// The asset registry.
    pub fn assets(&self) -> &AssetHome {
        &self.assets
    }

    /// The order book state.
    pub fn orders(&self) -> &OrderHome {
        &self.orders
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Validates a transaction against chain state. Pure: no side effects,
    /// no reservations.
    ///
    /// Checks, in order: chain placement, field ranges, the parent-chain
    /// fee floor, the signature, then the kind-specific rules (including
    /// feature activation heights, which fail with the distinguished
    /// [`ValidationError::NotYetEnabled`]).
    pub fn validate(&self, tx: &Transaction) -> Result<(), ValidationError> {
        let kind = tx.kind();
        if !kind.allowed_on(tx.chain) {
            return Err(ValidationError::WrongChain {
                kind,
                chain: tx.chain,
            });
        }
        if tx.amount < 0 || tx.fee < 0 {
            return Err(ValidationError::not_valid(kind, "negative amount or fee"));
        }
        if tx.amount > config::MAX_BALANCE {
            return Err(ValidationError::not_valid(
                kind,
                format!("amount {} out of range", tx.amount),
            ));
        }
        if tx.timestamp < 0 {
            return Err(ValidationError::not_valid(kind, "negative timestamp"));
        }

        let genesis_seed = tx.timestamp == 0 && tx.sender == AccountId::GENESIS;
        if !genesis_seed {
            if tx.deadline_minutes < config::MIN_DEADLINE_MINUTES
                || tx.deadline_minutes > config::MAX_DEADLINE_MINUTES
            {
                return Err(ValidationError::not_valid(
                    kind,
                    format!("deadline {} minutes out of range", tx.deadline_minutes),
                ));
            }
            if tx.chain.is_parent() && tx.fee < config::PARENT_MIN_FEE {
                return Err(ValidationError::not_valid(
                    kind,
                    format!("fee {} below parent-chain minimum", tx.fee),
                ));
            }
        }

        if !tx.verify_signature() {
            return Err(ValidationError::BadSignature { id: tx.id });
        }

        let chain_view = self.chain_view.as_ref();
        match &tx.attachment {
            Attachment::OrdinaryPayment => payment::validate(tx),
            Attachment::ArbitraryMessage(payload) => {
                messaging::validate_message(tx, payload, chain_view)
            }
            Attachment::AliasAssignment(payload) => {
                messaging::validate_alias(tx, payload, chain_view, &self.aliases)
            }
            Attachment::AssetIssuance(payload) => {
                exchange::validate_issuance(tx, payload, chain_view)
            }
            Attachment::AssetTransfer(payload) => {
                exchange::validate_transfer(tx, payload, chain_view)
            }
            Attachment::AskOrderPlacement(payload) | Attachment::BidOrderPlacement(payload) => {
                exchange::validate_placement(tx, payload, chain_view)
            }
            Attachment::AskOrderCancellation(payload)
            | Attachment::BidOrderCancellation(payload) => {
                exchange::validate_cancellation(tx, payload, chain_view)
            }
            Attachment::EffectiveBalanceLeasing(payload) => {
                control::validate(tx, payload, chain_view)
            }
            Attachment::ChildBlock(payload) => child_block::validate(tx, payload, chain_view),
        }
    }

    // -----------------------------------------------------------------------
    // Unconfirmed reservation
    // -----------------------------------------------------------------------

    /// Attempts to reserve the transaction's full economic cost against
    /// the sender's unconfirmed state.
    ///
    /// Returns `false` on insufficient funds — an expected outcome
    /// (double-spend attempt, submission race), signaled silently rather
    /// than raised. On success the reservation is complete: generic
    /// `amount + fee` plus whatever the kind escrows.
    ///
    /// The genesis account is exempt from the balance check for
    /// zero-timestamp transactions; that is how the initial supply enters.
    pub fn apply_unconfirmed(&self, tx: &Transaction) -> bool {
        let Some(total) = scaled_total(tx) else {
            return false;
        };
        let ledger = self.ledger.as_ref();

        let genesis_seed = tx.timestamp == 0 && tx.sender == AccountId::GENESIS;
        if !genesis_seed && ledger.unconfirmed_balance(tx.chain, tx.sender) < total {
            return false;
        }
        if let Err(err) = ledger.add_to_unconfirmed_balance(tx.chain, tx.sender, -total) {
            error!(tx_id = %tx.id, %err, "generic reservation failed");
            return false;
        }

        let reserved = match &tx.attachment {
            Attachment::OrdinaryPayment
            | Attachment::ArbitraryMessage(_)
            | Attachment::AliasAssignment(_)
            | Attachment::AssetIssuance(_)
            | Attachment::AskOrderCancellation(_)
            | Attachment::BidOrderCancellation(_)
            | Attachment::EffectiveBalanceLeasing(_)
            | Attachment::ChildBlock(_) => true,
            Attachment::AssetTransfer(payload) => exchange::reserve_transfer(tx, payload, ledger),
            Attachment::AskOrderPlacement(payload) => exchange::reserve_ask(tx, payload, ledger),
            Attachment::BidOrderPlacement(payload) => exchange::reserve_bid(tx, payload, ledger),
        };

        if !reserved {
            // Roll the generic deduction back: a transaction either fully
            // reserves or has no effect.
            if let Err(err) = ledger.add_to_unconfirmed_balance(tx.chain, tx.sender, total) {
                error!(tx_id = %tx.id, %err, "reservation rollback failed");
            }
            return false;
        }
        true
    }

    /// Releases the reservation made by [`Self::apply_unconfirmed`]. Must
    /// be its exact inverse.
    pub fn undo_unconfirmed(&self, tx: &Transaction) -> Result<(), LedgerError> {
        let total = scaled_total(tx).unwrap_or(0);
        let ledger = self.ledger.as_ref();
        ledger.add_to_unconfirmed_balance(tx.chain, tx.sender, total)?;
        match &tx.attachment {
            Attachment::AssetTransfer(payload) => exchange::release_transfer(tx, payload, ledger),
            Attachment::AskOrderPlacement(payload) => exchange::release_ask(tx, payload, ledger),
            Attachment::BidOrderPlacement(payload) => exchange::release_bid(tx, payload, ledger),
            _ => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Confirmed application
    // -----------------------------------------------------------------------

    /// Applies the transaction's confirmed effects. Called exactly once,
    /// when the transaction is included in a block.
    pub fn apply(&self, tx: &Transaction) -> Result<(), LedgerError> {
        let total = scaled_total(tx).unwrap_or(0);
        let ledger = self.ledger.as_ref();
        ledger.add_to_balance(tx.chain, tx.sender, -total)?;
        match &tx.attachment {
            Attachment::OrdinaryPayment => payment::apply(tx, ledger),
            Attachment::ArbitraryMessage(_) => Ok(()),
            Attachment::AliasAssignment(payload) => {
                messaging::apply_alias(tx, payload, &self.aliases);
                Ok(())
            }
            Attachment::AssetIssuance(payload) => {
                exchange::apply_issuance(tx, payload, ledger, &self.assets)
            }
            Attachment::AssetTransfer(payload) => exchange::apply_transfer(tx, payload, ledger),
            Attachment::AskOrderPlacement(payload) => {
                exchange::apply_placement(tx, OrderSide::Ask, payload, &self.orders, &self.assets);
                Ok(())
            }
            Attachment::BidOrderPlacement(payload) => {
                exchange::apply_placement(tx, OrderSide::Bid, payload, &self.orders, &self.assets);
                Ok(())
            }
            Attachment::AskOrderCancellation(payload) => {
                exchange::apply_cancellation(tx, OrderSide::Ask, payload, ledger, &self.orders)
            }
            Attachment::BidOrderCancellation(payload) => {
                exchange::apply_cancellation(tx, OrderSide::Bid, payload, ledger, &self.orders)
            }
            Attachment::EffectiveBalanceLeasing(payload) => {
                control::apply(tx, payload, ledger);
                Ok(())
            }
            // Settlement of the embedded child transactions is the block
            // acceptance path's concern, not the carrier's.
            Attachment::ChildBlock(_) => Ok(()),
        }
    }

    /// Reverses [`Self::apply`] during a chain reorganization.
    ///
    /// Kinds whose effect cannot be cleanly inverted fail with
    /// [`UndoError::NotSupported`] *before* any state is touched — the
    /// caller must treat that as fatal to the reorganization branch.
    pub fn undo(&self, tx: &Transaction) -> Result<(), UndoError> {
        let ledger = self.ledger.as_ref();

        // Kind-specific reversal runs first: the unsupported kinds must
        // bail out while everything is still untouched.
        match &tx.attachment {
            Attachment::OrdinaryPayment => payment::undo(tx, ledger)?,
            Attachment::ArbitraryMessage(_) => {}
            Attachment::AliasAssignment(_) => messaging::undo_alias(tx)?,
            Attachment::AssetIssuance(payload) => {
                exchange::undo_issuance(tx, payload, ledger, &self.assets)?
            }
            Attachment::AssetTransfer(payload) => exchange::undo_transfer(tx, payload, ledger)?,
            Attachment::AskOrderPlacement(payload) => {
                exchange::undo_placement(tx, OrderSide::Ask, payload, &self.orders)?
            }
            Attachment::BidOrderPlacement(payload) => {
                exchange::undo_placement(tx, OrderSide::Bid, payload, &self.orders)?
            }
            Attachment::AskOrderCancellation(_) | Attachment::BidOrderCancellation(_) => {
                exchange::undo_cancellation(tx)?
            }
            Attachment::EffectiveBalanceLeasing(_) => control::undo(tx)?,
            Attachment::ChildBlock(_) => {}
        }

        let total = scaled_total(tx).unwrap_or(0);
        ledger.add_to_balance(tx.chain, tx.sender, total)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Batch processing
    // -----------------------------------------------------------------------

    /// Batch-scoped conflict check, run before reservation. Returns `true`
    /// if `tx` conflicts with an earlier transaction recorded in the same
    /// tracker.
    pub fn is_duplicate(&self, tx: &Transaction, tracker: &mut DuplicateTracker) -> bool {
        match &tx.attachment {
            Attachment::AliasAssignment(payload) => {
                messaging::alias_is_duplicate(payload, tracker)
            }
            Attachment::AskOrderCancellation(payload)
            | Attachment::BidOrderCancellation(payload) => {
                exchange::cancellation_is_duplicate(tx.kind(), payload, tracker)
            }
            Attachment::ChildBlock(payload) => child_block::is_duplicate(payload, tracker),
            _ => false,
        }
    }

    /// Processes one unconfirmed batch: duplicate detection across the
    /// whole batch through a single shared tracker, then reservation per
    /// transaction. Returns, per input, whether it was accepted.
    ///
    /// No two conflicting transactions can both be accepted within one
    /// batch; across batches there is no duplicate memory.
    pub fn apply_unconfirmed_batch(&self, transactions: &[Transaction]) -> Vec<bool> {
        let mut tracker = DuplicateTracker::new();
        transactions
            .iter()
            .map(|tx| {
                if self.is_duplicate(tx, &mut tracker) {
                    debug!(tx_id = %tx.id, kind = %tx.kind(), "dropping duplicate in batch");
                    return false;
                }
                self.apply_unconfirmed(tx)
            })
            .collect()
    }

    /// Accumulates whole-block totals for the double-spend pre-check:
    /// per-sender spend plus per-kind holding movement, independent of
    /// per-transaction reservation order.
    pub fn block_totals(&self, transactions: &[Transaction]) -> BlockTotals {
        let mut totals = BlockTotals::new();
        for tx in transactions {
            totals.add_amount(tx.chain, tx.sender, scaled_total(tx).unwrap_or(i64::MAX));
            match &tx.attachment {
                Attachment::AssetTransfer(payload) => {
                    totals.add_holding_quantity(tx.sender, payload.asset, payload.quantity);
                }
                Attachment::AskOrderPlacement(payload) => {
                    totals.add_holding_quantity(tx.sender, payload.asset, payload.quantity);
                }
                Attachment::BidOrderPlacement(payload) => {
                    totals.add_amount(tx.chain, tx.sender, payload.quantity * payload.price);
                }
                _ => {}
            }
        }
        totals
    }
}

/// `(amount + fee) * BALANCE_SCALE`, or `None` if the inputs are out of
/// any validated range.
fn scaled_total(tx: &Transaction) -> Option<i64> {
    tx.amount
        .checked_add(tx.fee)
        .and_then(|sum| sum.checked_mul(config::BALANCE_SCALE))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
