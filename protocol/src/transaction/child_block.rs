//! Child-block hooks: the parent-chain carrier for bundled child-chain
//! transactions.
//!
//! A child-block transaction pays, out of its own parent-chain fee, the
//! settlement of every child transaction it embeds. Validation is
//! self-contained on purpose — the embedded transactions are verified
//! against the fee schedule and each other, never against any pool, so a
//! bundle that was valid when built can be re-checked at any later point
//! (it may have stopped being valid, e.g. after a reorganization changed
//! the height and with it the fee floors).
//!
//! Settlement of the embedded transactions happens at block acceptance,
//! outside this crate. Here the bundle is just a transaction like any
//! other: its fee reserves and commits through the generic wrapper.

use super::attachment::ChildBlockPayload;
use super::builder::Transaction;
use super::error::ValidationError;
use super::types::{DuplicateTracker, TransactionKind};
use crate::chain::ChainView;
use crate::config;

pub(super) fn validate(
    tx: &Transaction,
    payload: &ChildBlockPayload,
    chain_view: &dyn ChainView,
) -> Result<(), ValidationError> {
    if tx.amount != 0 {
        return Err(ValidationError::not_valid(
            tx.kind(),
            "child block must not move funds",
        ));
    }
    if tx.recipient.is_some() {
        return Err(ValidationError::not_valid(
            tx.kind(),
            "child block takes no recipient",
        ));
    }
    if !payload.chain.is_child() {
        return Err(ValidationError::not_valid(
            tx.kind(),
            format!("{} is not a child chain", payload.chain),
        ));
    }
    if payload.transactions.is_empty() {
        return Err(ValidationError::not_valid(tx.kind(), "empty child block"));
    }
    if payload.transactions.len() > config::MAX_CHILD_TRANSACTIONS {
        return Err(ValidationError::not_valid(
            tx.kind(),
            format!(
                "{} child transactions exceeds maximum {}",
                payload.transactions.len(),
                config::MAX_CHILD_TRANSACTIONS
            ),
        ));
    }

    let height = chain_view.height();
    let mut required_fee: i64 = 0;
    for child in &payload.transactions {
        if child.chain != payload.chain {
            return Err(ValidationError::not_valid(
                tx.kind(),
                format!(
                    "bundled transaction {} belongs to {} not {}",
                    child.id, child.chain, payload.chain
                ),
            ));
        }
        if child.kind() == TransactionKind::ChildBlock {
            return Err(ValidationError::not_valid(
                tx.kind(),
                "child blocks cannot nest",
            ));
        }
        if !child.verify_signature() {
            return Err(ValidationError::BadSignature { id: child.id });
        }
        required_fee = required_fee.saturating_add(child.minimum_fee(height));
    }

    if tx.fee < required_fee {
        return Err(ValidationError::not_valid(
            tx.kind(),
            format!(
                "fee {} does not cover required settlement total {}",
                tx.fee, required_fee
            ),
        ));
    }
    Ok(())
}

/// One child block per child chain per batch: two bundles for the same
/// chain in one unconfirmed batch conflict, whoever bundled them.
pub(super) fn is_duplicate(payload: &ChildBlockPayload, tracker: &mut DuplicateTracker) -> bool {
    tracker.is_duplicate(TransactionKind::ChildBlock, payload.chain.raw().to_string())
}
