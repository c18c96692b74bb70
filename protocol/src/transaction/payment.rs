//! Ordinary payment hooks.
//!
//! The simplest kind: the generic wrapper already moves `amount + fee`
//! out of the sender, so all that is left here is crediting the recipient
//! — confirmed and unconfirmed together, atomically, because a recipient
//! may spend incoming funds in the same block they arrive.

use super::builder::Transaction;
use super::error::ValidationError;
use crate::account::{AccountLedger, LedgerError};
use crate::config;

pub(super) fn validate(tx: &Transaction) -> Result<(), ValidationError> {
    if tx.amount <= 0 || tx.amount >= config::MAX_BALANCE {
        return Err(ValidationError::not_valid(
            tx.kind(),
            format!("amount {} out of range", tx.amount),
        ));
    }
    if tx.recipient.is_none() {
        return Err(ValidationError::not_valid(
            tx.kind(),
            "payment requires a recipient",
        ));
    }
    Ok(())
}

pub(super) fn apply(tx: &Transaction, ledger: &dyn AccountLedger) -> Result<(), LedgerError> {
    if let Some(recipient) = tx.recipient {
        ledger.add_to_balance_and_unconfirmed(
            tx.chain,
            recipient,
            tx.amount * config::BALANCE_SCALE,
        )?;
    }
    Ok(())
}

pub(super) fn undo(tx: &Transaction, ledger: &dyn AccountLedger) -> Result<(), LedgerError> {
    if let Some(recipient) = tx.recipient {
        ledger.add_to_balance_and_unconfirmed(
            tx.chain,
            recipient,
            -tx.amount * config::BALANCE_SCALE,
        )?;
    }
    Ok(())
}
