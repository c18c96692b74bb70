//! Account-control hooks: effective-balance leasing.
//!
//! Leasing moves an account's forging stake to another account without
//! moving any spendable funds. It is parent-chain only — stake lives where
//! the consensus does. Reversal is not supported: the previous lease
//! chain, if any, is no longer known once a new lease lands.

use super::attachment::LeasingPayload;
use super::builder::Transaction;
use super::error::{UndoError, ValidationError};
use crate::account::AccountLedger;
use crate::chain::ChainView;
use crate::config;

pub(super) fn validate(
    tx: &Transaction,
    payload: &LeasingPayload,
    chain_view: &dyn ChainView,
) -> Result<(), ValidationError> {
    let height = chain_view.height();
    if height < config::LEASING_HEIGHT {
        return Err(ValidationError::NotYetEnabled {
            feature: "effective balance leasing",
            height,
            required_height: config::LEASING_HEIGHT,
        });
    }
    if tx.amount != 0 {
        return Err(ValidationError::not_valid(
            tx.kind(),
            "lease must not move funds",
        ));
    }
    match tx.recipient {
        None => Err(ValidationError::not_valid(
            tx.kind(),
            "lease requires a lessee",
        )),
        Some(recipient) if recipient == tx.sender => Err(ValidationError::not_valid(
            tx.kind(),
            "cannot lease to self",
        )),
        Some(_) => {
            if payload.period < config::MIN_LEASING_PERIOD {
                return Err(ValidationError::not_valid(
                    tx.kind(),
                    format!(
                        "lease period {} below minimum {}",
                        payload.period,
                        config::MIN_LEASING_PERIOD
                    ),
                ));
            }
            Ok(())
        }
    }
}

pub(super) fn apply(tx: &Transaction, payload: &LeasingPayload, ledger: &dyn AccountLedger) {
    if let Some(lessee) = tx.recipient {
        ledger.lease_effective_balance(tx.sender, lessee, payload.period);
    }
}

pub(super) fn undo(tx: &Transaction) -> Result<(), UndoError> {
    Err(UndoError::NotSupported {
        id: tx.id,
        kind: tx.kind(),
        reason: "previous lease state is unknown",
    })
}
