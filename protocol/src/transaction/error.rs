//! The transaction error taxonomy.
//!
//! Three channels, deliberately asymmetric:
//!
//! - [`ValidationError`] — recoverable and caller-visible. The transaction
//!   is rejected and never enters the pool.
//! - Insufficient funds — not an error at all. `apply_unconfirmed` returns
//!   `false` and the transaction is dropped silently; double-spend
//!   attempts and submission races are routine, not exceptional.
//! - [`UndoError`] — fatal to the reorganization branch that hit it. Some
//!   kinds cannot be cleanly inverted; the caller must abandon the branch,
//!   not retry.
//!
//! Collapsing these into one channel would lose the distinction that
//! drives logging and retry behavior, so don't.

use thiserror::Error;

use super::types::{TransactionKind, TxId};
use crate::account::LedgerError;
use crate::chain::ChainId;

/// Rejection reasons surfaced to the submitter.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The feature this transaction uses activates at a later height.
    #[error("{feature} not yet enabled at height {height} (activates at {required_height})")]
    NotYetEnabled {
        feature: &'static str,
        height: u32,
        required_height: u32,
    },

    /// Structural or domain-rule violation.
    #[error("invalid {kind} transaction: {reason}")]
    NotValid {
        kind: TransactionKind,
        reason: String,
    },

    /// The kind is not valid on the transaction's chain.
    #[error("{kind} transactions are not valid on chain {chain}")]
    WrongChain {
        kind: TransactionKind,
        chain: ChainId,
    },

    /// The signature does not verify, or the sender id does not match the
    /// embedded public key.
    #[error("invalid signature on transaction {id}")]
    BadSignature { id: TxId },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::NotValid`].
    pub fn not_valid(kind: TransactionKind, reason: impl Into<String>) -> Self {
        Self::NotValid {
            kind,
            reason: reason.into(),
        }
    }
}

/// Failures while reversing a confirmed transaction.
#[derive(Debug, Error)]
pub enum UndoError {
    /// The kind's effect cannot be cleanly inverted. Fatal to the
    /// reorganization path that requested it — the caller must fall back
    /// to a different strategy (e.g. replay from a checkpoint), not retry.
    #[error("undo not supported for {kind} transaction {id}: {reason}")]
    NotSupported {
        id: TxId,
        kind: TransactionKind,
        reason: &'static str,
    },

    /// A balance adjustment overflowed while reversing.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_yet_enabled_message_names_heights() {
        let err = ValidationError::NotYetEnabled {
            feature: "asset exchange",
            height: 10,
            required_height: 111_111,
        };
        let message = err.to_string();
        assert!(message.contains("asset exchange"));
        assert!(message.contains("111111"));
    }

    #[test]
    fn undo_not_supported_names_the_transaction() {
        let err = UndoError::NotSupported {
            id: TxId::from_raw(42),
            kind: TransactionKind::AliasAssignment,
            reason: "previous alias state is unknown",
        };
        assert!(err.to_string().contains("42"));
        assert!(err.to_string().contains("AliasAssignment"));
    }
}
