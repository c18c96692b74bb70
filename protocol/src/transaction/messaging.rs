//! Messaging hooks: arbitrary messages and alias assignments.
//!
//! Both kinds move no value of their own — the generic wrapper handles
//! their fee and that is the whole economic story. What distinguishes them
//! is state: a message leaves none behind, while an alias assignment
//! writes into the [`AliasHome`], the name registry that maps
//! case-insensitive names to URIs.
//!
//! Alias assignment is the canonical duplicate-detection exemplar: two
//! assignments of the same name (in any case mix) must not both pass
//! within one unconfirmed batch. It is also the canonical
//! cannot-undo exemplar — once a name is reassigned, the previous owner
//! and URI are gone.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::attachment::{AliasAssignmentPayload, MessagePayload};
use super::builder::Transaction;
use super::error::{UndoError, ValidationError};
use super::types::{DuplicateTracker, TxId};
use crate::account::AccountId;
use crate::chain::ChainView;
use crate::config;

// ---------------------------------------------------------------------------
// AliasHome
// ---------------------------------------------------------------------------

/// A registered alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    /// The name as originally submitted (case preserved for display).
    pub name: String,
    /// Target URI; empty when the alias has been cleared.
    pub uri: String,
    /// Current owner.
    pub owner: AccountId,
    /// The assignment transaction that produced this state.
    pub assigned_by: TxId,
    /// Timestamp of the latest assignment.
    pub timestamp: i64,
}

/// The alias registry. Keys are lowercased names — `Bob` and `bob` are
/// the same alias.
#[derive(Debug, Default)]
pub struct AliasHome {
    aliases: RwLock<HashMap<String, Alias>>,
}

impl AliasHome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up an alias, case-insensitively.
    pub fn get(&self, name: &str) -> Option<Alias> {
        self.aliases.read().get(&name.to_lowercase()).cloned()
    }

    /// Registers or reassigns an alias.
    pub fn add_or_update(
        &self,
        owner: AccountId,
        assigned_by: TxId,
        name: &str,
        uri: &str,
        timestamp: i64,
    ) {
        self.aliases.write().insert(
            name.to_lowercase(),
            Alias {
                name: name.to_string(),
                uri: uri.to_string(),
                owner,
                assigned_by,
                timestamp,
            },
        );
    }

    /// Number of registered aliases.
    pub fn len(&self) -> usize {
        self.aliases.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.read().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Arbitrary message hooks
// ---------------------------------------------------------------------------

pub(super) fn validate_message(
    tx: &Transaction,
    payload: &MessagePayload,
    chain_view: &dyn ChainView,
) -> Result<(), ValidationError> {
    let height = chain_view.height();
    if height < config::ARBITRARY_MESSAGES_HEIGHT {
        return Err(ValidationError::NotYetEnabled {
            feature: "arbitrary messages",
            height,
            required_height: config::ARBITRARY_MESSAGES_HEIGHT,
        });
    }
    if tx.amount != 0 {
        return Err(ValidationError::not_valid(
            tx.kind(),
            "message must not move funds",
        ));
    }
    if payload.message.len() > config::MAX_MESSAGE_LENGTH {
        return Err(ValidationError::not_valid(
            tx.kind(),
            format!(
                "message length {} exceeds maximum {}",
                payload.message.len(),
                config::MAX_MESSAGE_LENGTH
            ),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Alias assignment hooks
// ---------------------------------------------------------------------------

pub(super) fn validate_alias(
    tx: &Transaction,
    payload: &AliasAssignmentPayload,
    chain_view: &dyn ChainView,
    aliases: &AliasHome,
) -> Result<(), ValidationError> {
    let height = chain_view.height();
    if height < config::ALIAS_SYSTEM_HEIGHT {
        return Err(ValidationError::NotYetEnabled {
            feature: "aliases",
            height,
            required_height: config::ALIAS_SYSTEM_HEIGHT,
        });
    }
    if tx.recipient.is_some() {
        return Err(ValidationError::not_valid(
            tx.kind(),
            "alias assignment takes no recipient",
        ));
    }
    if tx.amount != 0 {
        return Err(ValidationError::not_valid(
            tx.kind(),
            "alias assignment must not move funds",
        ));
    }
    if payload.name.is_empty() || payload.name.len() > config::MAX_ALIAS_LENGTH {
        return Err(ValidationError::not_valid(
            tx.kind(),
            format!("alias name length {} out of range", payload.name.len()),
        ));
    }
    if payload.uri.len() > config::MAX_ALIAS_URI_LENGTH {
        return Err(ValidationError::not_valid(
            tx.kind(),
            format!("alias URI length {} out of range", payload.uri.len()),
        ));
    }
    let normalized = payload.name.to_lowercase();
    if !normalized.chars().all(|c| config::NAME_ALPHABET.contains(c)) {
        return Err(ValidationError::not_valid(
            tx.kind(),
            format!("invalid alias name: {normalized}"),
        ));
    }
    if let Some(existing) = aliases.get(&normalized) {
        if existing.owner != tx.sender {
            return Err(ValidationError::not_valid(
                tx.kind(),
                format!("alias already owned by another account: {normalized}"),
            ));
        }
    }
    Ok(())
}

pub(super) fn apply_alias(
    tx: &Transaction,
    payload: &AliasAssignmentPayload,
    aliases: &AliasHome,
) {
    aliases.add_or_update(tx.sender, tx.id, &payload.name, &payload.uri, tx.timestamp);
}

pub(super) fn undo_alias(tx: &Transaction) -> Result<(), UndoError> {
    // Whether the alias existed before, who owned it, and what it pointed
    // at are all gone once the new assignment lands.
    Err(UndoError::NotSupported {
        id: tx.id,
        kind: tx.kind(),
        reason: "previous alias state is unknown",
    })
}

pub(super) fn alias_is_duplicate(
    payload: &AliasAssignmentPayload,
    tracker: &mut DuplicateTracker,
) -> bool {
    tracker.is_duplicate(
        super::types::TransactionKind::AliasAssignment,
        payload.name.to_lowercase(),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn account(n: u64) -> AccountId {
        AccountId::from_raw(n)
    }

    #[test]
    fn alias_lookup_is_case_insensitive() {
        let home = AliasHome::new();
        home.add_or_update(account(1), TxId::from_raw(10), "BobsShop", "https://bob.example", 5);

        let hit = home.get("bobsshop").unwrap();
        assert_eq!(hit.name, "BobsShop");
        assert_eq!(hit.owner, account(1));
        assert!(home.get("BOBSSHOP").is_some());
        assert!(home.get("alice").is_none());
    }

    #[test]
    fn reassignment_replaces_uri_and_keeps_one_entry() {
        let home = AliasHome::new();
        home.add_or_update(account(1), TxId::from_raw(10), "shop", "https://old.example", 5);
        home.add_or_update(account(1), TxId::from_raw(11), "SHOP", "https://new.example", 9);

        assert_eq!(home.len(), 1);
        let alias = home.get("shop").unwrap();
        assert_eq!(alias.uri, "https://new.example");
        assert_eq!(alias.assigned_by, TxId::from_raw(11));
    }

    #[test]
    fn empty_home_reports_empty() {
        let home = AliasHome::new();
        assert!(home.is_empty());
        home.add_or_update(account(1), TxId::from_raw(1), "a", "", 0);
        assert!(!home.is_empty());
    }
}
