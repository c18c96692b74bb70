//! Asset-exchange hooks: issuance, transfers, and the order kinds.
//!
//! These are the holding-reservation exemplars of the protocol. An asset
//! transfer or an ask order reserves unconfirmed *holding* quantity; a bid
//! order reserves general unconfirmed balance worth `quantity * price`.
//! Either way the rule is the same as for money: reserve speculatively on
//! `apply_unconfirmed`, commit on `apply`, release exactly on undo.
//!
//! Orders live in the [`OrderHome`] until matched or cancelled. Matching
//! itself is outside this crate — the home is the book, not the engine.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::attachment::{
    AssetIssuancePayload, AssetTransferPayload, OrderCancellationPayload, OrderPlacementPayload,
};
use super::builder::Transaction;
use super::error::{UndoError, ValidationError};
use super::types::{DuplicateTracker, TransactionKind};
use crate::account::{AccountId, AccountLedger, HoldingId, LedgerError};
use crate::chain::ChainView;
use crate::config;

// ---------------------------------------------------------------------------
// AssetHome
// ---------------------------------------------------------------------------

/// An issued asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: HoldingId,
    pub issuer: AccountId,
    pub name: String,
    pub description: String,
    pub quantity: i64,
}

/// Registry of issued assets, keyed by holding id.
#[derive(Debug, Default)]
pub struct AssetHome {
    assets: RwLock<HashMap<HoldingId, Asset>>,
}

impl AssetHome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: HoldingId) -> Option<Asset> {
        self.assets.read().get(&id).cloned()
    }

    pub fn add(&self, asset: Asset) {
        self.assets.write().insert(asset.id, asset);
    }

    pub fn remove(&self, id: HoldingId) -> Option<Asset> {
        self.assets.write().remove(&id)
    }

    pub fn len(&self) -> usize {
        self.assets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.read().is_empty()
    }
}

// ---------------------------------------------------------------------------
// OrderHome
// ---------------------------------------------------------------------------

/// Which side of the book an order sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Ask,
    Bid,
}

/// An open order. `price` is in ledger sub-units per holding unit, so
/// `quantity * price` is directly a balance delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// The placement transaction's id.
    pub id: u64,
    pub account: AccountId,
    pub asset: HoldingId,
    pub quantity: i64,
    pub price: i64,
}

/// The order book's resting state: open asks and bids by order id.
#[derive(Debug, Default)]
pub struct OrderHome {
    asks: RwLock<HashMap<u64, Order>>,
    bids: RwLock<HashMap<u64, Order>>,
}

impl OrderHome {
    pub fn new() -> Self {
        Self::default()
    }

    fn side(&self, side: OrderSide) -> &RwLock<HashMap<u64, Order>> {
        match side {
            OrderSide::Ask => &self.asks,
            OrderSide::Bid => &self.bids,
        }
    }

    pub fn get(&self, side: OrderSide, id: u64) -> Option<Order> {
        self.side(side).read().get(&id).cloned()
    }

    pub fn add(&self, side: OrderSide, order: Order) {
        self.side(side).write().insert(order.id, order);
    }

    pub fn remove(&self, side: OrderSide, id: u64) -> Option<Order> {
        self.side(side).write().remove(&id)
    }

    /// Removes an order only if it still matches the expected asset and
    /// quantity. One lock scope — the check and the removal cannot be
    /// interleaved by a concurrent match.
    pub fn remove_expected(
        &self,
        side: OrderSide,
        id: u64,
        asset: HoldingId,
        quantity: i64,
    ) -> Option<Order> {
        let mut book = self.side(side).write();
        match book.get(&id) {
            Some(order) if order.asset == asset && order.quantity == quantity => book.remove(&id),
            _ => None,
        }
    }

    pub fn open_orders(&self, side: OrderSide) -> usize {
        self.side(side).read().len()
    }
}

// ---------------------------------------------------------------------------
// Shared validation
// ---------------------------------------------------------------------------

fn require_exchange_open(chain_view: &dyn ChainView) -> Result<(), ValidationError> {
    let height = chain_view.height();
    if height < config::ASSET_EXCHANGE_HEIGHT {
        return Err(ValidationError::NotYetEnabled {
            feature: "asset exchange",
            height,
            required_height: config::ASSET_EXCHANGE_HEIGHT,
        });
    }
    Ok(())
}

fn require_no_funds_moved(tx: &Transaction) -> Result<(), ValidationError> {
    if tx.amount != 0 {
        return Err(ValidationError::not_valid(
            tx.kind(),
            "exchange transactions must not move funds directly",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Asset issuance
// ---------------------------------------------------------------------------

pub(super) fn validate_issuance(
    tx: &Transaction,
    payload: &AssetIssuancePayload,
    chain_view: &dyn ChainView,
) -> Result<(), ValidationError> {
    require_exchange_open(chain_view)?;
    require_no_funds_moved(tx)?;
    if tx.recipient.is_some() {
        return Err(ValidationError::not_valid(
            tx.kind(),
            "issuance takes no recipient",
        ));
    }
    if tx.fee < config::ASSET_ISSUANCE_FEE {
        return Err(ValidationError::not_valid(
            tx.kind(),
            format!(
                "issuance fee {} below required {}",
                tx.fee,
                config::ASSET_ISSUANCE_FEE
            ),
        ));
    }
    let name_len = payload.name.len();
    if name_len < config::MIN_ASSET_NAME_LENGTH || name_len > config::MAX_ASSET_NAME_LENGTH {
        return Err(ValidationError::not_valid(
            tx.kind(),
            format!("asset name length {name_len} out of range"),
        ));
    }
    let normalized = payload.name.to_lowercase();
    if !normalized.chars().all(|c| config::NAME_ALPHABET.contains(c)) {
        return Err(ValidationError::not_valid(
            tx.kind(),
            format!("invalid asset name: {normalized}"),
        ));
    }
    if payload.description.len() > config::MAX_ASSET_DESCRIPTION_LENGTH {
        return Err(ValidationError::not_valid(
            tx.kind(),
            "asset description too long",
        ));
    }
    if payload.quantity <= 0 || payload.quantity > config::MAX_ASSET_QUANTITY {
        return Err(ValidationError::not_valid(
            tx.kind(),
            format!("asset quantity {} out of range", payload.quantity),
        ));
    }
    Ok(())
}

pub(super) fn apply_issuance(
    tx: &Transaction,
    payload: &AssetIssuancePayload,
    ledger: &dyn AccountLedger,
    assets: &AssetHome,
) -> Result<(), LedgerError> {
    let asset_id = HoldingId::from_raw(tx.id.raw());
    assets.add(Asset {
        id: asset_id,
        issuer: tx.sender,
        name: payload.name.clone(),
        description: payload.description.clone(),
        quantity: payload.quantity,
    });
    ledger.add_to_holding_and_unconfirmed(tx.sender, asset_id, payload.quantity)
}

pub(super) fn undo_issuance(
    tx: &Transaction,
    payload: &AssetIssuancePayload,
    ledger: &dyn AccountLedger,
    assets: &AssetHome,
) -> Result<(), UndoError> {
    let asset_id = HoldingId::from_raw(tx.id.raw());
    ledger.add_to_holding_and_unconfirmed(tx.sender, asset_id, -payload.quantity)?;
    assets.remove(asset_id);
    Ok(())
}

// ---------------------------------------------------------------------------
// Asset transfer
// ---------------------------------------------------------------------------

pub(super) fn validate_transfer(
    tx: &Transaction,
    payload: &AssetTransferPayload,
    chain_view: &dyn ChainView,
) -> Result<(), ValidationError> {
    require_exchange_open(chain_view)?;
    require_no_funds_moved(tx)?;
    if tx.recipient.is_none() {
        return Err(ValidationError::not_valid(
            tx.kind(),
            "transfer requires a recipient",
        ));
    }
    if payload.quantity <= 0 || payload.quantity > config::MAX_ASSET_QUANTITY {
        return Err(ValidationError::not_valid(
            tx.kind(),
            format!("transfer quantity {} out of range", payload.quantity),
        ));
    }
    Ok(())
}

pub(super) fn reserve_transfer(
    tx: &Transaction,
    payload: &AssetTransferPayload,
    ledger: &dyn AccountLedger,
) -> bool {
    reserve_holding(tx.sender, payload.asset, payload.quantity, ledger)
}

pub(super) fn release_transfer(
    tx: &Transaction,
    payload: &AssetTransferPayload,
    ledger: &dyn AccountLedger,
) -> Result<(), LedgerError> {
    ledger.add_to_unconfirmed_holding_balance(tx.sender, payload.asset, payload.quantity)
}

pub(super) fn apply_transfer(
    tx: &Transaction,
    payload: &AssetTransferPayload,
    ledger: &dyn AccountLedger,
) -> Result<(), LedgerError> {
    ledger.add_to_holding_balance(tx.sender, payload.asset, -payload.quantity)?;
    if let Some(recipient) = tx.recipient {
        ledger.add_to_holding_and_unconfirmed(recipient, payload.asset, payload.quantity)?;
    }
    Ok(())
}

pub(super) fn undo_transfer(
    tx: &Transaction,
    payload: &AssetTransferPayload,
    ledger: &dyn AccountLedger,
) -> Result<(), UndoError> {
    ledger.add_to_holding_balance(tx.sender, payload.asset, payload.quantity)?;
    if let Some(recipient) = tx.recipient {
        ledger.add_to_holding_and_unconfirmed(recipient, payload.asset, -payload.quantity)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Order placement
// ---------------------------------------------------------------------------

pub(super) fn validate_placement(
    tx: &Transaction,
    payload: &OrderPlacementPayload,
    chain_view: &dyn ChainView,
) -> Result<(), ValidationError> {
    require_exchange_open(chain_view)?;
    require_no_funds_moved(tx)?;
    if tx.recipient.is_some() {
        return Err(ValidationError::not_valid(
            tx.kind(),
            "order placement takes no recipient",
        ));
    }
    if payload.quantity <= 0 || payload.quantity > config::MAX_ASSET_QUANTITY {
        return Err(ValidationError::not_valid(
            tx.kind(),
            format!("order quantity {} out of range", payload.quantity),
        ));
    }
    if payload.price <= 0 {
        return Err(ValidationError::not_valid(
            tx.kind(),
            format!("order price {} out of range", payload.price),
        ));
    }
    // The order's total value must stay inside the scaled balance range,
    // otherwise the bid escrow arithmetic could overflow.
    let value = payload.quantity.checked_mul(payload.price);
    match value {
        Some(v) if v <= config::MAX_BALANCE * config::BALANCE_SCALE => Ok(()),
        _ => Err(ValidationError::not_valid(
            tx.kind(),
            "order value exceeds maximum balance",
        )),
    }
}

pub(super) fn reserve_ask(
    tx: &Transaction,
    payload: &OrderPlacementPayload,
    ledger: &dyn AccountLedger,
) -> bool {
    reserve_holding(tx.sender, payload.asset, payload.quantity, ledger)
}

pub(super) fn release_ask(
    tx: &Transaction,
    payload: &OrderPlacementPayload,
    ledger: &dyn AccountLedger,
) -> Result<(), LedgerError> {
    ledger.add_to_unconfirmed_holding_balance(tx.sender, payload.asset, payload.quantity)
}

pub(super) fn reserve_bid(
    tx: &Transaction,
    payload: &OrderPlacementPayload,
    ledger: &dyn AccountLedger,
) -> bool {
    // Bounded by validation: quantity * price cannot overflow here.
    let escrow = payload.quantity * payload.price;
    if ledger.unconfirmed_balance(tx.chain, tx.sender) < escrow {
        return false;
    }
    ledger
        .add_to_unconfirmed_balance(tx.chain, tx.sender, -escrow)
        .is_ok()
}

pub(super) fn release_bid(
    tx: &Transaction,
    payload: &OrderPlacementPayload,
    ledger: &dyn AccountLedger,
) -> Result<(), LedgerError> {
    ledger.add_to_unconfirmed_balance(tx.chain, tx.sender, payload.quantity * payload.price)
}

pub(super) fn apply_placement(
    tx: &Transaction,
    side: OrderSide,
    payload: &OrderPlacementPayload,
    orders: &OrderHome,
    assets: &AssetHome,
) {
    // An order on an unknown asset is a dead letter: the escrow stays
    // reserved until cancellation, but nothing enters the book.
    if assets.get(payload.asset).is_some() {
        orders.add(
            side,
            Order {
                id: tx.id.raw(),
                account: tx.sender,
                asset: payload.asset,
                quantity: payload.quantity,
                price: payload.price,
            },
        );
    }
}

pub(super) fn undo_placement(
    tx: &Transaction,
    side: OrderSide,
    payload: &OrderPlacementPayload,
    orders: &OrderHome,
) -> Result<(), UndoError> {
    match orders.remove_expected(side, tx.id.raw(), payload.asset, payload.quantity) {
        Some(_) => Ok(()),
        // Partially filled or already matched — the book can no longer
        // tell us what to restore, and nothing was touched.
        None => Err(UndoError::NotSupported {
            id: tx.id,
            kind: tx.kind(),
            reason: "order already filled",
        }),
    }
}

// ---------------------------------------------------------------------------
// Order cancellation
// ---------------------------------------------------------------------------

pub(super) fn validate_cancellation(
    tx: &Transaction,
    payload: &OrderCancellationPayload,
    chain_view: &dyn ChainView,
) -> Result<(), ValidationError> {
    require_exchange_open(chain_view)?;
    require_no_funds_moved(tx)?;
    if tx.recipient.is_some() {
        return Err(ValidationError::not_valid(
            tx.kind(),
            "order cancellation takes no recipient",
        ));
    }
    if payload.order == 0 {
        return Err(ValidationError::not_valid(
            tx.kind(),
            "cancellation names no order",
        ));
    }
    Ok(())
}

pub(super) fn apply_cancellation(
    tx: &Transaction,
    side: OrderSide,
    payload: &OrderCancellationPayload,
    ledger: &dyn AccountLedger,
    orders: &OrderHome,
) -> Result<(), LedgerError> {
    // A cancellation of an already-matched or never-known order is a
    // no-op, not an error — races with the matching engine are routine.
    if let Some(order) = orders.remove(side, payload.order) {
        match side {
            OrderSide::Ask => {
                ledger.add_to_unconfirmed_holding_balance(tx.sender, order.asset, order.quantity)?
            }
            OrderSide::Bid => ledger.add_to_unconfirmed_balance(
                tx.chain,
                tx.sender,
                order.quantity * order.price,
            )?,
        }
    }
    Ok(())
}

pub(super) fn undo_cancellation(tx: &Transaction) -> Result<(), UndoError> {
    Err(UndoError::NotSupported {
        id: tx.id,
        kind: tx.kind(),
        reason: "cancelled order state is unknown",
    })
}

pub(super) fn cancellation_is_duplicate(
    kind: TransactionKind,
    payload: &OrderCancellationPayload,
    tracker: &mut DuplicateTracker,
) -> bool {
    // Two cancellations of the same order in one batch conflict; ask and
    // bid books are separate namespaces.
    tracker.is_duplicate(kind, payload.order.to_string())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn reserve_holding(
    account: AccountId,
    holding: HoldingId,
    quantity: i64,
    ledger: &dyn AccountLedger,
) -> bool {
    if ledger.unconfirmed_holding_balance(account, holding) < quantity {
        return false;
    }
    ledger
        .add_to_unconfirmed_holding_balance(account, holding, -quantity)
        .is_ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: u64, quantity: i64, price: i64) -> Order {
        Order {
            id,
            account: AccountId::from_raw(1),
            asset: HoldingId::from_raw(9),
            quantity,
            price,
        }
    }

    #[test]
    fn order_home_sides_are_independent() {
        let home = OrderHome::new();
        home.add(OrderSide::Ask, order(1, 10, 5));
        home.add(OrderSide::Bid, order(1, 20, 7));

        assert_eq!(home.get(OrderSide::Ask, 1).unwrap().quantity, 10);
        assert_eq!(home.get(OrderSide::Bid, 1).unwrap().quantity, 20);

        home.remove(OrderSide::Ask, 1);
        assert!(home.get(OrderSide::Ask, 1).is_none());
        assert!(home.get(OrderSide::Bid, 1).is_some());
    }

    #[test]
    fn asset_home_add_get_remove() {
        let home = AssetHome::new();
        let asset = Asset {
            id: HoldingId::from_raw(42),
            issuer: AccountId::from_raw(1),
            name: "widget".into(),
            description: String::new(),
            quantity: 1_000,
        };
        home.add(asset.clone());
        assert_eq!(home.get(HoldingId::from_raw(42)), Some(asset));
        assert_eq!(home.len(), 1);

        home.remove(HoldingId::from_raw(42));
        assert!(home.is_empty());
    }

    #[test]
    fn reserve_holding_rejects_insufficient_quantity() {
        use crate::account::{AccountLedger, MemoryLedger};

        let ledger = MemoryLedger::new();
        let account = AccountId::from_raw(1);
        let asset = HoldingId::from_raw(9);
        ledger.seed_holding(account, asset, 5);

        assert!(!reserve_holding(account, asset, 6, &ledger));
        // The failed reservation must not have touched the balance.
        assert_eq!(ledger.unconfirmed_holding_balance(account, asset), 5);

        assert!(reserve_holding(account, asset, 5, &ledger));
        assert_eq!(ledger.unconfirmed_holding_balance(account, asset), 0);
    }
}
