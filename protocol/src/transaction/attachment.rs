//! Transaction attachments: the kind-specific payload variants.
//!
//! Every transaction carries exactly one attachment, and the attachment
//! determines the transaction's kind — there is no way to construct a
//! payment with an alias payload. Structural validation of the payloads
//! lives with the lifecycle hooks, not here: an `Attachment` value is
//! data, not yet a valid transaction.

use serde::{Deserialize, Serialize};

use super::builder::Transaction;
use super::types::TransactionKind;
use crate::account::HoldingId;
use crate::chain::ChainId;

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Opaque message payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    /// Raw message bytes. UTF-8 for human-readable memos, anything for
    /// machine consumers.
    pub message: Vec<u8>,
}

/// Alias name → URI binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasAssignmentPayload {
    /// Alias name. Compared case-insensitively; stored as submitted.
    pub name: String,
    /// Target URI. May be empty — an empty reassignment is how an alias
    /// is cleared.
    pub uri: String,
}

/// New-asset issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetIssuancePayload {
    pub name: String,
    pub description: String,
    /// Total quantity brought into existence, credited to the issuer.
    pub quantity: i64,
}

/// Holding transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetTransferPayload {
    pub asset: HoldingId,
    pub quantity: i64,
}

/// Ask/bid order placement. Price is in ledger sub-units per holding
/// unit, so `quantity * price` is directly a balance delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlacementPayload {
    pub asset: HoldingId,
    pub quantity: i64,
    pub price: i64,
}

/// Ask/bid order cancellation, naming the placement transaction's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancellationPayload {
    pub order: u64,
}

/// Effective-balance lease terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeasingPayload {
    /// Lease duration in blocks.
    pub period: u16,
}

/// A bundled batch of child-chain transactions.
///
/// The child transactions are embedded whole, not referenced by id: a
/// bundle must stay verifiable — fee floors, chain membership, signatures
/// — without consulting any pool, because by the time it is validated the
/// pool contents may have moved on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildBlockPayload {
    /// The child chain every bundled transaction belongs to.
    pub chain: ChainId,
    /// The bundled transactions, in selection order.
    pub transactions: Vec<Transaction>,
}

// ---------------------------------------------------------------------------
// Attachment
// ---------------------------------------------------------------------------

/// The kind-specific payload of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attachment {
    OrdinaryPayment,
    ArbitraryMessage(MessagePayload),
    AliasAssignment(AliasAssignmentPayload),
    AssetIssuance(AssetIssuancePayload),
    AssetTransfer(AssetTransferPayload),
    AskOrderPlacement(OrderPlacementPayload),
    BidOrderPlacement(OrderPlacementPayload),
    AskOrderCancellation(OrderCancellationPayload),
    BidOrderCancellation(OrderCancellationPayload),
    EffectiveBalanceLeasing(LeasingPayload),
    ChildBlock(ChildBlockPayload),
}

impl Attachment {
    /// The kind this payload belongs to. Attachment and kind are one —
    /// the mapping is total and exhaustively matched.
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::OrdinaryPayment => TransactionKind::OrdinaryPayment,
            Self::ArbitraryMessage(_) => TransactionKind::ArbitraryMessage,
            Self::AliasAssignment(_) => TransactionKind::AliasAssignment,
            Self::AssetIssuance(_) => TransactionKind::AssetIssuance,
            Self::AssetTransfer(_) => TransactionKind::AssetTransfer,
            Self::AskOrderPlacement(_) => TransactionKind::AskOrderPlacement,
            Self::BidOrderPlacement(_) => TransactionKind::BidOrderPlacement,
            Self::AskOrderCancellation(_) => TransactionKind::AskOrderCancellation,
            Self::BidOrderCancellation(_) => TransactionKind::BidOrderCancellation,
            Self::EffectiveBalanceLeasing(_) => TransactionKind::EffectiveBalanceLeasing,
            Self::ChildBlock(_) => TransactionKind::ChildBlock,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_kind_mapping() {
        assert_eq!(
            Attachment::OrdinaryPayment.kind(),
            TransactionKind::OrdinaryPayment
        );
        assert_eq!(
            Attachment::AliasAssignment(AliasAssignmentPayload {
                name: "bob".into(),
                uri: "https://example.org".into(),
            })
            .kind(),
            TransactionKind::AliasAssignment
        );
        assert_eq!(
            Attachment::AskOrderCancellation(OrderCancellationPayload { order: 1 }).kind(),
            TransactionKind::AskOrderCancellation
        );
    }

    #[test]
    fn attachment_serde_roundtrip() {
        let attachment = Attachment::AssetTransfer(AssetTransferPayload {
            asset: HoldingId::from_raw(42),
            quantity: 7,
        });
        let json = serde_json::to_string(&attachment).unwrap();
        let recovered: Attachment = serde_json::from_str(&json).unwrap();
        assert_eq!(attachment, recovered);
    }
}
