//! Transaction construction via the builder pattern.
//!
//! The [`TransactionBuilder`] enforces a disciplined construction flow:
//! set the fields, hand `build()` the sender's keypair, and get back an
//! immutable signed [`Transaction`] whose id is derived from the signature
//! hash. There is no unsigned transaction type — a transaction without a
//! signature has no id, and a value without an id has no business in the
//! pipeline.

use serde::{Deserialize, Serialize};

use super::attachment::Attachment;
use super::types::{TransactionKind, TxId};
use crate::account::AccountId;
use crate::chain::ChainId;
use crate::config;
use crate::crypto::hash::sha256;
use crate::crypto::keys::{Keypair, PublicKey, Signature};

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// An immutable, signed ledger instruction.
///
/// Every value movement on either tier is one of these: exactly one chain,
/// exactly one attachment (which fixes the kind), an optional recipient
/// (`None` is the null-recipient sentinel used by order placements, alias
/// assignments, and other self-directed kinds), and a signature over the
/// canonical unsigned bytes.
///
/// The id is the low-order 8 bytes of `sha256(signed_bytes)` — it covers
/// the signature, so two differently-signed copies of the same intent are
/// different transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction id, derived from the signature hash.
    pub id: TxId,

    /// The chain this transaction belongs to.
    pub chain: ChainId,

    /// Sender account id, derived from `sender_public_key`.
    pub sender: AccountId,

    /// Sender's public key, embedded so validators never need a key
    /// lookup.
    pub sender_public_key: PublicKey,

    /// Recipient account, or `None` for self-directed kinds.
    pub recipient: Option<AccountId>,

    /// Transferred amount, in transaction units. Zero for every kind
    /// except ordinary payments.
    pub amount: i64,

    /// Offered fee, in the chain's units.
    pub fee: i64,

    /// Creation time, in epoch seconds.
    pub timestamp: i64,

    /// Lifetime, in minutes. The transaction expires at
    /// `timestamp + 60 * deadline_minutes`.
    pub deadline_minutes: u16,

    /// Optional prerequisite: this transaction must not confirm before
    /// the referenced one. Satisfiability is the pool's call.
    pub referenced_transaction: Option<TxId>,

    /// The kind-specific payload.
    pub attachment: Attachment,

    /// Ed25519 signature over [`Transaction::unsigned_bytes`].
    pub signature: Signature,
}

impl Transaction {
    /// The kind of this transaction, fixed by its attachment.
    pub fn kind(&self) -> TransactionKind {
        self.attachment.kind()
    }

    /// Expiration instant, in epoch seconds.
    pub fn expiration(&self) -> i64 {
        self.timestamp + 60 * i64::from(self.deadline_minutes)
    }

    /// Canonical byte representation covered by the signature.
    ///
    /// A deterministic concatenation of fields with fixed-width
    /// little-endian integers; the attachment rides as its JSON encoding.
    /// Wire-format compatibility is a non-goal — this format only has to
    /// be stable within one protocol version.
    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);

        buf.extend_from_slice(&self.chain.raw().to_le_bytes());

        let (type_code, subtype_code) = self.kind().code();
        buf.push(type_code);
        buf.push(subtype_code);

        buf.extend_from_slice(self.sender_public_key.as_bytes());

        match self.recipient {
            Some(recipient) => {
                buf.push(0x01);
                buf.extend_from_slice(&recipient.raw().to_le_bytes());
            }
            None => buf.push(0x00),
        }

        buf.extend_from_slice(&self.amount.to_le_bytes());
        buf.extend_from_slice(&self.fee.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.deadline_minutes.to_le_bytes());

        match self.referenced_transaction {
            Some(referenced) => {
                buf.push(0x01);
                buf.extend_from_slice(&referenced.raw().to_le_bytes());
            }
            None => buf.push(0x00),
        }

        // serde_json over our own types is deterministic: struct fields
        // serialize in declaration order.
        let attachment_bytes =
            serde_json::to_vec(&self.attachment).expect("attachment serialization is infallible");
        buf.extend_from_slice(&(attachment_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(&attachment_bytes);

        buf
    }

    /// The full 32-byte transaction hash: SHA-256 over the unsigned bytes
    /// followed by the signature.
    pub fn full_hash(&self) -> [u8; 32] {
        let mut bytes = self.unsigned_bytes();
        bytes.extend_from_slice(self.signature.as_bytes());
        sha256(&bytes)
    }

    /// Recomputes the id from the current contents.
    pub fn compute_id(&self) -> TxId {
        let hash = self.full_hash();
        let mut id = [0u8; 8];
        id.copy_from_slice(&hash[..8]);
        TxId::from_raw(u64::from_le_bytes(id))
    }

    /// Verifies the embedded signature and that the sender id matches the
    /// embedded public key.
    pub fn verify_signature(&self) -> bool {
        self.sender == self.sender_public_key.account_id()
            && self
                .sender_public_key
                .verify(&self.unsigned_bytes(), &self.signature)
    }

    /// Minimum settlement fee for a child-chain transaction at the given
    /// height, in parent-chain quanta. This is the floor a bundler's rate
    /// policy is measured against, and what a child-block transaction's
    /// fee must cover in sum.
    ///
    /// The schedule is height-dependent in general; the current one is
    /// flat, so `height` is accepted and ignored.
    pub fn minimum_fee(&self, _height: u32) -> i64 {
        let weight = match self.kind() {
            TransactionKind::OrdinaryPayment | TransactionKind::ArbitraryMessage => 1,
            TransactionKind::AliasAssignment
            | TransactionKind::AssetTransfer
            | TransactionKind::AskOrderPlacement
            | TransactionKind::BidOrderPlacement => 2,
            TransactionKind::AskOrderCancellation | TransactionKind::BidOrderCancellation => 1,
            TransactionKind::AssetIssuance => 100,
            // Parent-chain kinds have no bundler-sponsored floor; weight 1
            // keeps the sum total if one ever shows up in a sum.
            TransactionKind::EffectiveBalanceLeasing | TransactionKind::ChildBlock => 1,
        };
        weight * config::CHILD_BASE_FEE
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for signed [`Transaction`] values.
///
/// # Usage
///
/// ```
/// use meridian_protocol::chain::CHILD_CHAIN_SPARK;
/// use meridian_protocol::crypto::Keypair;
/// use meridian_protocol::transaction::{Attachment, TransactionBuilder};
///
/// let keypair = Keypair::from_secret_phrase("alice");
/// let recipient = Keypair::from_secret_phrase("bob").account_id();
/// let tx = TransactionBuilder::new(CHILD_CHAIN_SPARK, Attachment::OrdinaryPayment)
///     .recipient(recipient)
///     .amount(100)
///     .fee(10)
///     .timestamp(1_000)
///     .build(&keypair);
/// assert!(tx.verify_signature());
/// ```
pub struct TransactionBuilder {
    chain: ChainId,
    attachment: Attachment,
    recipient: Option<AccountId>,
    amount: i64,
    fee: i64,
    timestamp: Option<i64>,
    deadline_minutes: u16,
    referenced_transaction: Option<TxId>,
}

impl TransactionBuilder {
    /// Creates a builder for the given chain and attachment.
    ///
    /// Defaults: `amount` 0, `fee` 0, `deadline_minutes` 60, timestamp
    /// taken from the epoch clock at build time.
    pub fn new(chain: ChainId, attachment: Attachment) -> Self {
        Self {
            chain,
            attachment,
            recipient: None,
            amount: 0,
            fee: 0,
            timestamp: None,
            deadline_minutes: 60,
            referenced_transaction: None,
        }
    }

    /// Sets the recipient account.
    pub fn recipient(mut self, recipient: AccountId) -> Self {
        self.recipient = Some(recipient);
        self
    }

    /// Sets the transferred amount, in transaction units.
    pub fn amount(mut self, amount: i64) -> Self {
        self.amount = amount;
        self
    }

    /// Sets the offered fee, in the chain's units.
    pub fn fee(mut self, fee: i64) -> Self {
        self.fee = fee;
        self
    }

    /// Sets the creation timestamp explicitly (epoch seconds).
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Sets the deadline, in minutes.
    pub fn deadline(mut self, minutes: u16) -> Self {
        self.deadline_minutes = minutes;
        self
    }

    /// Names a prerequisite transaction.
    pub fn referenced_transaction(mut self, id: TxId) -> Self {
        self.referenced_transaction = Some(id);
        self
    }

    /// Signs with `keypair` and produces the finished transaction. The
    /// sender is the keypair's account; the id falls out of the signature
    /// hash.
    pub fn build(self, keypair: &Keypair) -> Transaction {
        let timestamp = self.timestamp.unwrap_or_else(config::epoch_time_now);
        let mut tx = Transaction {
            id: TxId::from_raw(0),
            chain: self.chain,
            sender: keypair.account_id(),
            sender_public_key: keypair.public_key(),
            recipient: self.recipient,
            amount: self.amount,
            fee: self.fee,
            timestamp,
            deadline_minutes: self.deadline_minutes,
            referenced_transaction: self.referenced_transaction,
            attachment: self.attachment,
            signature: Signature::from_bytes(Vec::new()),
        };
        tx.signature = keypair.sign(&tx.unsigned_bytes());
        tx.id = tx.compute_id();
        tx
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::CHILD_CHAIN_SPARK;

    fn sample_tx() -> Transaction {
        let keypair = Keypair::from_secret_phrase("builder-tests");
        let recipient = Keypair::from_secret_phrase("recipient").account_id();
        TransactionBuilder::new(CHILD_CHAIN_SPARK, Attachment::OrdinaryPayment)
            .recipient(recipient)
            .amount(1_000)
            .fee(10)
            .timestamp(5_000)
            .build(&keypair)
    }

    #[test]
    fn build_produces_deterministic_id() {
        // Ed25519 is deterministic, so identical fields + key yield an
        // identical signature and therefore an identical id.
        let a = sample_tx();
        let b = sample_tx();
        assert_eq!(a.id, b.id);
        assert_eq!(a.id, a.compute_id());
    }

    #[test]
    fn id_covers_the_signature() {
        let tx = sample_tx();
        let differently_signed = Transaction {
            signature: Keypair::from_secret_phrase("other").sign(&tx.unsigned_bytes()),
            ..tx.clone()
        };
        assert_ne!(tx.compute_id(), differently_signed.compute_id());
    }

    #[test]
    fn different_amount_different_id() {
        let keypair = Keypair::from_secret_phrase("builder-tests");
        let a = TransactionBuilder::new(CHILD_CHAIN_SPARK, Attachment::OrdinaryPayment)
            .amount(1)
            .timestamp(5_000)
            .build(&keypair);
        let b = TransactionBuilder::new(CHILD_CHAIN_SPARK, Attachment::OrdinaryPayment)
            .amount(2)
            .timestamp(5_000)
            .build(&keypair);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn signature_verifies_and_detects_tampering() {
        let tx = sample_tx();
        assert!(tx.verify_signature());

        let tampered = Transaction {
            amount: tx.amount + 1,
            ..tx
        };
        assert!(!tampered.verify_signature());
    }

    #[test]
    fn sender_must_match_public_key() {
        let mut tx = sample_tx();
        tx.sender = AccountId::from_raw(12345);
        assert!(!tx.verify_signature());
    }

    #[test]
    fn expiration_is_deadline_minutes_after_timestamp() {
        let tx = sample_tx();
        assert_eq!(tx.expiration(), 5_000 + 60 * 60);
    }

    #[test]
    fn signature_excluded_from_unsigned_bytes() {
        let tx = sample_tx();
        let before = tx.unsigned_bytes();
        let resigned = Transaction {
            signature: Signature::from_bytes(vec![0u8; 64]),
            ..tx
        };
        assert_eq!(before, resigned.unsigned_bytes());
    }

    #[test]
    fn referenced_transaction_changes_bytes() {
        let keypair = Keypair::from_secret_phrase("builder-tests");
        let plain = TransactionBuilder::new(CHILD_CHAIN_SPARK, Attachment::OrdinaryPayment)
            .timestamp(5_000)
            .build(&keypair);
        let referencing = TransactionBuilder::new(CHILD_CHAIN_SPARK, Attachment::OrdinaryPayment)
            .timestamp(5_000)
            .referenced_transaction(TxId::from_raw(77))
            .build(&keypair);
        assert_ne!(plain.id, referencing.id);
    }

    #[test]
    fn minimum_fee_scales_with_kind_weight() {
        let tx = sample_tx();
        assert_eq!(tx.minimum_fee(0), config::CHILD_BASE_FEE);

        let keypair = Keypair::from_secret_phrase("builder-tests");
        let alias = TransactionBuilder::new(
            CHILD_CHAIN_SPARK,
            Attachment::AliasAssignment(super::super::attachment::AliasAssignmentPayload {
                name: "bob".into(),
                uri: String::new(),
            }),
        )
        .timestamp(5_000)
        .build(&keypair);
        assert_eq!(alias.minimum_fee(0), 2 * config::CHILD_BASE_FEE);
    }

    #[test]
    fn transaction_json_roundtrip() {
        let tx = sample_tx();
        let json = serde_json::to_string(&tx).unwrap();
        let recovered: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, recovered);
    }
}
