//! # Transaction Module
//!
//! Construction, validation, and the full economic lifecycle of Meridian
//! transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs       — TransactionKind, TxId, DuplicateTracker, BlockTotals
//! attachment.rs  — Attachment payload variants, one per kind
//! builder.rs     — Transaction + TransactionBuilder (build = sign)
//! error.rs       — ValidationError / UndoError taxonomy
//! processor.rs   — generic reserve/commit/undo wrapper + kind dispatch
//! payment.rs     — ordinary payment hooks
//! messaging.rs   — arbitrary messages, alias assignments, AliasHome
//! exchange.rs    — assets and orders, AssetHome + OrderHome
//! control.rs     — effective-balance leasing hooks
//! child_block.rs — the parent-chain bundle carrier
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Build** — [`TransactionBuilder`] assembles and signs; the id falls
//!    out of the signature hash.
//! 2. **Validate** — [`TransactionProcessor::validate`]; rejected
//!    transactions never enter the pool.
//! 3. **Reserve** — [`TransactionProcessor::apply_unconfirmed`] moves the
//!    cost out of the sender's unconfirmed balance, or returns `false`.
//! 4. **Commit** — block inclusion calls [`TransactionProcessor::apply`].
//! 5. **Reverse** — a reorganization calls [`TransactionProcessor::undo`],
//!    which some kinds refuse (fatal to that branch by design).
//!
//! ## Design Decisions
//!
//! - The kind set is a closed enum dispatched by exhaustive `match`. A new
//!    kind that misses a hook is a compile error; an unknown wire code
//!    dies in [`TransactionKind::from_code`] before validation.
//! - Insufficient funds is a silent boolean, structural problems are typed
//!    errors. The asymmetry is deliberate and load-bearing.
//! - All amounts are `i64` in the smallest denomination. No floating point
//!    anywhere near money.

pub mod attachment;
pub mod builder;
pub mod child_block;
pub mod control;
pub mod error;
pub mod exchange;
pub mod messaging;
pub mod payment;
pub mod processor;
pub mod types;

pub use attachment::{
    AliasAssignmentPayload, AssetIssuancePayload, AssetTransferPayload, Attachment,
    ChildBlockPayload, LeasingPayload, MessagePayload, OrderCancellationPayload,
    OrderPlacementPayload,
};
pub use builder::{Transaction, TransactionBuilder};
pub use error::{UndoError, ValidationError};
pub use exchange::{Asset, AssetHome, Order, OrderHome, OrderSide};
pub use messaging::{Alias, AliasHome};
pub use processor::TransactionProcessor;
pub use types::{BlockTotals, DuplicateTracker, KindError, TransactionKind, TxId};
