//! Unconfirmed transaction pool: the contract this core consumes, and an
//! in-memory implementation.
//!
//! Transaction storage and gossip are owned by the pool/network layer, not
//! by this crate. The core needs exactly three things from a pool: iterate
//! the unconfirmed transactions of a chain in arrival order (the bundler's
//! selection order), answer whether a transaction's referenced-transaction
//! prerequisites are satisfiable, and accept a locally-validated
//! transaction for broadcast.
//!
//! ## Design
//!
//! [`MemoryPool`] keeps a `DashMap` keyed by transaction id for O(1)
//! lookups and a `parking_lot::RwLock<BTreeMap>` arrival index ordered by
//! an insertion sequence number. Readers (bundling passes, duplicate
//! scans) vastly outnumber writers, and the arrival index is the one
//! ordering the protocol actually guarantees.
//!
//! Expiration is a deadline, not a cancellation signal: an expired
//! transaction stays in the pool until [`MemoryPool::evict_expired`] — the
//! pool owner's periodic chore — removes it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::chain::{ChainId, PARENT_CHAIN};
use crate::transaction::{Transaction, TxId};

// ---------------------------------------------------------------------------
// PoolError
// ---------------------------------------------------------------------------

/// Errors returned by pool operations.
#[derive(Debug)]
pub enum PoolError {
    /// A transaction with the same id is already pooled.
    DuplicateTransaction { id: TxId },
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateTransaction { id } => {
                write!(f, "transaction {} already exists in pool", id)
            }
        }
    }
}

impl std::error::Error for PoolError {}

// ---------------------------------------------------------------------------
// UnconfirmedPool contract
// ---------------------------------------------------------------------------

/// The pool surface consumed by the bundler and the processing pipeline.
pub trait UnconfirmedPool: Send + Sync {
    /// Unconfirmed transactions belonging to `chain`, in arrival order.
    fn child_transactions(&self, chain: ChainId) -> Vec<Transaction>;

    /// Unconfirmed parent-chain transactions, in arrival order.
    fn parent_transactions(&self) -> Vec<Transaction>;

    /// Whether `tx`'s referenced-transaction prerequisite is satisfiable —
    /// the referenced transaction is confirmed or at least pooled. A
    /// transaction referencing nothing is always satisfiable.
    fn references_satisfied(&self, tx: &Transaction) -> bool;

    /// Accepts a locally-validated transaction into the pool and hands it
    /// to whatever broadcast machinery the implementation fronts.
    fn broadcast(&self, tx: Transaction) -> Result<(), PoolError>;
}

// ---------------------------------------------------------------------------
// MemoryPool
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct PoolEntry {
    transaction: Transaction,
    seq: u64,
}

/// In-memory [`UnconfirmedPool`] implementation.
pub struct MemoryPool {
    /// Pooled transactions indexed by id.
    entries: DashMap<TxId, PoolEntry>,

    /// Arrival-ordered index: insertion sequence → transaction id.
    arrival: RwLock<BTreeMap<u64, TxId>>,

    /// Monotonic insertion counter.
    next_seq: AtomicU64,

    /// Ids known to be confirmed, for reference satisfiability. Fed by
    /// the block-acceptance path via [`MemoryPool::note_confirmed`].
    confirmed: DashMap<TxId, ()>,
}

impl fmt::Debug for MemoryPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPool")
            .field("size", &self.entries.len())
            .finish()
    }
}

impl Default for MemoryPool {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            arrival: RwLock::new(BTreeMap::new()),
            next_seq: AtomicU64::new(0),
            confirmed: DashMap::new(),
        }
    }

    /// Adds a transaction. Rejects duplicates by id.
    pub fn add(&self, tx: Transaction) -> Result<(), PoolError> {
        if self.entries.contains_key(&tx.id) {
            return Err(PoolError::DuplicateTransaction { id: tx.id });
        }
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let id = tx.id;
        self.entries.insert(
            id,
            PoolEntry {
                transaction: tx,
                seq,
            },
        );
        self.arrival.write().insert(seq, id);
        Ok(())
    }

    /// Removes a transaction by id and returns it, or `None`.
    pub fn remove(&self, id: TxId) -> Option<Transaction> {
        let (_, entry) = self.entries.remove(&id)?;
        self.arrival.write().remove(&entry.seq);
        Some(entry.transaction)
    }

    /// Returns a clone of the pooled transaction, if present.
    pub fn get(&self, id: TxId) -> Option<Transaction> {
        self.entries.get(&id).map(|entry| entry.transaction.clone())
    }

    /// Whether the pool holds a transaction with this id.
    pub fn contains(&self, id: TxId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of pooled transactions.
    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records a transaction id as confirmed, making transactions that
    /// reference it satisfiable after it leaves the pool.
    pub fn note_confirmed(&self, id: TxId) {
        self.confirmed.insert(id, ());
    }

    /// Removes transactions whose expiration has passed. Returns how many
    /// were evicted. Intended for a periodic pool-maintenance task.
    pub fn evict_expired(&self, now: i64) -> usize {
        let expired: Vec<TxId> = self
            .entries
            .iter()
            .filter(|entry| entry.value().transaction.expiration() < now)
            .map(|entry| *entry.key())
            .collect();
        for id in &expired {
            self.remove(*id);
        }
        expired.len()
    }

    /// All pooled transactions of one chain, in arrival order.
    fn transactions_of(&self, chain: ChainId) -> Vec<Transaction> {
        let arrival = self.arrival.read();
        arrival
            .values()
            .filter_map(|id| self.entries.get(id))
            .filter(|entry| entry.transaction.chain == chain)
            .map(|entry| entry.transaction.clone())
            .collect()
    }
}

impl UnconfirmedPool for MemoryPool {
    fn child_transactions(&self, chain: ChainId) -> Vec<Transaction> {
        self.transactions_of(chain)
    }

    fn parent_transactions(&self) -> Vec<Transaction> {
        self.transactions_of(PARENT_CHAIN)
    }

    fn references_satisfied(&self, tx: &Transaction) -> bool {
        match tx.referenced_transaction {
            None => true,
            Some(id) => self.confirmed.contains_key(&id) || self.entries.contains_key(&id),
        }
    }

    fn broadcast(&self, tx: Transaction) -> Result<(), PoolError> {
        self.add(tx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
