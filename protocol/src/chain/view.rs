//! The read-only chain view contract.
//!
//! Block storage, acceptance, and reorganization live outside this crate.
//! The core only ever needs three things from the chain: the current tip,
//! the current height, and the clock. Everything consensus-relevant about
//! the tip travels in one immutable [`BlockRef`] snapshot so that a
//! forging tick or a bundling pass works against a consistent view even
//! while a new block is being accepted concurrently.

use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config;

// ---------------------------------------------------------------------------
// BlockRef
// ---------------------------------------------------------------------------

/// Snapshot of a chain tip: everything the core reads from a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRef {
    /// Block id.
    pub id: u64,

    /// Height of this block.
    pub height: u32,

    /// Block timestamp, in epoch seconds.
    pub timestamp: i64,

    /// The verifiable-random seed for the next block's leader election.
    pub generation_signature: [u8; 32],

    /// Per-block difficulty parameter. Scales how quickly forging hits
    /// cross the eligibility threshold.
    pub base_target: u64,
}

impl BlockRef {
    /// A genesis tip at height 0 with the initial base target.
    pub fn genesis(generation_signature: [u8; 32]) -> Self {
        Self {
            id: 0,
            height: 0,
            timestamp: 0,
            generation_signature,
            base_target: config::INITIAL_BASE_TARGET,
        }
    }
}

// ---------------------------------------------------------------------------
// ChainView contract
// ---------------------------------------------------------------------------

/// Read access to the chain tip and the epoch clock.
///
/// The tip is read far more often than it is written: transaction
/// validation and the forging engine read it on every operation, block
/// acceptance (outside this crate) replaces it. Implementations should
/// favor cheap reads.
pub trait ChainView: Send + Sync {
    /// The most recently accepted block.
    fn tip(&self) -> BlockRef;

    /// Current chain height.
    fn height(&self) -> u32 {
        self.tip().height
    }

    /// Current time, in epoch seconds.
    fn epoch_time(&self) -> i64;
}

// ---------------------------------------------------------------------------
// ChainState
// ---------------------------------------------------------------------------

/// In-process [`ChainView`] implementation: an `RwLock`-guarded tip plus
/// a clock. With the default system clock it backs a running node; with
/// the manual clock, tests control time to the second — forging
/// eligibility and bundling deadlines are boundary-sensitive and flaky
/// tests help nobody.
#[derive(Debug)]
pub struct ChainState {
    tip: RwLock<BlockRef>,
    /// Manual epoch time. Negative means "use the system clock" — the
    /// manual clock only ever moves forward from zero.
    manual_time: AtomicI64,
}

impl ChainState {
    /// Creates a chain state on the system epoch clock.
    pub fn new(genesis: BlockRef) -> Self {
        Self {
            tip: RwLock::new(genesis),
            manual_time: AtomicI64::new(-1),
        }
    }

    /// Creates a chain state whose clock starts at `time` and only moves
    /// when told to.
    pub fn with_manual_clock(genesis: BlockRef, time: i64) -> Self {
        Self {
            tip: RwLock::new(genesis),
            manual_time: AtomicI64::new(time),
        }
    }

    /// Replaces the tip. Called by the (external) block-acceptance path.
    pub fn push_tip(&self, tip: BlockRef) {
        *self.tip.write() = tip;
    }

    /// Sets the manual clock. Panics in debug builds if the chain state
    /// was created on the system clock.
    pub fn set_time(&self, time: i64) {
        debug_assert!(self.manual_time.load(Ordering::Relaxed) >= 0);
        self.manual_time.store(time, Ordering::Relaxed);
    }

    /// Advances the manual clock by `seconds`.
    pub fn advance_time(&self, seconds: i64) {
        debug_assert!(self.manual_time.load(Ordering::Relaxed) >= 0);
        self.manual_time.fetch_add(seconds, Ordering::Relaxed);
    }
}

impl ChainView for ChainState {
    fn tip(&self) -> BlockRef {
        *self.tip.read()
    }

    fn epoch_time(&self) -> i64 {
        let manual = self.manual_time.load(Ordering::Relaxed);
        if manual >= 0 {
            manual
        } else {
            config::epoch_time_now()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn genesis() -> BlockRef {
        BlockRef::genesis([7u8; 32])
    }

    #[test]
    fn genesis_ref_has_initial_base_target() {
        let tip = genesis();
        assert_eq!(tip.height, 0);
        assert_eq!(tip.base_target, config::INITIAL_BASE_TARGET);
    }

    #[test]
    fn push_tip_replaces_snapshot() {
        let chain = ChainState::with_manual_clock(genesis(), 0);
        let next = BlockRef {
            id: 1,
            height: 1,
            timestamp: 60,
            generation_signature: [9u8; 32],
            base_target: config::INITIAL_BASE_TARGET,
        };
        chain.push_tip(next);
        assert_eq!(chain.tip(), next);
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn manual_clock_is_controllable() {
        let chain = ChainState::with_manual_clock(genesis(), 100);
        assert_eq!(chain.epoch_time(), 100);
        chain.advance_time(25);
        assert_eq!(chain.epoch_time(), 125);
        chain.set_time(500);
        assert_eq!(chain.epoch_time(), 500);
    }

    #[test]
    fn system_clock_moves() {
        let chain = ChainState::new(genesis());
        // Whatever the epoch offset is, two reads should not go backwards.
        let first = chain.epoch_time();
        let second = chain.epoch_time();
        assert!(second >= first);
    }
}
