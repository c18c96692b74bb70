//! # Forging Engine
//!
//! Proof-of-stake leader election. For every locally-controlled signing
//! identity, the engine decides — deterministically, from the previous
//! block and the identity's stake — the earliest moment that identity is
//! entitled to produce the next block.
//!
//! ## The hit
//!
//! Each (identity, tip) pair yields a "hit": a 64-bit unsigned integer cut
//! from a SHA-256 digest of the previous block's generation signature.
//! Two derivations exist and both are consensus rules:
//!
//! - **below** `TRANSPARENT_FORGING_HEIGHT`: digest of the identity's
//!   Ed25519 signature over the generation signature;
//! - **at/after** it: digest of `generation_signature ‖ public_key`.
//!
//! The legacy branch can never be removed — validity of historical blocks
//! depends on reproducing it exactly.
//!
//! ## Eligibility
//!
//! With `elapsed` seconds past the tip timestamp, the identity may forge
//! exactly when `hit < base_target * effective_balance * elapsed`. The
//! comparison runs in `u128` — consensus arithmetic never sees a float
//! and never wraps. Hits are cached per identity and recomputed only when
//! the tip changes.
//!
//! ## Failure policy
//!
//! A failing identity is logged and skipped for the tick; the loop keeps
//! serving the other identities. Anything worse than that — a logic fault
//! below the expected error surface — panics and takes the process down.
//! For a consensus loop, crash beats corrupt state.

mod forging_loop;

pub use forging_loop::{ForgingLoop, ForgingLoopConfig};

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::account::{AccountId, AccountLedger};
use crate::chain::{BlockRef, ChainView};
use crate::config;
use crate::crypto::hash::{sha256, sha256_concat};
use crate::crypto::keys::Keypair;

// ---------------------------------------------------------------------------
// Events & collaborators
// ---------------------------------------------------------------------------

/// Fired whenever a new hit (and with it a new deadline estimate) is
/// computed for an identity. The deadline is informational — a status API
/// may surface it, consensus never reads it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationDeadline {
    pub account: AccountId,
    /// Estimated seconds until this identity could forge. May be negative
    /// when the identity is already past its slot.
    pub deadline_seconds: i64,
}

/// Block generation failed for an identity. One identity's failure is its
/// own problem — the tick moves on.
#[derive(Debug, Error)]
#[error("block generation failed: {0}")]
pub struct GenerationError(pub String);

/// The block-assembly side of the bargain, injected by the node. Assembly
/// itself (pulling from the pool, building, racing acceptance) is outside
/// this crate; the engine only says *now, with this key*.
pub trait BlockGenerator: Send + Sync {
    fn generate_block(&self, forger: &Keypair) -> Result<(), GenerationError>;
}

// ---------------------------------------------------------------------------
// Hit computation
// ---------------------------------------------------------------------------

/// Computes the hit for `keypair` against `tip`, selecting the derivation
/// branch by the tip's height.
pub fn compute_hit(keypair: &Keypair, tip: &BlockRef) -> u64 {
    let digest = if tip.height < config::TRANSPARENT_FORGING_HEIGHT {
        let signature = keypair.sign(&tip.generation_signature);
        sha256(signature.as_bytes())
    } else {
        sha256_concat(
            &tip.generation_signature,
            keypair.public_key().as_bytes(),
        )
    };
    let mut hit = [0u8; 8];
    hit.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(hit)
}

/// The eligibility predicate: true when the identity with this hit and
/// stake may forge `elapsed` seconds past the tip.
pub fn is_eligible(hit: u64, base_target: u64, effective_balance: i64, elapsed: i64) -> bool {
    if effective_balance <= 0 || elapsed <= 0 {
        return false;
    }
    let target = u128::from(base_target) * effective_balance as u128 * elapsed as u128;
    u128::from(hit) < target
}

// ---------------------------------------------------------------------------
// Forger state
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ForgerState {
    /// Tip id the cached hit was computed against.
    last_tip: Option<u64>,
    hit: u64,
    deadline: i64,
    /// Tip id generation was already requested for. The request is
    /// one-shot per tip.
    requested_tip: Option<u64>,
}

struct Forger {
    keypair: Keypair,
    state: Mutex<ForgerState>,
}

// ---------------------------------------------------------------------------
// ForgingEngine
// ---------------------------------------------------------------------------

/// Per-process forging roster and tick driver.
///
/// Identities are added and removed explicitly; there is no ambient
/// global set. A tick iterates a snapshot of the roster, so removing an
/// identity races safely with an in-flight tick — the in-flight pass
/// completes on its snapshot and cannot re-add the identity to anything.
pub struct ForgingEngine {
    ledger: Arc<dyn AccountLedger>,
    chain_view: Arc<dyn ChainView>,
    generator: Arc<dyn BlockGenerator>,
    forgers: DashMap<AccountId, Arc<Forger>>,
    deadline_events: broadcast::Sender<GenerationDeadline>,
}

impl ForgingEngine {
    pub fn new(
        ledger: Arc<dyn AccountLedger>,
        chain_view: Arc<dyn ChainView>,
        generator: Arc<dyn BlockGenerator>,
    ) -> Self {
        let (deadline_events, _) = broadcast::channel(64);
        Self {
            ledger,
            chain_view,
            generator,
            forgers: DashMap::new(),
            deadline_events,
        }
    }

    /// Subscribes to [`GenerationDeadline`] events.
    pub fn subscribe(&self) -> broadcast::Receiver<GenerationDeadline> {
        self.deadline_events.subscribe()
    }

    /// Adds a signing identity to the roster. Returns its account id.
    /// Re-adding an identity resets its cached state.
    pub fn start_forging(&self, keypair: Keypair) -> AccountId {
        let account = keypair.account_id();
        info!(%account, "forging started");
        self.forgers.insert(
            account,
            Arc::new(Forger {
                keypair,
                state: Mutex::new(ForgerState::default()),
            }),
        );
        account
    }

    /// Convenience wrapper deriving the keypair from a secret phrase —
    /// the form the operator configuration surface speaks.
    pub fn start_forging_with_phrase(&self, phrase: &str) -> AccountId {
        self.start_forging(Keypair::from_secret_phrase(phrase))
    }

    /// Removes an identity from the roster. Returns whether it was
    /// present. Cached hit state goes with it.
    pub fn stop_forging(&self, account: AccountId) -> bool {
        let removed = self.forgers.remove(&account).is_some();
        if removed {
            info!(%account, "forging stopped");
        }
        removed
    }

    /// Removes every identity.
    pub fn stop_all(&self) {
        self.forgers.clear();
    }

    pub fn is_forging(&self, account: AccountId) -> bool {
        self.forgers.contains_key(&account)
    }

    /// Accounts currently on the roster.
    pub fn forger_accounts(&self) -> Vec<AccountId> {
        self.forgers.iter().map(|entry| *entry.key()).collect()
    }

    /// Latest computed deadline estimate for an identity, if any.
    pub fn deadline(&self, account: AccountId) -> Option<i64> {
        let forger = self.forgers.get(&account)?;
        let state = forger.state.lock();
        state.last_tip.map(|_| state.deadline)
    }

    /// Runs one forging tick over the whole roster.
    ///
    /// Per-identity errors are logged and that identity is skipped for
    /// the tick; they never abort the shared loop. Panics are not caught
    /// — an unexpected logic fault is fatal to the process by design.
    pub fn tick(&self) {
        let tip = self.chain_view.tip();
        let now = self.chain_view.epoch_time();

        // Snapshot the roster: removal mid-tick must not disturb the pass.
        let forgers: Vec<(AccountId, Arc<Forger>)> = self
            .forgers
            .iter()
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();

        for (account, forger) in forgers {
            if let Err(err) = self.forge_one(account, &forger, &tip, now) {
                warn!(%account, %err, "forging tick failed for identity, skipping");
            }
        }
    }

    fn forge_one(
        &self,
        account: AccountId,
        forger: &Forger,
        tip: &BlockRef,
        now: i64,
    ) -> Result<(), GenerationError> {
        let effective_balance = self.ledger.effective_balance(account);
        if effective_balance <= 0 {
            // No stake, no slot. Not an error — just nothing to do.
            return Ok(());
        }

        let mut state = forger.state.lock();

        if state.last_tip != Some(tip.id) {
            let hit = compute_hit(&forger.keypair, tip);
            state.last_tip = Some(tip.id);
            state.hit = hit;

            let product = u128::from(tip.base_target) * effective_balance as u128;
            let total = if product == 0 {
                i64::MAX
            } else {
                (u128::from(hit) / product).min(i64::MAX as u128) as i64
            };
            state.deadline = total.saturating_sub(now - tip.timestamp);

            debug!(
                %account,
                hit,
                deadline = state.deadline,
                tip_height = tip.height,
                "hit recomputed"
            );
            // Nobody listening is fine; the event is informational.
            let _ = self.deadline_events.send(GenerationDeadline {
                account,
                deadline_seconds: state.deadline,
            });
        }

        let elapsed = now - tip.timestamp;
        if is_eligible(state.hit, tip.base_target, effective_balance, elapsed)
            && state.requested_tip != Some(tip.id)
        {
            state.requested_tip = Some(tip.id);
            info!(%account, elapsed, "identity eligible, requesting block generation");
            self.generator.generate_block(&forger.keypair)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
