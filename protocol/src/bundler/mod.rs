//! # Bundler
//!
//! Cross-chain fee aggregation: a bundler watches a child chain's
//! unconfirmed transactions and wraps the ones that meet its rate policy
//! into parent-chain child-block transactions, paying their settlement fee
//! out of its own pocket (plus a configurable overpay, which is its
//! compensation for the service).
//!
//! ## Economics
//!
//! Three knobs per bundler, all exact integer arithmetic:
//!
//! - `min_rate` — child quanta per parent coin. A child transaction is
//!   admitted only when `child_fee * ONE_COIN >= min_rate * min_fee`,
//!   compared in 128-bit integers. No floating point: rate comparisons
//!   are consensus-adjacent and must be deterministic everywhere.
//! - `fee_cap` — a ceiling on the total parent-chain fees this bundler
//!   will commit across all of its not-yet-confirmed bundles. Zero means
//!   uncapped. The committed counter accumulates monotonically for the
//!   lifetime of the configuration; reconfiguring the bundler is the only
//!   reset.
//! - `overpay_rate` — parent quanta added per parent coin of minimum fee:
//!   `overpay(f) = f + overpay_rate * f / ONE_COIN`, checked arithmetic.
//!   Overflow aborts the bundling pass loudly; it never wraps.
//!
//! ## Duplicate suppression
//!
//! Before emitting, a bundler scans the unconfirmed parent-chain
//! transactions for an equivalent bundle: same bundling account, same
//! cardinality, same member-id set (order-independent), and still passing
//! validation. A stale bundle that no longer validates — fee floors moved
//! under it after a reorganization — does not count and gets superseded.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::account::{AccountId, AccountLedger};
use crate::chain::{ChainId, ChainView, PARENT_CHAIN};
use crate::config;
use crate::crypto::keys::Keypair;
use crate::pool::UnconfirmedPool;
use crate::transaction::{
    Attachment, ChildBlockPayload, Transaction, TransactionBuilder, TransactionKind,
    TransactionProcessor, TxId,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures surfaced by bundling.
#[derive(Debug, Error)]
pub enum BundleError {
    /// The overpay computation overflowed. Aborts the bundling pass —
    /// a silently wrapped fee would be an unbounded liability.
    #[error("fee overflow computing overpay of {fee}")]
    FeeOverflow { fee: i64 },

    /// Bundlers only exist for child chains.
    #[error("{chain} is not a child chain")]
    NotChildChain { chain: ChainId },
}

// ---------------------------------------------------------------------------
// BundlerEnv
// ---------------------------------------------------------------------------

/// The collaborators a bundling pass reads and writes.
pub struct BundlerEnv {
    pub ledger: Arc<dyn AccountLedger>,
    pub chain_view: Arc<dyn ChainView>,
    pub pool: Arc<dyn UnconfirmedPool>,
    pub processor: Arc<TransactionProcessor>,
}

// ---------------------------------------------------------------------------
// Bundler
// ---------------------------------------------------------------------------

/// One bundling identity on one child chain.
///
/// Configuration is immutable — `add_or_change_bundler` replaces the
/// whole value, which is also what resets the committed-fee counter. The
/// counter is the only mutable field and is atomic, so an in-flight pass
/// races safely with roster changes.
pub struct Bundler {
    chain: ChainId,
    keypair: Keypair,
    account: AccountId,
    min_rate: i64,
    fee_cap: i64,
    overpay_rate: i64,
    committed_fees: AtomicI64,
}

impl Bundler {
    fn new(chain: ChainId, keypair: Keypair, min_rate: i64, fee_cap: i64, overpay_rate: i64) -> Self {
        let account = keypair.account_id();
        Self {
            chain,
            keypair,
            account,
            min_rate,
            fee_cap,
            overpay_rate,
            committed_fees: AtomicI64::new(0),
        }
    }

    pub fn chain(&self) -> ChainId {
        self.chain
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn min_rate(&self) -> i64 {
        self.min_rate
    }

    pub fn fee_cap(&self) -> i64 {
        self.fee_cap
    }

    pub fn overpay_rate(&self) -> i64 {
        self.overpay_rate
    }

    /// Parent-chain fees committed by this bundler in not-yet-confirmed
    /// bundles. Monotonically accumulating for the configuration's
    /// lifetime.
    pub fn committed_fees(&self) -> i64 {
        self.committed_fees.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn set_committed_fees(&self, fees: i64) {
        self.committed_fees.store(fees, Ordering::Relaxed);
    }

    /// The overpaid form of `fee`: `fee + overpay_rate * fee / ONE_COIN`,
    /// checked at every step.
    pub fn overpay(&self, fee: i64) -> Result<i64, BundleError> {
        let bonus = self
            .overpay_rate
            .checked_mul(fee)
            .map(|product| product / config::ONE_COIN)
            .ok_or(BundleError::FeeOverflow { fee })?;
        fee.checked_add(bonus)
            .ok_or(BundleError::FeeOverflow { fee })
    }

    /// Whether a child transaction's offered fee meets this bundler's
    /// rate: `child_fee * ONE_COIN >= min_rate * min_fee`, in exact
    /// 128-bit arithmetic.
    fn rate_admits(&self, child_fee: i64, min_fee: i64) -> bool {
        i128::from(child_fee) * i128::from(config::ONE_COIN)
            >= i128::from(self.min_rate) * i128::from(min_fee)
    }

    /// Runs one bundling pass: selects eligible child transactions in
    /// arrival order, closes batches at the size limit, suppresses
    /// duplicates, and returns the locally-validated bundles ready for
    /// broadcast.
    pub fn bundle(&self, env: &BundlerEnv) -> Result<Vec<Transaction>, BundleError> {
        let height = env.chain_view.height();
        let now = env.chain_view.epoch_time();
        let deadline_window =
            60 * i64::from(config::DEFAULT_CHILD_BLOCK_DEADLINE_MINUTES);

        let mut bundles = Vec::new();
        let mut batch: Vec<Transaction> = Vec::new();
        let mut batch_min_total: i64 = 0;

        for tx in env.pool.child_transactions(self.chain) {
            if !env.pool.references_satisfied(&tx) {
                continue;
            }
            // Too close to expiry to survive the bundle's own deadline,
            // or not yet timestamp-valid.
            if tx.expiration() < now + deadline_window || tx.timestamp > now {
                continue;
            }
            let min_fee = tx.minimum_fee(height);
            if !self.rate_admits(tx.fee, min_fee) {
                continue;
            }
            if self.fee_cap > 0 {
                let would_commit = self
                    .committed_fees()
                    .saturating_add(self.overpay(batch_min_total.saturating_add(min_fee))?);
                if would_commit > self.fee_cap {
                    debug!(
                        account = %self.account,
                        chain = %self.chain,
                        "fee cap would be exceeded, not bundling"
                    );
                    continue;
                }
            }

            batch.push(tx);
            batch_min_total += min_fee;

            if batch.len() == config::MAX_CHILD_TRANSACTIONS {
                if let Some(bundle) =
                    self.close_batch(env, std::mem::take(&mut batch), batch_min_total, now)?
                {
                    bundles.push(bundle);
                }
                batch_min_total = 0;
            }
        }

        if !batch.is_empty() {
            if let Some(bundle) = self.close_batch(env, batch, batch_min_total, now)? {
                bundles.push(bundle);
            }
        }
        Ok(bundles)
    }

    /// Emits one batch, unless an equivalent bundle already sits
    /// unconfirmed or the bundler cannot fund it.
    fn close_batch(
        &self,
        env: &BundlerEnv,
        batch: Vec<Transaction>,
        batch_min_total: i64,
        now: i64,
    ) -> Result<Option<Transaction>, BundleError> {
        let member_ids: HashSet<TxId> = batch.iter().map(|tx| tx.id).collect();
        if self.has_equivalent_bundle(env, &member_ids) {
            debug!(
                account = %self.account,
                chain = %self.chain,
                members = member_ids.len(),
                "equivalent bundle already unconfirmed, skipping"
            );
            return Ok(None);
        }

        let total_fee = self.overpay(batch_min_total)?;

        // The bundle reserves (fee * BALANCE_SCALE) sub-units when it
        // enters the pool; emitting one the account cannot fund would be
        // a guaranteed drop downstream.
        let funded = total_fee
            .checked_mul(config::BALANCE_SCALE)
            .map(|scaled| scaled <= env.ledger.unconfirmed_balance(PARENT_CHAIN, self.account))
            .unwrap_or(false);
        if !funded {
            info!(
                account = %self.account,
                chain = %self.chain,
                total_fee,
                "insufficient parent-chain balance to cover bundle fee, not bundling"
            );
            return Ok(None);
        }

        let bundle = TransactionBuilder::new(
            PARENT_CHAIN,
            Attachment::ChildBlock(ChildBlockPayload {
                chain: self.chain,
                transactions: batch,
            }),
        )
        .fee(total_fee)
        .deadline(config::DEFAULT_CHILD_BLOCK_DEADLINE_MINUTES)
        .timestamp(now)
        .build(&self.keypair);

        match env.processor.validate(&bundle) {
            Ok(()) => {
                self.committed_fees.fetch_add(total_fee, Ordering::Relaxed);
                debug!(
                    account = %self.account,
                    chain = %self.chain,
                    bundle_id = %bundle.id,
                    total_fee,
                    members = bundle_member_count(&bundle),
                    "child block bundle created"
                );
                Ok(Some(bundle))
            }
            Err(err) => {
                info!(account = %self.account, chain = %self.chain, %err, "bundle failed local validation");
                Ok(None)
            }
        }
    }

    /// Scans the unconfirmed parent-chain transactions for a bundle by
    /// this account wrapping exactly `member_ids`. Bundles that no longer
    /// validate do not count — they are dead weight waiting to expire and
    /// may be superseded.
    fn has_equivalent_bundle(&self, env: &BundlerEnv, member_ids: &HashSet<TxId>) -> bool {
        for parent_tx in env.pool.parent_transactions() {
            if parent_tx.kind() != TransactionKind::ChildBlock || parent_tx.sender != self.account
            {
                continue;
            }
            let Attachment::ChildBlock(payload) = &parent_tx.attachment else {
                continue;
            };
            if payload.chain != self.chain {
                continue;
            }
            if env.processor.validate(&parent_tx).is_err() {
                continue;
            }
            let existing_ids: HashSet<TxId> =
                payload.transactions.iter().map(|tx| tx.id).collect();
            if existing_ids == *member_ids {
                return true;
            }
        }
        false
    }
}

fn bundle_member_count(bundle: &Transaction) -> usize {
    match &bundle.attachment {
        Attachment::ChildBlock(payload) => payload.transactions.len(),
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// BundlerRegistry
// ---------------------------------------------------------------------------

/// The roster of active bundlers, keyed by (child chain, account).
///
/// Owned and injected at node startup; there is no ambient global. The
/// registry is also the trigger surface: the pool layer calls
/// [`BundlerRegistry::on_transactions_added`] after each batch of new
/// unconfirmed transactions.
pub struct BundlerRegistry {
    env: BundlerEnv,
    bundlers: DashMap<(ChainId, AccountId), Arc<Bundler>>,
}

impl BundlerRegistry {
    pub fn new(env: BundlerEnv) -> Self {
        Self {
            env,
            bundlers: DashMap::new(),
        }
    }

    /// Adds a bundler, or replaces the existing configuration for the
    /// same (chain, account) — which also resets its committed-fee
    /// counter.
    pub fn add_or_change_bundler(
        &self,
        chain: ChainId,
        keypair: Keypair,
        min_rate: i64,
        fee_cap: i64,
        overpay_rate: i64,
    ) -> Result<Arc<Bundler>, BundleError> {
        if !chain.is_child() {
            return Err(BundleError::NotChildChain { chain });
        }
        let bundler = Arc::new(Bundler::new(chain, keypair, min_rate, fee_cap, overpay_rate));
        info!(
            account = %bundler.account(),
            %chain,
            min_rate,
            fee_cap,
            overpay_rate,
            "bundler configured"
        );
        self.bundlers
            .insert((chain, bundler.account()), Arc::clone(&bundler));
        Ok(bundler)
    }

    /// Convenience wrapper deriving the keypair from a secret phrase —
    /// the form the operator configuration surface speaks.
    pub fn add_or_change_bundler_with_phrase(
        &self,
        chain: ChainId,
        phrase: &str,
        min_rate: i64,
        fee_cap: i64,
        overpay_rate: i64,
    ) -> Result<Arc<Bundler>, BundleError> {
        self.add_or_change_bundler(
            chain,
            Keypair::from_secret_phrase(phrase),
            min_rate,
            fee_cap,
            overpay_rate,
        )
    }

    pub fn get_bundler(&self, chain: ChainId, account: AccountId) -> Option<Arc<Bundler>> {
        self.bundlers
            .get(&(chain, account))
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn all_bundlers(&self) -> Vec<Arc<Bundler>> {
        self.bundlers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn chain_bundlers(&self, chain: ChainId) -> Vec<Arc<Bundler>> {
        self.bundlers
            .iter()
            .filter(|entry| entry.key().0 == chain)
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub fn account_bundlers(&self, account: AccountId) -> Vec<Arc<Bundler>> {
        self.bundlers
            .iter()
            .filter(|entry| entry.key().1 == account)
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Stops one bundler, returning its final state if it existed.
    pub fn stop_bundler(&self, chain: ChainId, account: AccountId) -> Option<Arc<Bundler>> {
        self.bundlers.remove(&(chain, account)).map(|(_, bundler)| {
            info!(%account, %chain, "bundler stopped");
            bundler
        })
    }

    pub fn stop_account_bundlers(&self, account: AccountId) {
        self.bundlers.retain(|key, _| key.1 != account);
    }

    pub fn stop_chain_bundlers(&self, chain: ChainId) {
        self.bundlers.retain(|key, _| key.0 != chain);
    }

    pub fn stop_all_bundlers(&self) {
        self.bundlers.clear();
    }

    /// The trigger: runs once per batch of newly-added unconfirmed
    /// transactions. Each bundler whose chain is represented in the batch
    /// gets one pass; produced bundles are broadcast through the pool and
    /// also returned (mainly for observability and tests).
    ///
    /// Passes run on a snapshot of the roster: stopping a bundler races
    /// safely with its in-flight pass, which completes on its own `Arc`
    /// and is never re-added.
    pub fn on_transactions_added(&self, added: &[Transaction]) -> Vec<Transaction> {
        let touched_chains: HashSet<ChainId> = added
            .iter()
            .map(|tx| tx.chain)
            .filter(|chain| chain.is_child())
            .collect();
        if touched_chains.is_empty() {
            return Vec::new();
        }

        let bundlers: Vec<Arc<Bundler>> = self
            .bundlers
            .iter()
            .filter(|entry| touched_chains.contains(&entry.key().0))
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut broadcast = Vec::new();
        for bundler in bundlers {
            match bundler.bundle(&self.env) {
                Ok(bundles) => {
                    for bundle in bundles {
                        match self.env.pool.broadcast(bundle.clone()) {
                            Ok(()) => broadcast.push(bundle),
                            Err(err) => {
                                error!(bundle_id = %bundle.id, %err, "bundle broadcast failed")
                            }
                        }
                    }
                }
                Err(err) => {
                    error!(
                        account = %bundler.account(),
                        chain = %bundler.chain(),
                        %err,
                        "bundling pass aborted"
                    );
                }
            }
        }
        broadcast
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::MemoryLedger;
    use crate::chain::{BlockRef, ChainState, CHILD_CHAIN_EMBER, CHILD_CHAIN_SPARK};
    use crate::pool::MemoryPool;

    const SCALE: i64 = config::BALANCE_SCALE;

    // -- Fixture ------------------------------------------------------------

    struct Fixture {
        ledger: Arc<MemoryLedger>,
        pool: Arc<MemoryPool>,
        env: BundlerEnv,
        registry: BundlerRegistry,
        now: i64,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(MemoryLedger::new());
        let tip = BlockRef {
            id: 1,
            height: 200_000,
            timestamp: 0,
            generation_signature: [0u8; 32],
            base_target: config::INITIAL_BASE_TARGET,
        };
        let now = 10_000;
        let chain_view = Arc::new(ChainState::with_manual_clock(tip, now));
        let pool = Arc::new(MemoryPool::new());
        let processor = Arc::new(TransactionProcessor::new(
            Arc::clone(&ledger) as Arc<dyn AccountLedger>,
            Arc::clone(&chain_view) as Arc<dyn ChainView>,
        ));
        let env = BundlerEnv {
            ledger: Arc::clone(&ledger) as Arc<dyn AccountLedger>,
            chain_view: chain_view as Arc<dyn ChainView>,
            pool: Arc::clone(&pool) as Arc<dyn UnconfirmedPool>,
            processor,
        };
        let registry_env = BundlerEnv {
            ledger: Arc::clone(&env.ledger),
            chain_view: Arc::clone(&env.chain_view),
            pool: Arc::clone(&env.pool),
            processor: Arc::clone(&env.processor),
        };
        Fixture {
            ledger,
            pool,
            env,
            registry: BundlerRegistry::new(registry_env),
            now,
        }
    }

    fn bundler_keypair() -> Keypair {
        Keypair::from_secret_phrase("bundler-tests")
    }

    /// A child payment offering `fee`, fresh and far from expiry.
    fn child_payment(fixture: &Fixture, fee: i64, nonce: i64) -> Transaction {
        let sender = Keypair::from_secret_phrase("child-sender");
        TransactionBuilder::new(CHILD_CHAIN_SPARK, Attachment::OrdinaryPayment)
            .recipient(Keypair::from_secret_phrase("child-recipient").account_id())
            .amount(5)
            .fee(fee)
            .timestamp(fixture.now - 10 - nonce)
            .deadline(1_440)
            .build(&sender)
    }

    fn fund_bundler(fixture: &Fixture, units: i64) {
        fixture.ledger.seed_balance(
            PARENT_CHAIN,
            bundler_keypair().account_id(),
            units * SCALE,
        );
    }

    fn plain_bundler(fixture: &Fixture) -> Arc<Bundler> {
        fixture
            .registry
            .add_or_change_bundler(CHILD_CHAIN_SPARK, bundler_keypair(), 0, 0, 0)
            .unwrap()
    }

    // -- Rate admission boundary --------------------------------------------

    #[test]
    fn rate_boundary_admits_at_threshold_rejects_below() {
        let fixture = fixture();
        fund_bundler(&fixture, 1_000_000);

        // min_rate = 10 * ONE_COIN, payment min fee = 10 quanta:
        // admission needs child_fee * ONE_COIN >= 10 * ONE_COIN * 10,
        // i.e. child_fee >= 100. Exactly 100 passes; 99 does not.
        let bundler = fixture
            .registry
            .add_or_change_bundler(
                CHILD_CHAIN_SPARK,
                bundler_keypair(),
                10 * config::ONE_COIN,
                0,
                0,
            )
            .unwrap();

        let at_threshold = child_payment(&fixture, 100, 0);
        let below = child_payment(&fixture, 99, 1);
        let at_id = at_threshold.id;
        fixture.pool.add(at_threshold).unwrap();
        fixture.pool.add(below).unwrap();

        let bundles = bundler.bundle(&fixture.env).unwrap();
        assert_eq!(bundles.len(), 1);
        let Attachment::ChildBlock(payload) = &bundles[0].attachment else {
            panic!("expected child block attachment");
        };
        assert_eq!(
            payload.transactions.iter().map(|tx| tx.id).collect::<Vec<_>>(),
            vec![at_id],
            "only the at-threshold transaction is admitted"
        );
    }

    // -- Expiration / timestamp filters -------------------------------------

    #[test]
    fn skips_soon_expiring_and_future_transactions() {
        let fixture = fixture();
        fund_bundler(&fixture, 1_000_000);
        let bundler = plain_bundler(&fixture);

        // Expires in 5 minutes — inside the 10-minute bundle window.
        let sender = Keypair::from_secret_phrase("child-sender");
        let expiring = TransactionBuilder::new(CHILD_CHAIN_SPARK, Attachment::OrdinaryPayment)
            .recipient(Keypair::from_secret_phrase("child-recipient").account_id())
            .amount(5)
            .fee(1)
            .timestamp(fixture.now - 55 * 60)
            .deadline(60)
            .build(&sender);
        // Timestamped in the future.
        let future = child_payment(&fixture, 1, -60);
        assert!(future.timestamp > fixture.now);

        fixture.pool.add(expiring).unwrap();
        fixture.pool.add(future).unwrap();

        assert!(bundler.bundle(&fixture.env).unwrap().is_empty());
    }

    // -- Fee cap ------------------------------------------------------------

    #[test]
    fn fee_cap_trims_the_batch_at_the_boundary() {
        let fixture = fixture();
        fund_bundler(&fixture, 1_000_000);

        // Cap 500, already committed 450: only 50 more may be committed.
        // Eight payments at min fee 10 each: the first five fit
        // (450 + 50 <= 500), the rest would push past the cap and are
        // skipped individually.
        let bundler = fixture
            .registry
            .add_or_change_bundler(CHILD_CHAIN_SPARK, bundler_keypair(), 0, 500, 0)
            .unwrap();
        bundler.set_committed_fees(450);

        for nonce in 0..8 {
            fixture.pool.add(child_payment(&fixture, 1, nonce)).unwrap();
        }

        let bundles = bundler.bundle(&fixture.env).unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundle_member_count(&bundles[0]), 5);
        assert_eq!(bundles[0].fee, 50);
        assert_eq!(bundler.committed_fees(), 500);
    }

    #[test]
    fn at_cap_nothing_is_bundled() {
        let fixture = fixture();
        fund_bundler(&fixture, 1_000_000);
        let bundler = fixture
            .registry
            .add_or_change_bundler(CHILD_CHAIN_SPARK, bundler_keypair(), 0, 500, 0)
            .unwrap();
        bundler.set_committed_fees(500);

        fixture.pool.add(child_payment(&fixture, 1, 0)).unwrap();

        assert!(bundler.bundle(&fixture.env).unwrap().is_empty());
        assert_eq!(bundler.committed_fees(), 500);
    }

    #[test]
    fn zero_cap_means_uncapped() {
        let fixture = fixture();
        fund_bundler(&fixture, 1_000_000);
        let bundler = plain_bundler(&fixture);
        bundler.set_committed_fees(i64::MAX / 2);

        fixture.pool.add(child_payment(&fixture, 1, 0)).unwrap();

        assert_eq!(bundler.bundle(&fixture.env).unwrap().len(), 1);
    }

    // -- Overpay ------------------------------------------------------------

    #[test]
    fn overpay_adds_the_configured_bonus() {
        let fixture = fixture();
        let bundler = fixture
            .registry
            .add_or_change_bundler(
                CHILD_CHAIN_SPARK,
                bundler_keypair(),
                0,
                0,
                config::ONE_COIN / 2, // +50%
            )
            .unwrap();
        assert_eq!(bundler.overpay(100).unwrap(), 150);
        assert_eq!(bundler.overpay(0).unwrap(), 0);
    }

    #[test]
    fn overpay_overflow_fails_loudly() {
        let fixture = fixture();
        let bundler = fixture
            .registry
            .add_or_change_bundler(CHILD_CHAIN_SPARK, bundler_keypair(), 0, 0, i64::MAX)
            .unwrap();
        assert!(matches!(
            bundler.overpay(i64::MAX),
            Err(BundleError::FeeOverflow { .. })
        ));
    }

    #[test]
    fn overpaid_fee_lands_on_the_bundle() {
        let fixture = fixture();
        fund_bundler(&fixture, 1_000_000);
        let bundler = fixture
            .registry
            .add_or_change_bundler(
                CHILD_CHAIN_SPARK,
                bundler_keypair(),
                0,
                0,
                config::ONE_COIN, // +100%
            )
            .unwrap();

        fixture.pool.add(child_payment(&fixture, 1, 0)).unwrap();

        let bundles = bundler.bundle(&fixture.env).unwrap();
        assert_eq!(bundles.len(), 1);
        // min fee 10, doubled by the overpay.
        assert_eq!(bundles[0].fee, 20);
        assert_eq!(bundler.committed_fees(), 20);
    }

    // -- Duplicate-bundle suppression ---------------------------------------

    #[test]
    fn equivalent_unconfirmed_bundle_suppresses_emission() {
        let fixture = fixture();
        fund_bundler(&fixture, 1_000_000);
        let bundler = plain_bundler(&fixture);

        let a = child_payment(&fixture, 1, 0);
        let b = child_payment(&fixture, 1, 1);
        fixture.pool.add(a.clone()).unwrap();
        fixture.pool.add(b.clone()).unwrap();

        // First pass emits {A, B}.
        let first = bundler.bundle(&fixture.env).unwrap();
        assert_eq!(first.len(), 1);
        fixture.pool.add(first[0].clone()).unwrap();

        // Unchanged pool: the second pass must emit nothing.
        assert!(bundler.bundle(&fixture.env).unwrap().is_empty());

        // A expires out of the pool; {B} is a different set and a new
        // bundle for it must be emitted.
        fixture.pool.remove(a.id);
        let second = bundler.bundle(&fixture.env).unwrap();
        assert_eq!(second.len(), 1);
        let Attachment::ChildBlock(payload) = &second[0].attachment else {
            panic!("expected child block attachment");
        };
        assert_eq!(
            payload.transactions.iter().map(|tx| tx.id).collect::<Vec<_>>(),
            vec![b.id]
        );
    }

    #[test]
    fn stale_invalid_bundle_is_not_a_duplicate() {
        let fixture = fixture();
        fund_bundler(&fixture, 1_000_000);
        let bundler = plain_bundler(&fixture);

        let a = child_payment(&fixture, 1, 0);
        let b = child_payment(&fixture, 1, 1);
        fixture.pool.add(a.clone()).unwrap();
        fixture.pool.add(b.clone()).unwrap();

        // A hand-built bundle for exactly {A, B} whose fee no longer
        // covers the settlement total (as after a reorganization moved
        // the floors). It must not suppress a fresh bundle.
        let stale = TransactionBuilder::new(
            PARENT_CHAIN,
            Attachment::ChildBlock(ChildBlockPayload {
                chain: CHILD_CHAIN_SPARK,
                transactions: vec![a, b],
            }),
        )
        .fee(5)
        .timestamp(fixture.now)
        .build(&bundler_keypair());
        fixture.pool.add(stale).unwrap();

        let bundles = bundler.bundle(&fixture.env).unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundle_member_count(&bundles[0]), 2);
    }

    // -- Funding check ------------------------------------------------------

    #[test]
    fn unfundable_bundle_is_not_emitted() {
        let fixture = fixture();
        // The batch needs fee 20; the bundler holds only 5 units.
        fund_bundler(&fixture, 5);
        let bundler = plain_bundler(&fixture);

        fixture.pool.add(child_payment(&fixture, 1, 0)).unwrap();
        fixture.pool.add(child_payment(&fixture, 1, 1)).unwrap();

        assert!(bundler.bundle(&fixture.env).unwrap().is_empty());
        assert_eq!(bundler.committed_fees(), 0);
    }

    // -- Registry & trigger --------------------------------------------------

    #[test]
    fn registry_roster_operations() {
        let fixture = fixture();
        let account = bundler_keypair().account_id();

        let bundler = fixture
            .registry
            .add_or_change_bundler(CHILD_CHAIN_SPARK, bundler_keypair(), 7, 100, 3)
            .unwrap();
        assert_eq!(bundler.min_rate(), 7);
        assert_eq!(bundler.fee_cap(), 100);
        assert_eq!(bundler.overpay_rate(), 3);

        assert!(fixture
            .registry
            .get_bundler(CHILD_CHAIN_SPARK, account)
            .is_some());
        assert_eq!(fixture.registry.all_bundlers().len(), 1);
        assert_eq!(fixture.registry.chain_bundlers(CHILD_CHAIN_SPARK).len(), 1);
        assert_eq!(fixture.registry.account_bundlers(account).len(), 1);

        // Reconfiguration replaces state — the committed counter resets.
        bundler.set_committed_fees(42);
        let replaced = fixture
            .registry
            .add_or_change_bundler(CHILD_CHAIN_SPARK, bundler_keypair(), 7, 100, 3)
            .unwrap();
        assert_eq!(replaced.committed_fees(), 0);

        fixture.registry.stop_bundler(CHILD_CHAIN_SPARK, account);
        assert!(fixture
            .registry
            .get_bundler(CHILD_CHAIN_SPARK, account)
            .is_none());
    }

    #[test]
    fn rejects_bundler_on_non_child_chain() {
        let fixture = fixture();
        assert!(matches!(
            fixture
                .registry
                .add_or_change_bundler(PARENT_CHAIN, bundler_keypair(), 0, 0, 0),
            Err(BundleError::NotChildChain { .. })
        ));
    }

    #[test]
    fn trigger_runs_only_bundlers_of_touched_chains() {
        let fixture = fixture();
        fund_bundler(&fixture, 1_000_000);
        plain_bundler(&fixture); // bundles spark only

        let spark_tx = child_payment(&fixture, 1, 0);
        fixture.pool.add(spark_tx.clone()).unwrap();

        // A batch that only touched ember: the spark bundler stays idle.
        let ember_probe = TransactionBuilder::new(CHILD_CHAIN_EMBER, Attachment::OrdinaryPayment)
            .recipient(Keypair::from_secret_phrase("child-recipient").account_id())
            .amount(1)
            .fee(1)
            .timestamp(fixture.now - 5)
            .build(&Keypair::from_secret_phrase("child-sender"));
        assert!(fixture.registry.on_transactions_added(&[ember_probe]).is_empty());

        // A batch touching spark triggers the pass and the bundle lands
        // in the pool via broadcast.
        let bundles = fixture.registry.on_transactions_added(&[spark_tx]);
        assert_eq!(bundles.len(), 1);
        assert!(fixture.pool.contains(bundles[0].id));
    }

    #[test]
    fn stopped_bundler_does_not_run() {
        let fixture = fixture();
        fund_bundler(&fixture, 1_000_000);
        plain_bundler(&fixture);
        let account = bundler_keypair().account_id();

        let tx = child_payment(&fixture, 1, 0);
        fixture.pool.add(tx.clone()).unwrap();

        fixture.registry.stop_bundler(CHILD_CHAIN_SPARK, account);
        assert!(fixture.registry.on_transactions_added(&[tx]).is_empty());
    }
}
