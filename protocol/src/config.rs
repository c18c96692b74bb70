//! # Protocol Configuration & Constants
//!
//! Every magic number in Meridian lives here. If you're hardcoding a
//! constant somewhere else, you're doing it wrong and you owe the team
//! coffee.
//!
//! Most of these values are consensus-critical: changing an activation
//! height or a scaling factor after launch splits the network. The handful
//! of operational knobs (tick intervals, default deadlines) are tunable
//! per deployment and merely *default* here.

// ---------------------------------------------------------------------------
// Monetary Scaling
// ---------------------------------------------------------------------------

/// Ledger balances are tracked in sub-units scaled by this factor relative
/// to transaction amounts. A transaction moving `amount = 100` debits
/// `100 * BALANCE_SCALE` sub-units from the sender's balance.
///
/// The protocol never divides by this — amounts go in scaled, come out
/// scaled. Display code may divide; consensus code may not.
pub const BALANCE_SCALE: i64 = 100;

/// Quanta per whole parent-chain coin. This is the denominator for every
/// cross-chain rate: bundler rates are expressed as "child quanta per
/// parent coin" and resolved against `ONE_COIN` in exact integer
/// arithmetic. Floating point never touches a rate comparison.
pub const ONE_COIN: i64 = 100_000_000;

/// Maximum total money supply, in transaction units. Amounts and prices
/// are validated against this bound so that scaled balance arithmetic
/// stays comfortably inside `i64`.
pub const MAX_BALANCE: i64 = 1_000_000_000;

// ---------------------------------------------------------------------------
// Transaction Limits
// ---------------------------------------------------------------------------

/// Minimum transaction deadline, in minutes.
pub const MIN_DEADLINE_MINUTES: u16 = 1;

/// Maximum transaction deadline, in minutes. A transaction expires
/// `60 * deadline` seconds after its timestamp and can never outlive
/// a full day in the unconfirmed pool.
pub const MAX_DEADLINE_MINUTES: u16 = 1440;

/// Maximum number of child transactions one child-block transaction may
/// carry. Also the upper bound on transactions per block.
pub const MAX_CHILD_TRANSACTIONS: usize = 255;

/// Maximum length of an arbitrary message payload, in bytes.
pub const MAX_MESSAGE_LENGTH: usize = 1000;

/// Maximum alias name length, in characters.
pub const MAX_ALIAS_LENGTH: usize = 100;

/// Maximum alias URI length, in characters.
pub const MAX_ALIAS_URI_LENGTH: usize = 1000;

/// Characters permitted in alias and asset names, compared after
/// lowercasing. Deliberately restrictive — names are consensus state,
/// not a Unicode playground.
pub const NAME_ALPHABET: &str = "0123456789abcdefghijklmnopqrstuvwxyz";

/// Asset name length bounds.
pub const MIN_ASSET_NAME_LENGTH: usize = 3;
pub const MAX_ASSET_NAME_LENGTH: usize = 10;

/// Maximum asset description length, in characters.
pub const MAX_ASSET_DESCRIPTION_LENGTH: usize = 1000;

/// Maximum quantity of any single asset.
pub const MAX_ASSET_QUANTITY: i64 = 1_000_000_000;

/// Issuing an asset burns a deliberately painful fee. Spam assets are
/// forever — the fee is the only thing standing between the chain and a
/// million test tokens.
pub const ASSET_ISSUANCE_FEE: i64 = 1_000;

/// Minimum effective-balance lease period, in blocks.
pub const MIN_LEASING_PERIOD: u16 = 1440;

// ---------------------------------------------------------------------------
// Fee Schedule
// ---------------------------------------------------------------------------

/// Base settlement fee for one child-chain transaction, in parent-chain
/// quanta. A transaction's minimum fee is this base times a small per-kind
/// weight (see `Transaction::minimum_fee`).
pub const CHILD_BASE_FEE: i64 = 10;

/// Minimum fee for a parent-chain transaction, in transaction units.
/// Child-chain transactions have no fee floor of their own — a bundler
/// sponsors their settlement, and the bundler's rate policy decides what
/// is worth carrying.
pub const PARENT_MIN_FEE: i64 = 1;

// ---------------------------------------------------------------------------
// Feature Activation Heights
// ---------------------------------------------------------------------------
//
// Each feature below is invalid in any block before its height. The
// heights are frozen history: they gate validation of old blocks during
// replay, so they can never be edited, only appended to.

/// Alias assignments become valid at this height.
pub const ALIAS_SYSTEM_HEIGHT: u32 = 22_000;

/// The forging hit derivation switches from the signed-generation-signature
/// form to the public-key form at this height. Both branches must be kept
/// forever — consensus validity of historical blocks depends on the legacy
/// computation below the threshold.
pub const TRANSPARENT_FORGING_HEIGHT: u32 = 30_000;

/// Arbitrary messages become valid at this height.
pub const ARBITRARY_MESSAGES_HEIGHT: u32 = 40_000;

/// Effective-balance leasing becomes valid at this height.
pub const LEASING_HEIGHT: u32 = 67_000;

/// The asset exchange (issuance, transfers, orders) opens at this height.
pub const ASSET_EXCHANGE_HEIGHT: u32 = 111_111;

// ---------------------------------------------------------------------------
// Forging Parameters
// ---------------------------------------------------------------------------

/// Base target of the genesis block. Scales how quickly hits cross the
/// eligibility threshold when the whole supply is staked.
pub const INITIAL_BASE_TARGET: u64 = 153_722_867;

/// Default interval between forging ticks, in milliseconds.
pub const FORGING_TICK_INTERVAL_MS: u64 = 1_000;

// ---------------------------------------------------------------------------
// Bundling Parameters
// ---------------------------------------------------------------------------

/// Deadline, in minutes, given to child-block transactions built by a
/// bundler. Child transactions expiring sooner than this window are not
/// worth bundling — the bundle could outlive its own contents.
pub const DEFAULT_CHILD_BLOCK_DEADLINE_MINUTES: u16 = 10;

// ---------------------------------------------------------------------------
// Chain Epoch
// ---------------------------------------------------------------------------

/// The chain epoch: 2026-01-01T00:00:00Z as Unix milliseconds. All
/// protocol timestamps are seconds since this instant, not since 1970.
pub const EPOCH_BEGINNING_UNIX_MS: i64 = 1_767_225_600_000;

/// Returns the current chain epoch time, in seconds since
/// [`EPOCH_BEGINNING_UNIX_MS`]. Negative before the epoch — only test
/// rigs and time travelers should ever see that.
pub fn epoch_time_now() -> i64 {
    (chrono::Utc::now().timestamp_millis() - EPOCH_BEGINNING_UNIX_MS) / 1000
}

// ---------------------------------------------------------------------------
// Genesis
// ---------------------------------------------------------------------------

/// Account id of the genesis account. Zero-timestamp transactions from
/// this account bypass the unconfirmed-balance check — that is how the
/// initial supply enters circulation.
pub const GENESIS_ACCOUNT_ID: u64 = 0x4d45_5249_4449_414e; // "MERIDIAN"
