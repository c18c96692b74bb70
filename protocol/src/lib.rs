// Copyright (c) 2026 Meridian Developers. MIT License.
// See LICENSE for details.

//! # Meridian Protocol — Core Library
//!
//! The transaction-lifecycle and consensus core of Meridian: a two-tier
//! account ledger with one parent chain carrying the stake and many child
//! chains carrying the traffic.
//!
//! Three subsystems enforce the property everything else leans on — no
//! value is created, destroyed, or double-spent across confirmed and
//! unconfirmed state:
//!
//! - **transaction** — the closed set of transaction kinds, each defining
//!   how it reserves balance speculatively, commits it on confirmation,
//!   and reverses it on rollback.
//! - **forging** — proof-of-stake leader election: deciding, per signing
//!   identity and chain tip, when that identity may produce the next
//!   block.
//! - **bundler** — cross-chain fee aggregation: wrapping child-chain
//!   transactions into parent-chain bundles that pay their settlement.
//!
//! ## Architecture
//!
//! ```text
//! config      — every protocol constant, in one place
//! crypto      — Ed25519 keypairs and SHA-256 digests
//! account     — account ids and the balance-ledger contract
//! chain       — chain topology and the read-only chain view contract
//! transaction — kinds, attachments, builder, lifecycle processor
//! pool        — the unconfirmed-pool contract + in-memory implementation
//! forging     — hit computation, eligibility, roster, tick loop
//! bundler     — rate policy, fee caps, duplicate suppression, roster
//! ```
//!
//! Block storage, p2p gossip, the HTTP surface, and persistence are
//! collaborators behind narrow traits ([`account::AccountLedger`],
//! [`chain::ChainView`], [`pool::UnconfirmedPool`]) — this crate holds the
//! rules, not the plumbing.
//!
//! ## Design Philosophy
//!
//! 1. Consensus arithmetic is integer arithmetic. No floats, no wrapping.
//! 2. Expected failures are values (`false`, `None`); protocol violations
//!    are typed errors; logic faults crash the process. In that order.
//! 3. If it touches money, it has tests. Plural.

pub mod account;
pub mod bundler;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod forging;
pub mod pool;
pub mod transaction;
