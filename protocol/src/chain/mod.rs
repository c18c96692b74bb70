//! # Chain Module
//!
//! The two-tier chain topology and the read-only chain view contract.
//!
//! The parent chain carries the forging stake, child-block (bundle)
//! transactions, and balance leases. Child chains carry everyday traffic —
//! payments, messages, aliases, asset trades — and settle their fees onto
//! the parent chain through bundlers. Every transaction names exactly one
//! chain; the chain table below is the closed set of chains this build
//! knows about.

pub mod view;

pub use view::{BlockRef, ChainState, ChainView};

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// ChainId
// ---------------------------------------------------------------------------

/// Chain identifier. `1` is the parent chain; child chains count up
/// from `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(u32);

/// The parent chain: stake, bundles, leases.
pub const PARENT_CHAIN: ChainId = ChainId(1);

/// Child chain "spark" — the general-purpose payment chain.
pub const CHILD_CHAIN_SPARK: ChainId = ChainId(2);

/// Child chain "ember" — the asset-trading chain.
pub const CHILD_CHAIN_EMBER: ChainId = ChainId(3);

impl ChainId {
    pub const fn from_raw(raw: u32) -> Self {
        ChainId(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns `true` for the parent chain.
    pub fn is_parent(self) -> bool {
        self == PARENT_CHAIN
    }

    /// Returns `true` if this id names a known child chain.
    pub fn is_child(self) -> bool {
        child_chain(self).is_some()
    }
}

impl fmt::Display for ChainId {
    /// A chain id renders as its name when known, its number otherwise —
    /// log lines should say "spark", not "2".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match child_chain(*self) {
            Some(chain) => write!(f, "{}", chain.name),
            None if self.is_parent() => write!(f, "meridian"),
            None => write!(f, "chain-{}", self.0),
        }
    }
}

// ---------------------------------------------------------------------------
// ChildChain
// ---------------------------------------------------------------------------

/// Static descriptor of a child chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildChain {
    pub id: ChainId,
    pub name: &'static str,
    /// Display decimals of the chain's quanta. Display only — the
    /// protocol never divides.
    pub decimals: u8,
}

/// The closed table of child chains. Adding a chain is a protocol
/// upgrade, not a runtime operation.
pub static CHILD_CHAINS: [ChildChain; 2] = [
    ChildChain {
        id: CHILD_CHAIN_SPARK,
        name: "spark",
        decimals: 2,
    },
    ChildChain {
        id: CHILD_CHAIN_EMBER,
        name: "ember",
        decimals: 8,
    },
];

/// Looks up a child chain descriptor by id.
pub fn child_chain(id: ChainId) -> Option<&'static ChildChain> {
    CHILD_CHAINS.iter().find(|chain| chain.id == id)
}
