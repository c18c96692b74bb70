//! # Crypto Module
//!
//! Low-level cryptographic primitives for Meridian: Ed25519 keypairs for
//! signing identities and SHA-256 digests for transaction ids and forging
//! hits. Don't roll your own — everything here delegates to audited crates.
//!
//! SHA-256 is not a stylistic choice. The forging hit derivation and the
//! transaction id scheme are consensus rules; swapping the hash function
//! is a hard fork.

pub mod hash;
pub mod keys;

pub use hash::{sha256, sha256_concat};
pub use keys::{KeyError, Keypair, PublicKey, Signature};
