//! # Key Management
//!
//! Ed25519 keypairs for Meridian signing identities: transaction senders,
//! forgers, and bundlers are all, at bottom, one of these.
//!
//! ## Why Ed25519?
//!
//! - Deterministic signatures (no k-value footguns like ECDSA).
//! - 128-bit security level in 32+32 bytes. Compact and sufficient.
//! - Fast verification — the apply pipeline checks every inbound
//!   transaction's signature before it touches any balance.
//!
//! ## Security considerations
//!
//! - We use OS-level RNG (`OsRng`) for key generation. If your OS RNG is
//!   broken, you have bigger problems than Meridian.
//! - Key bytes are never logged. If you add logging to this module, you
//!   will be asked to leave.
//! - `Keypair` intentionally does NOT implement `Serialize`. Persisting a
//!   signing key should be a deliberate act, not a side effect of shoving
//!   a struct into JSON.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::account::AccountId;
use crate::crypto::hash::sha256;

/// Errors that can occur during key operations.
///
/// Intentionally vague about *why* something failed — leaking details
/// about key material through error messages is a classic footgun.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("invalid secret key bytes: wrong length or not a valid scalar")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,
}

// ---------------------------------------------------------------------------
// Keypair
// ---------------------------------------------------------------------------

/// An Ed25519 signing identity.
///
/// Every account on either tier of the ledger is controlled by one of
/// these. The signing key is the crown jewel — the forging roster and the
/// bundler registry both hold keypairs for as long as the identity is
/// active, and drop them the moment it is stopped.
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generates a fresh keypair from the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Constructs a keypair deterministically from a 32-byte seed.
    pub fn from_seed(seed: [u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Derives a keypair from a secret phrase.
    ///
    /// The seed is the SHA-256 digest of the phrase, so the same phrase
    /// always yields the same identity. This is the form the forging and
    /// bundling configuration surfaces accept from operators.
    pub fn from_secret_phrase(phrase: &str) -> Self {
        Self::from_seed(sha256(phrase.as_bytes()))
    }

    /// Returns the public half of this identity.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// Returns the account id controlled by this keypair.
    pub fn account_id(&self) -> AccountId {
        self.public_key().account_id()
    }

    /// Signs a message, returning a 64-byte Ed25519 signature.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature {
            bytes: self.signing_key.sign(message).to_bytes().to_vec(),
        }
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secret half, not even in debug output.
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// The public half of a signing identity, safe to share with the world.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    bytes: [u8; 32],
}

impl PublicKey {
    /// Reconstructs a public key from raw bytes.
    ///
    /// Fails if the bytes are not a valid Ed25519 point — better to reject
    /// at the boundary than to fail every later verification.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, KeyError> {
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self { bytes })
    }

    /// Returns the raw 32-byte encoding.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Derives the account id this key controls: the low-order 8 bytes of
    /// the key's SHA-256 digest, read little-endian. Account ids are how
    /// the ledger addresses state; the full key travels in transactions so
    /// verifiers never need a key lookup.
    pub fn account_id(&self) -> AccountId {
        let digest = sha256(&self.bytes);
        let mut id = [0u8; 8];
        id.copy_from_slice(&digest[..8]);
        AccountId::from_raw(u64::from_le_bytes(id))
    }

    /// Verifies a signature over `message`. Malformed signatures simply
    /// fail verification — no panics, just `false`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(verifying_key) = VerifyingKey::from_bytes(&self.bytes) else {
            return false;
        };
        let Ok(sig_bytes) = <[u8; 64]>::try_from(signature.bytes.as_slice()) else {
            return false;
        };
        verifying_key
            .verify(message, &DalekSignature::from_bytes(&sig_bytes))
            .is_ok()
    }

    /// Hex encoding, for logs and JSON surfaces.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// An Ed25519 signature over a message.
///
/// Stored as `Vec<u8>` for serde compatibility, but always exactly 64
/// bytes when produced by [`Keypair::sign`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    bytes: Vec<u8>,
}

impl Signature {
    /// Reconstructs a signature from raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", hex::encode(&self.bytes))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let kp = Keypair::generate();
        let msg = b"pay 100 to the bundler";
        let sig = kp.sign(msg);
        assert!(kp.public_key().verify(msg, &sig));
    }

    #[test]
    fn verify_rejects_wrong_message() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"original");
        assert!(!kp.public_key().verify(b"tampered", &sig));
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let kp = Keypair::generate();
        let other = Keypair::generate();
        let sig = kp.sign(b"message");
        assert!(!other.public_key().verify(b"message", &sig));
    }

    #[test]
    fn verify_rejects_truncated_signature() {
        let kp = Keypair::generate();
        let sig = kp.sign(b"message");
        let truncated = Signature::from_bytes(sig.as_bytes()[..32].to_vec());
        assert!(!kp.public_key().verify(b"message", &truncated));
    }

    #[test]
    fn secret_phrase_is_deterministic() {
        let a = Keypair::from_secret_phrase("correct horse battery staple");
        let b = Keypair::from_secret_phrase("correct horse battery staple");
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.account_id(), b.account_id());
    }

    #[test]
    fn different_phrases_different_accounts() {
        let a = Keypair::from_secret_phrase("alice");
        let b = Keypair::from_secret_phrase("bob");
        assert_ne!(a.account_id(), b.account_id());
    }

    #[test]
    fn account_id_stable_across_calls() {
        let kp = Keypair::generate();
        assert_eq!(kp.account_id(), kp.public_key().account_id());
    }

    #[test]
    fn public_key_from_bytes_roundtrip() {
        let kp = Keypair::generate();
        let pk = kp.public_key();
        let recovered = PublicKey::from_bytes(*pk.as_bytes()).unwrap();
        assert_eq!(pk, recovered);
    }

    #[test]
    fn debug_output_hides_secret() {
        let kp = Keypair::generate();
        let debug = format!("{:?}", kp);
        assert!(debug.contains("public_key"));
        assert!(!debug.contains("signing_key"));
    }
}
