//! SHA-256 helpers.
//!
//! Two entry points, both returning fixed 32-byte digests. `sha256` hashes
//! one buffer; `sha256_concat` hashes the concatenation of two without
//! allocating an intermediate — the forging engine digests
//! `generation_signature ‖ public_key` on every tip change, so the hot
//! path stays allocation-free.

use sha2::{Digest, Sha256};

/// Computes the SHA-256 digest of `data`.
///
/// # Example
///
/// ```
/// use meridian_protocol::crypto::sha256;
///
/// let digest = sha256(b"meridian");
/// assert_eq!(digest.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Computes the SHA-256 digest of `first ‖ second`.
pub fn sha256_concat(first: &[u8], second: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(first);
    hasher.update(second);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // NIST test vector: sha256("abc")
        let digest = sha256(b"abc");
        assert_eq!(
            hex::encode(digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn sha256_concat_matches_joined_input() {
        let joined = sha256(b"meridian-protocol");
        let split = sha256_concat(b"meridian-", b"protocol");
        assert_eq!(joined, split);
    }

    #[test]
    fn sha256_empty_input() {
        let digest = sha256(b"");
        assert_eq!(
            hex::encode(digest),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
