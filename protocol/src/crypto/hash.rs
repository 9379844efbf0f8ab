//! # Hashing Utilities
//!
//! Two hash functions, each with one job:
//!
//! - **BLAKE3**: commitment hashes and address derivation. Anything that
//!   ends up as a lookup key in contract state.
//! - **SHA-256**: permit digests, so the signed message format stays
//!   readable by tooling that only speaks SHA-256.
//!
//! ## Commitment construction
//!
//! `commitment = BLAKE3(secret || recipient)`, where `recipient` is the raw
//! 20-byte address of the account allowed to claim. The address has a fixed
//! length and comes last, so the concatenation is unambiguous even though
//! the secret is variable-length.
//!
//! Binding the recipient is what defeats front-running: someone who copies a
//! pending claim and resubmits it from their own account hashes the same
//! secret with a different address and lands on an empty commitment.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::config::HASH_OUTPUT_LENGTH;
use crate::identity::Address;

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use veil_protocol::crypto::sha256;
///
/// let hash = sha256(b"veil");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute the BLAKE3 hash of the input data.
///
/// # Example
///
/// ```
/// use veil_protocol::crypto::blake3_hash;
///
/// let hash = blake3_hash(b"veil");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

// ---------------------------------------------------------------------------
// CommitmentHash
// ---------------------------------------------------------------------------

/// The lookup key for escrowed value: a digest binding a secret to the
/// account allowed to claim it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitmentHash([u8; HASH_OUTPUT_LENGTH]);

impl CommitmentHash {
    /// Wraps raw digest bytes.
    pub fn from_bytes(bytes: [u8; HASH_OUTPUT_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Returns the raw 32-byte digest.
    pub fn as_bytes(&self) -> &[u8; HASH_OUTPUT_LENGTH] {
        &self.0
    }

    /// Returns the hex-encoded digest.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex-encoded digest, with or without a `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s.trim_start_matches("0x"))?;
        let arr: [u8; HASH_OUTPUT_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }
}

impl fmt::Display for CommitmentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for CommitmentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitmentHash({}...)", &self.to_hex()[..12])
    }
}

impl Serialize for CommitmentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for CommitmentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Computes the commitment hash for `secret` claimable by `recipient`.
///
/// # Example
///
/// ```
/// use veil_protocol::crypto::commitment_hash;
/// use veil_protocol::identity::Address;
///
/// let alice = Address::from_bytes([0xA1; 20]);
/// let bob = Address::from_bytes([0xB0; 20]);
/// assert_ne!(commitment_hash(b"s3cret", &alice), commitment_hash(b"s3cret", &bob));
/// ```
pub fn commitment_hash(secret: &[u8], recipient: &Address) -> CommitmentHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(secret);
    hasher.update(recipient.as_bytes());
    CommitmentHash(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256("abc"), FIPS 180-2 appendix B.1.
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn commitment_matches_concatenation() {
        let recipient = Address::from_bytes([7u8; 20]);
        let mut preimage = b"hunter2".to_vec();
        preimage.extend_from_slice(recipient.as_bytes());
        assert_eq!(
            commitment_hash(b"hunter2", &recipient).as_bytes(),
            &blake3_hash(&preimage)
        );
    }

    #[test]
    fn commitment_is_bound_to_recipient() {
        let a = Address::from_bytes([1u8; 20]);
        let b = Address::from_bytes([2u8; 20]);
        assert_ne!(commitment_hash(b"same", &a), commitment_hash(b"same", &b));
    }

    #[test]
    fn empty_secret_still_hashes() {
        let a = Address::from_bytes([1u8; 20]);
        assert_eq!(commitment_hash(b"", &a).as_bytes(), &blake3_hash(a.as_bytes()));
    }

    #[test]
    fn hex_roundtrip_accepts_prefix() {
        let h = commitment_hash(b"x", &Address::from_bytes([3u8; 20]));
        let shown = h.to_string();
        assert!(shown.starts_with("0x"));
        assert_eq!(CommitmentHash::from_hex(&shown).unwrap(), h);
        assert!(CommitmentHash::from_hex("abcd").is_err());
    }

    #[test]
    fn serializes_as_prefixed_hex() {
        let h = commitment_hash(b"x", &Address::from_bytes([3u8; 20]));
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{h}\""));
        let back: CommitmentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
