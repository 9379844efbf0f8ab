//! # Key Management
//!
//! Ed25519 keypairs for Veil accounts. Every account that signs a permit
//! owns one; its [`Address`] is derived from the public half.
//!
//! ## Security considerations
//!
//! - Private keys are zeroized on drop (ed25519-dalek does this for us).
//! - Key generation uses the OS RNG.
//! - Key bytes are never logged, and `Debug` only ever prints the public key.

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::{SIGNATURE_LENGTH, VERIFYING_KEY_LENGTH};
use crate::identity::Address;

/// An Ed25519 signing keypair.
///
/// Intentionally not `Serialize`: exporting a secret key should take an
/// explicit call to [`secret_key_bytes`](Self::secret_key_bytes).
pub struct VeilKeypair {
    signing_key: SigningKey,
}

/// The public half of a keypair.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VeilPublicKey {
    bytes: [u8; VERIFYING_KEY_LENGTH],
}

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct VeilSignature {
    bytes: [u8; SIGNATURE_LENGTH],
}

impl VeilKeypair {
    /// Generate a fresh keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Constructs a keypair deterministically from a 32-byte seed.
    ///
    /// Weak seed, weak key. Tests use fixed seeds; nothing else should.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Returns the public key associated with this keypair.
    pub fn public_key(&self) -> VeilPublicKey {
        VeilPublicKey {
            bytes: self.signing_key.verifying_key().to_bytes(),
        }
    }

    /// The account address controlled by this keypair.
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key())
    }

    /// Sign a message. Ed25519 signatures are deterministic.
    pub fn sign(&self, message: &[u8]) -> VeilSignature {
        VeilSignature {
            bytes: self.signing_key.sign(message).to_bytes(),
        }
    }

    /// Exports the raw 32-byte secret key material. Handle with care.
    pub fn secret_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }
}

impl Clone for VeilKeypair {
    fn clone(&self) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&self.signing_key.to_bytes()),
        }
    }
}

impl fmt::Debug for VeilKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VeilKeypair(pub={})", self.public_key().to_hex())
    }
}

// ---------------------------------------------------------------------------
// VeilPublicKey
// ---------------------------------------------------------------------------

impl VeilPublicKey {
    /// Create a public key from raw bytes without validating the point.
    /// [`verify_raw`](super::signatures::verify_raw) reports a bad point as
    /// `InvalidPublicKey` when the key is first used.
    pub fn from_bytes(bytes: [u8; VERIFYING_KEY_LENGTH]) -> Self {
        Self { bytes }
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; VERIFYING_KEY_LENGTH] {
        &self.bytes
    }

    /// Hex-encoded representation. 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Display for VeilPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for VeilPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VeilPublicKey({})", &self.to_hex()[..16])
    }
}

// ---------------------------------------------------------------------------
// VeilSignature
// ---------------------------------------------------------------------------

impl VeilSignature {
    /// Create a signature from its raw 64-byte representation.
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self { bytes }
    }

    /// Returns the raw signature bytes.
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.bytes
    }

    /// Returns the hex-encoded signature string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }
}

impl fmt::Debug for VeilSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VeilSignature({}...)", &self.to_hex()[..16])
    }
}

// serde has no blanket impls for [u8; 64], so signatures travel as hex.
impl Serialize for VeilSignature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for VeilSignature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        let arr: [u8; SIGNATURE_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| serde::de::Error::custom("signature must be 64 bytes"))?;
        Ok(Self { bytes: arr })
    }
}
