//! # Cryptographic Primitives for Veil
//!
//! Hashing, keys and signatures. Everything here is a thin, type-safe
//! wrapper around audited crates (`blake3`, `sha2`, `ed25519-dalek`).
//! Nothing in this module is clever, and it should stay that way.

pub mod hash;
pub mod keys;
pub mod signatures;

pub use hash::{blake3_hash, commitment_hash, sha256, CommitmentHash};
pub use keys::{VeilKeypair, VeilPublicKey, VeilSignature};
pub use signatures::{verify, verify_raw, SignatureError};
