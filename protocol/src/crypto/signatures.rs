//! # Digital Signatures
//!
//! Ed25519 verification for Veil permits. Public keys and signatures reach
//! the token as bytes inside a [`PermitAuthorization`](crate::token::PermitAuthorization),
//! so the key is only checked to be a curve point here, at first use.

use ed25519_dalek::{Signature as DalekSignature, Verifier, VerifyingKey};
use thiserror::Error;

use super::keys::{VeilPublicKey, VeilSignature};

/// Errors during signature verification.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// The key is well formed but the signature does not match.
    #[error("signature verification failed")]
    VerificationFailed,

    /// The key bytes are not a valid Ed25519 point.
    #[error("invalid public key")]
    InvalidPublicKey,
}

/// Verify an Ed25519 signature. Returns `true` only for a valid signature.
///
/// # Example
///
/// ```
/// use veil_protocol::crypto::{verify, VeilKeypair};
///
/// let keypair = VeilKeypair::generate();
/// let signature = keypair.sign(b"permit");
/// assert!(verify(&keypair.public_key(), b"permit", &signature));
/// ```
pub fn verify(public_key: &VeilPublicKey, message: &[u8], signature: &VeilSignature) -> bool {
    verify_raw(public_key.as_bytes(), message, signature.as_bytes()).is_ok()
}

/// Verify a signature from raw byte components, reporting why it failed.
pub fn verify_raw(
    public_key_bytes: &[u8; 32],
    message: &[u8],
    signature_bytes: &[u8; 64],
) -> Result<(), SignatureError> {
    let verifying_key =
        VerifyingKey::from_bytes(public_key_bytes).map_err(|_| SignatureError::InvalidPublicKey)?;

    let signature = DalekSignature::from_bytes(signature_bytes);

    verifying_key
        .verify(message, &signature)
        .map_err(|_| SignatureError::VerificationFailed)
}
