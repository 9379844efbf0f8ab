//! # Permits
//!
//! A permit is a one-shot, signed spending authorization: the owner signs
//! `(token, owner, spender, value, nonce, deadline)` off-path and anyone can
//! submit it to set `allowance[owner][spender] = value` in the same call that
//! spends it.
//!
//! The digest is
//!
//! ```text
//! SHA-256(PERMIT_DOMAIN || token || owner || spender || value_be16 || nonce_be8 || deadline_be8)
//! ```
//!
//! Every field has a fixed width, so the concatenation is unambiguous. The
//! nonce is the owner's current permit nonce on the token; consuming a permit
//! bumps it, which is what makes a permit single-use.

use serde::{Deserialize, Serialize};

use crate::config::PERMIT_DOMAIN;
use crate::crypto::hash::sha256;
use crate::crypto::keys::{VeilKeypair, VeilPublicKey, VeilSignature};
use crate::identity::Address;

/// The signature half of a permit: who signed and what they produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitSignature {
    /// Public key of the signer. Its derived address must be the owner.
    pub signer: VeilPublicKey,
    /// Ed25519 signature over the permit digest.
    pub signature: VeilSignature,
}

/// What the caller hands to a permit-accepting entry point.
///
/// Owner and spender are implied by the call (caller and contract), so they
/// are not carried here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitAuthorization {
    /// Allowance granted to the spender.
    pub value: u128,
    /// Unix seconds after which the permit is void.
    pub deadline: u64,
    /// Signature components.
    pub signature: PermitSignature,
}

/// Computes the permit digest.
pub fn permit_digest(
    token: &Address,
    owner: &Address,
    spender: &Address,
    value: u128,
    nonce: u64,
    deadline: u64,
) -> [u8; 32] {
    let mut message = Vec::with_capacity(PERMIT_DOMAIN.len() + 20 * 3 + 16 + 8 + 8);
    message.extend_from_slice(PERMIT_DOMAIN);
    message.extend_from_slice(token.as_bytes());
    message.extend_from_slice(owner.as_bytes());
    message.extend_from_slice(spender.as_bytes());
    message.extend_from_slice(&value.to_be_bytes());
    message.extend_from_slice(&nonce.to_be_bytes());
    message.extend_from_slice(&deadline.to_be_bytes());
    sha256(&message)
}

impl PermitAuthorization {
    /// Signs a permit with the owner's keypair. The owner is the keypair's
    /// address; `nonce` must be the owner's current nonce on `token`.
    pub fn sign(
        keypair: &VeilKeypair,
        token: &Address,
        spender: &Address,
        value: u128,
        nonce: u64,
        deadline: u64,
    ) -> Self {
        let digest = permit_digest(token, &keypair.address(), spender, value, nonce, deadline);
        Self {
            value,
            deadline,
            signature: PermitSignature {
                signer: keypair.public_key(),
                signature: keypair.sign(&digest),
            },
        }
    }
}
