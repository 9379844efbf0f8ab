//! # Fee Token
//!
//! A fungible token with standing allowances and signed permits. This is
//! the asset announcement fees are paid in. It knows nothing about fees;
//! it only moves balances and tracks who may spend on whose behalf.
//!
//! ## Allowances
//!
//! `approve(owner, spender, amount)` overwrites the allowance. An allowance
//! of `u128::MAX` is treated as unlimited and is not decremented by
//! `transfer_from`.
//!
//! ## Permits
//!
//! [`PermitToken::permit`] sets an allowance from a signature instead of an
//! owner-submitted `approve`. See [`permit`] for the signed message format.

pub mod permit;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::crypto::signatures::verify_raw;
use crate::identity::Address;

pub use permit::{permit_digest, PermitAuthorization, PermitSignature};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by token operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    /// The sender does not hold enough tokens.
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Current balance of the sender.
        available: u128,
        /// Amount requested.
        requested: u128,
    },

    /// The spender's allowance does not cover the transfer.
    #[error("insufficient allowance: allowed {allowed}, requested {requested}")]
    InsufficientAllowance {
        /// Current allowance.
        allowed: u128,
        /// Amount requested.
        requested: u128,
    },

    /// Minting would overflow the supply or a balance.
    #[error("supply overflow")]
    SupplyOverflow,

    /// A transfer or approval names the null address.
    #[error("zero address not allowed")]
    ZeroAddress,

    /// The permit deadline has passed.
    #[error("permit expired at {deadline}, now {now}")]
    PermitExpired {
        /// Deadline carried by the permit.
        deadline: u64,
        /// Time the permit was submitted.
        now: u64,
    },

    /// The signature does not match the owner, or was already consumed.
    #[error("invalid permit signature")]
    InvalidPermitSignature,
}

// ---------------------------------------------------------------------------
// PermitToken
// ---------------------------------------------------------------------------

/// In-memory token ledger with allowances and permit nonces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermitToken {
    address: Address,
    symbol: String,
    total_supply: u128,
    balances: HashMap<Address, u128>,
    /// `owner -> (spender -> amount)`.
    allowances: HashMap<Address, HashMap<Address, u128>>,
    nonces: HashMap<Address, u64>,
}

impl PermitToken {
    /// Creates an empty token deployed at `address`.
    pub fn new(address: Address, symbol: impl Into<String>) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            total_supply: 0,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            nonces: HashMap::new(),
        }
    }

    /// The token's own address; part of every permit digest.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Ticker symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Total tokens in existence.
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Balance of `account`, zero if unknown.
    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Remaining amount `spender` may move out of `owner`'s balance.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// The nonce the next permit signed by `owner` must carry.
    pub fn nonce_of(&self, owner: &Address) -> u64 {
        self.nonces.get(owner).copied().unwrap_or(0)
    }

    /// Creates `amount` new tokens in `to`'s balance.
    pub fn mint(&mut self, to: &Address, amount: u128) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow)?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow)?;
        self.total_supply = supply;
        self.balances.insert(*to, balance);
        Ok(())
    }

    /// Moves tokens from `from` to `to`.
    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), TokenError> {
        if to.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        let available = self.balance_of(from);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        // Cannot overflow: total supply bounds every balance.
        self.balances.insert(*from, available - amount);
        *self.balances.entry(*to).or_insert(0) += amount;
        Ok(())
    }

    /// Sets `spender`'s allowance over `owner`'s tokens.
    pub fn approve(&mut self, owner: &Address, spender: &Address, amount: u128) -> Result<(), TokenError> {
        if spender.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        self.allowances
            .entry(*owner)
            .or_default()
            .insert(*spender, amount);
        Ok(())
    }

    /// Moves tokens from `from` to `to` on `spender`'s standing allowance.
    ///
    /// Both the allowance and the balance are checked before anything moves.
    pub fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: u128,
    ) -> Result<(), TokenError> {
        let allowed = self.allowance(from, spender);
        if allowed < amount {
            return Err(TokenError::InsufficientAllowance {
                allowed,
                requested: amount,
            });
        }
        self.transfer(from, to, amount)?;
        if allowed != u128::MAX {
            self.allowances
                .entry(*from)
                .or_default()
                .insert(*spender, allowed - amount);
        }
        Ok(())
    }

    /// Consumes a signed permit, setting `allowance[owner][spender]`.
    ///
    /// Fails if the deadline is behind `now`, if the signer's address is not
    /// `owner`, or if the signature does not cover the owner's current nonce
    /// (which is how a replayed permit fails).
    pub fn permit(
        &mut self,
        now: u64,
        owner: &Address,
        spender: &Address,
        authorization: &PermitAuthorization,
    ) -> Result<(), TokenError> {
        if spender.is_zero() {
            return Err(TokenError::ZeroAddress);
        }
        if now > authorization.deadline {
            return Err(TokenError::PermitExpired {
                deadline: authorization.deadline,
                now,
            });
        }
        let signed = &authorization.signature;
        if Address::from_public_key(&signed.signer) != *owner {
            return Err(TokenError::InvalidPermitSignature);
        }
        let nonce = self.nonce_of(owner);
        let digest = permit_digest(
            &self.address,
            owner,
            spender,
            authorization.value,
            nonce,
            authorization.deadline,
        );
        if let Err(reason) = verify_raw(signed.signer.as_bytes(), &digest, signed.signature.as_bytes()) {
            debug!(owner = %owner, nonce, %reason, "permit rejected");
            return Err(TokenError::InvalidPermitSignature);
        }

        self.nonces.insert(*owner, nonce + 1);
        self.approve(owner, spender, authorization.value)?;
        debug!(owner = %owner, spender = %spender, value = authorization.value, nonce, "permit consumed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::{VeilKeypair, VeilPublicKey};

    fn token() -> PermitToken {
        PermitToken::new(Address::from_label("fee-token"), "VEIL")
    }

    #[test]
    fn mint_and_transfer() {
        let mut t = token();
        let alice = Address::from_label("alice");
        let bob = Address::from_label("bob");
        t.mint(&alice, 100).unwrap();
        t.transfer(&alice, &bob, 40).unwrap();
        assert_eq!(t.balance_of(&alice), 60);
        assert_eq!(t.balance_of(&bob), 40);
        assert_eq!(t.total_supply(), 100);
        assert!(matches!(
            t.transfer(&alice, &bob, 61),
            Err(TokenError::InsufficientBalance { available: 60, requested: 61 })
        ));
    }

    #[test]
    fn transfer_from_spends_allowance() {
        let mut t = token();
        let owner = Address::from_label("owner");
        let spender = Address::from_label("spender");
        let sink = Address::from_label("sink");
        t.mint(&owner, 100).unwrap();
        t.approve(&owner, &spender, 30).unwrap();
        t.transfer_from(&spender, &owner, &sink, 20).unwrap();
        assert_eq!(t.allowance(&owner, &spender), 10);
        assert!(matches!(
            t.transfer_from(&spender, &owner, &sink, 11),
            Err(TokenError::InsufficientAllowance { allowed: 10, .. })
        ));
    }

    #[test]
    fn unlimited_allowance_is_not_decremented() {
        let mut t = token();
        let owner = Address::from_label("owner");
        let spender = Address::from_label("spender");
        t.mint(&owner, 100).unwrap();
        t.approve(&owner, &spender, u128::MAX).unwrap();
        t.transfer_from(&spender, &owner, &spender, 50).unwrap();
        assert_eq!(t.allowance(&owner, &spender), u128::MAX);
    }

    #[test]
    fn failed_transfer_from_keeps_allowance() {
        let mut t = token();
        let owner = Address::from_label("owner");
        let spender = Address::from_label("spender");
        t.mint(&owner, 5).unwrap();
        t.approve(&owner, &spender, 50).unwrap();
        assert!(t.transfer_from(&spender, &owner, &spender, 10).is_err());
        assert_eq!(t.allowance(&owner, &spender), 50);
    }

    #[test]
    fn permit_sets_allowance_once() {
        let mut t = token();
        let kp = VeilKeypair::from_seed(&[4u8; 32]);
        let owner = kp.address();
        let spender = Address::from_label("spender");
        let auth = PermitAuthorization::sign(&kp, &t.address(), &spender, 77, 0, 1_000);

        t.permit(500, &owner, &spender, &auth).unwrap();
        assert_eq!(t.allowance(&owner, &spender), 77);
        assert_eq!(t.nonce_of(&owner), 1);

        // Replaying the same permit hits the bumped nonce.
        assert_eq!(
            t.permit(500, &owner, &spender, &auth),
            Err(TokenError::InvalidPermitSignature)
        );
    }

    #[test]
    fn permit_rejects_expired_and_foreign_signer() {
        let mut t = token();
        let kp = VeilKeypair::from_seed(&[4u8; 32]);
        let spender = Address::from_label("spender");
        let auth = PermitAuthorization::sign(&kp, &t.address(), &spender, 1, 0, 100);

        assert!(matches!(
            t.permit(101, &kp.address(), &spender, &auth),
            Err(TokenError::PermitExpired { deadline: 100, now: 101 })
        ));
        let someone_else = Address::from_label("mallory");
        assert_eq!(
            t.permit(50, &someone_else, &spender, &auth),
            Err(TokenError::InvalidPermitSignature)
        );
        assert_eq!(t.nonce_of(&kp.address()), 0);
    }

    #[test]
    fn permit_for_other_token_is_rejected() {
        let mut t = token();
        let kp = VeilKeypair::from_seed(&[6u8; 32]);
        let spender = Address::from_label("spender");
        let other = Address::from_label("other-token");
        let auth = PermitAuthorization::sign(&kp, &other, &spender, 1, 0, 100);
        assert_eq!(
            t.permit(0, &kp.address(), &spender, &auth),
            Err(TokenError::InvalidPermitSignature)
        );
    }

    #[test]
    fn permit_from_off_curve_key_is_rejected() {
        let mut t = token();
        let kp = VeilKeypair::from_seed(&[6u8; 32]);
        let spender = Address::from_label("spender");
        let mut auth = PermitAuthorization::sign(&kp, &t.address(), &spender, 1, 0, 100);

        // Encodes y = 2, which is not on the curve.
        let mut key = [0u8; 32];
        key[0] = 2;
        auth.signature.signer = VeilPublicKey::from_bytes(key);
        let owner = Address::from_public_key(&auth.signature.signer);

        assert_eq!(
            t.permit(0, &owner, &spender, &auth),
            Err(TokenError::InvalidPermitSignature)
        );
        assert_eq!(t.nonce_of(&owner), 0);
        assert_eq!(t.allowance(&owner, &spender), 0);
    }
}
