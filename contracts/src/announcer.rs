//! # Announcer
//!
//! Publishes stealth-payment announcements so recipients can scan for
//! payments addressed to them. Payloads are checked for shape only; whether
//! an ephemeral key is really on the curve is the scanner's problem.
//!
//! Announcing may cost a fee in the governor's fee token. Each call is one
//! atomic unit: a failed fee pull leaves no announcement behind, and a
//! rejected payload leaves the pause window untouched.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use veil_protocol::config::{EPHEMERAL_KEY_LENGTH, MAX_METADATA_LENGTH};
use veil_protocol::identity::Address;
use veil_protocol::token::PermitAuthorization;

use crate::events::Event;
use crate::fee_governor::{FeeGovernor, GovernanceError};
use crate::payment_collector::{collect, CollectionError, CollectionMethod};
use crate::runtime::Runtime;

/// Errors that can occur while announcing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnnounceError {
    /// Stealth address is the null address.
    #[error("invalid stealth address: zero address")]
    InvalidStealthAddress,

    /// Ephemeral key is not a 33-byte compressed point.
    #[error("invalid ephemeral key: expected a 33-byte compressed point")]
    InvalidEphemeralKey,

    /// Metadata is empty or too long.
    #[error("invalid metadata: length {0} outside 1..=1024")]
    InvalidMetadata(usize),

    /// A fee administration call was refused.
    #[error(transparent)]
    Governance(#[from] GovernanceError),

    /// The fee could not be charged.
    #[error(transparent)]
    Collection(#[from] CollectionError),
}

/// One stealth-payment announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    /// Stealth address scheme the sender used.
    pub scheme_id: u32,
    /// One-time address the payment went to.
    pub stealth_address: Address,
    /// Compressed ephemeral public key.
    #[serde(with = "hex::serde")]
    pub ephemeral_pub_key: Vec<u8>,
    /// View tag followed by optional scheme data.
    #[serde(with = "hex::serde")]
    pub metadata: Vec<u8>,
}

impl Announcement {
    /// Checks the payload's shape.
    pub fn validate(&self) -> Result<(), AnnounceError> {
        if self.stealth_address.is_zero() {
            return Err(AnnounceError::InvalidStealthAddress);
        }
        match self.ephemeral_pub_key.first() {
            Some(0x02 | 0x03) if self.ephemeral_pub_key.len() == EPHEMERAL_KEY_LENGTH => {}
            _ => return Err(AnnounceError::InvalidEphemeralKey),
        }
        if self.metadata.is_empty() || self.metadata.len() > MAX_METADATA_LENGTH {
            return Err(AnnounceError::InvalidMetadata(self.metadata.len()));
        }
        Ok(())
    }

    /// First metadata byte, used by scanners to skip most announcements
    /// without doing the full key derivation.
    pub fn view_tag(&self) -> Option<u8> {
        self.metadata.first().copied()
    }
}

/// The announcement contract, with its fee governance.
#[derive(Debug, Clone)]
pub struct Announcer {
    address: Address,
    governor: FeeGovernor,
}

impl Announcer {
    /// Deploys an announcer at `address` owned by `owner`. Fees start
    /// disabled until [`Announcer::initialize_fees`] runs.
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            address,
            governor: FeeGovernor::new(address, owner),
        }
    }

    /// The contract's address, also the spender fees are pulled by.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Read access to fee governance.
    pub fn governor(&self) -> &FeeGovernor {
        &self.governor
    }

    /// Announces, paying any fee from a standing allowance.
    pub fn announce(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        announcement: Announcement,
    ) -> Result<u128, AnnounceError> {
        self.announce_inner(rt, caller, announcement, CollectionMethod::Allowance)
    }

    /// Announces, paying any fee through a signed permit. Falls back to the
    /// standing allowance if the permit cannot be applied.
    pub fn announce_with_permit(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        announcement: Announcement,
        permit: PermitAuthorization,
    ) -> Result<u128, AnnounceError> {
        self.announce_inner(rt, caller, announcement, CollectionMethod::Permit(permit))
    }

    fn announce_inner(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        announcement: Announcement,
        method: CollectionMethod,
    ) -> Result<u128, AnnounceError> {
        let contract = self.address;
        rt.atomically(&mut self.governor, |governor, rt| {
            announcement.validate()?;
            governor.refresh_pause(rt);
            let fee = collect(rt, governor, contract, caller, method)?;

            let Announcement {
                scheme_id,
                stealth_address,
                ephemeral_pub_key,
                metadata,
            } = announcement;
            rt.emit(
                contract,
                Event::Announced {
                    scheme_id,
                    stealth_address,
                    caller,
                    ephemeral_pub_key,
                    metadata,
                },
            );
            info!(scheme_id, stealth = %stealth_address, caller = %caller, fee, "announced");
            Ok(fee)
        })
    }

    // -- Governance --

    /// See [`FeeGovernor::initialize`].
    pub fn initialize_fees(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        token: Address,
        recipient: Address,
        initial_fee: u128,
    ) -> Result<(), GovernanceError> {
        rt.atomically(&mut self.governor, |g, rt| {
            g.initialize(rt, caller, token, recipient, initial_fee)
        })
    }

    /// See [`FeeGovernor::propose_fee_change`].
    pub fn propose_fee_change(&mut self, rt: &mut Runtime, caller: Address, fee: u128) -> Result<(), GovernanceError> {
        rt.atomically(&mut self.governor, |g, rt| g.propose_fee_change(rt, caller, fee))
    }

    /// See [`FeeGovernor::execute_fee_change`].
    pub fn execute_fee_change(&mut self, rt: &mut Runtime, caller: Address) -> Result<(), GovernanceError> {
        rt.atomically(&mut self.governor, |g, rt| g.execute_fee_change(rt, caller))
    }

    /// See [`FeeGovernor::cancel_fee_change`].
    pub fn cancel_fee_change(&mut self, rt: &mut Runtime, caller: Address) -> Result<(), GovernanceError> {
        rt.atomically(&mut self.governor, |g, rt| g.cancel_fee_change(rt, caller))
    }

    /// See [`FeeGovernor::set_fee_recipient`].
    pub fn set_fee_recipient(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        recipient: Address,
    ) -> Result<(), GovernanceError> {
        rt.atomically(&mut self.governor, |g, rt| g.set_fee_recipient(rt, caller, recipient))
    }

    /// See [`FeeGovernor::set_fee_exemption`].
    pub fn set_fee_exemption(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        account: Address,
        exempt: bool,
    ) -> Result<(), GovernanceError> {
        rt.atomically(&mut self.governor, |g, rt| {
            g.set_fee_exemption(rt, caller, account, exempt)
        })
    }

    /// See [`FeeGovernor::batch_set_fee_exemption`].
    pub fn batch_set_fee_exemption(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        accounts: &[Address],
        exempt: bool,
    ) -> Result<(), GovernanceError> {
        rt.atomically(&mut self.governor, |g, rt| {
            g.batch_set_fee_exemption(rt, caller, accounts, exempt)
        })
    }

    /// See [`FeeGovernor::pause_fees`].
    pub fn pause_fees(&mut self, rt: &mut Runtime, caller: Address, duration: u64) -> Result<(), GovernanceError> {
        rt.atomically(&mut self.governor, |g, rt| g.pause_fees(rt, caller, duration))
    }

    /// See [`FeeGovernor::unpause_fees`].
    pub fn unpause_fees(&mut self, rt: &mut Runtime, caller: Address) -> Result<(), GovernanceError> {
        rt.atomically(&mut self.governor, |g, rt| g.unpause_fees(rt, caller))
    }

    /// See [`FeeGovernor::transfer_ownership`].
    pub fn transfer_ownership(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), GovernanceError> {
        rt.atomically(&mut self.governor, |g, rt| g.transfer_ownership(rt, caller, new_owner))
    }
}
