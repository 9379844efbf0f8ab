//! # Fee Governor
//!
//! The state machine behind the announcement fee. One privileged owner,
//! one fee, at most one pending change, and a pause window that always
//! ends on its own.
//!
//! ```text
//!                initialize                propose
//! Uninitialized ───────────▶ Initialized ─────────▶ Proposed
//!                                 ▲    execute / cancel │
//!                                 └─────────────────────┘
//!
//!          orthogonal:  Active ⇄ Paused   (pause / unpause / window elapsed)
//! ```
//!
//! ## Timing rules
//!
//! - A proposal becomes executable `FEE_CHANGE_DELAY_SECS` after it was made.
//!   It cannot be overwritten, only executed or cancelled.
//! - Two cancellations must be at least `CANCELLATION_COOLDOWN_SECS` apart,
//!   so rapid propose/cancel cycles cannot be used to probe or stall.
//! - A pause lasts at most `MAX_PAUSE_DURATION_SECS`. Fee-charging paths
//!   call [`FeeGovernor::refresh_pause`] first, which lifts an elapsed pause
//!   without any owner involvement.
//!
//! Every mutator validates everything before writing anything.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use veil_protocol::config::{
    CANCELLATION_COOLDOWN_SECS, FEE_CHANGE_DELAY_SECS, MAX_BATCH_SIZE, MAX_FEE,
    MAX_PAUSE_DURATION_SECS,
};
use veil_protocol::identity::Address;

use crate::events::Event;
use crate::runtime::Runtime;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during governance operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GovernanceError {
    /// The caller is not the owner.
    #[error("caller {0} is not the owner")]
    NotOwner(Address),

    /// Ownership cannot go to the null address.
    #[error("invalid owner: zero address")]
    InvalidOwner,

    /// `initialize` already ran.
    #[error("fees already initialized")]
    AlreadyInitialized,

    /// The operation needs fees to be initialized first.
    #[error("fees not initialized")]
    NotInitialized,

    /// The fee token reference is null.
    #[error("invalid fee token: zero address")]
    InvalidFeeToken,

    /// A fee recipient (or exemption account) is the null address.
    #[error("invalid fee recipient: zero address")]
    InvalidFeeRecipient,

    /// Fee above the hard ceiling.
    #[error("fee {fee} exceeds maximum {max}")]
    FeeTooHigh {
        /// Requested fee.
        fee: u128,
        /// The ceiling.
        max: u128,
    },

    /// A proposal is already pending.
    #[error("a fee change is already pending")]
    ProposalPending,

    /// No proposal pending, or its delay has not elapsed.
    #[error("fee change not executable yet")]
    FeeChangeTooSoon,

    /// Nothing to cancel.
    #[error("no fee change pending")]
    NoProposal,

    /// The previous cancellation was too recent.
    #[error("cancellation cooldown active until {until}")]
    CooldownActive {
        /// Earliest time the next cancellation is accepted.
        until: u64,
    },

    /// Pause duration of zero.
    #[error("pause duration must be positive")]
    InvalidDuration,

    /// Pause longer than the cap.
    #[error("pause of {duration}s exceeds maximum {max}s")]
    PauseTooLong {
        /// Requested duration.
        duration: u64,
        /// The cap.
        max: u64,
    },

    /// Unpause requested while fees are not paused.
    #[error("fees are not paused")]
    NotPaused,

    /// A batch exceeded the size limit.
    #[error("batch of {len} exceeds the limit of {max}")]
    TooMany {
        /// Submitted batch length.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A fee change waiting out its timelock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingFeeChange {
    /// Fee that will apply once executed.
    pub fee: u128,
    /// Earliest execution time.
    pub effective_at: u64,
}

/// Main governance state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GovernorPhase {
    /// `initialize` has not run.
    Uninitialized,
    /// Live, with no pending proposal.
    Initialized,
    /// Live, with a proposal waiting.
    Proposed,
}

/// Fee parameters, exemptions and ownership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeGovernor {
    /// Contract the governor belongs to; emitter of its events.
    contract: Address,
    owner: Address,
    initialized: bool,
    /// Zero while fees are disabled.
    fee_token: Address,
    fee_recipient: Address,
    current_fee: u128,
    pending: Option<PendingFeeChange>,
    last_cancellation_at: Option<u64>,
    /// End of the active pause window, if paused.
    paused_until: Option<u64>,
    exemptions: HashSet<Address>,
}

impl FeeGovernor {
    /// Creates an uninitialized governor owned by `owner`.
    pub fn new(contract: Address, owner: Address) -> Self {
        Self {
            contract,
            owner,
            initialized: false,
            fee_token: Address::ZERO,
            fee_recipient: Address::ZERO,
            current_fee: 0,
            pending: None,
            last_cancellation_at: None,
            paused_until: None,
            exemptions: HashSet::new(),
        }
    }

    fn only_owner(&self, caller: &Address) -> Result<(), GovernanceError> {
        if *caller != self.owner {
            return Err(GovernanceError::NotOwner(*caller));
        }
        Ok(())
    }

    fn only_initialized(&self) -> Result<(), GovernanceError> {
        if !self.initialized {
            return Err(GovernanceError::NotInitialized);
        }
        Ok(())
    }

    fn check_fee(fee: u128) -> Result<(), GovernanceError> {
        if fee > MAX_FEE {
            return Err(GovernanceError::FeeTooHigh { fee, max: MAX_FEE });
        }
        Ok(())
    }

    // -- Mutators --

    /// Sets token, recipient and initial fee in one step. Runs once.
    pub fn initialize(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        token: Address,
        recipient: Address,
        initial_fee: u128,
    ) -> Result<(), GovernanceError> {
        self.only_owner(&caller)?;
        if self.initialized {
            return Err(GovernanceError::AlreadyInitialized);
        }
        if token.is_zero() {
            return Err(GovernanceError::InvalidFeeToken);
        }
        if recipient.is_zero() {
            return Err(GovernanceError::InvalidFeeRecipient);
        }
        Self::check_fee(initial_fee)?;

        let previous_recipient = self.fee_recipient;
        self.fee_token = token;
        self.fee_recipient = recipient;
        self.current_fee = initial_fee;
        self.initialized = true;

        rt.emit(self.contract, Event::FeeTokenSet { token });
        rt.emit(
            self.contract,
            Event::FeeRecipientChanged {
                previous: previous_recipient,
                current: recipient,
            },
        );
        if initial_fee != 0 {
            rt.emit(
                self.contract,
                Event::FeeChanged {
                    previous: 0,
                    current: initial_fee,
                },
            );
        }
        info!(token = %token, recipient = %recipient, fee = initial_fee, "fees initialized");
        Ok(())
    }

    /// Queues a fee change, executable after the timelock.
    pub fn propose_fee_change(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        new_fee: u128,
    ) -> Result<(), GovernanceError> {
        self.only_owner(&caller)?;
        self.only_initialized()?;
        Self::check_fee(new_fee)?;
        if self.pending.is_some() {
            return Err(GovernanceError::ProposalPending);
        }

        let effective_at = rt.now().saturating_add(FEE_CHANGE_DELAY_SECS);
        self.pending = Some(PendingFeeChange {
            fee: new_fee,
            effective_at,
        });

        rt.emit(
            self.contract,
            Event::FeeChangeProposed {
                fee: new_fee,
                effective_at,
            },
        );
        info!(fee = new_fee, effective_at, "fee change proposed");
        Ok(())
    }

    /// Applies the pending change once its delay has passed.
    pub fn execute_fee_change(&mut self, rt: &mut Runtime, caller: Address) -> Result<(), GovernanceError> {
        self.only_owner(&caller)?;
        let change = match self.pending {
            Some(change) if rt.now() >= change.effective_at => change,
            _ => return Err(GovernanceError::FeeChangeTooSoon),
        };

        let previous = self.current_fee;
        self.current_fee = change.fee;
        self.pending = None;

        rt.emit(
            self.contract,
            Event::FeeChanged {
                previous,
                current: change.fee,
            },
        );
        info!(previous, current = change.fee, "fee change executed");
        Ok(())
    }

    /// Drops the pending change, subject to the cancellation cooldown.
    pub fn cancel_fee_change(&mut self, rt: &mut Runtime, caller: Address) -> Result<(), GovernanceError> {
        self.only_owner(&caller)?;
        let change = self.pending.ok_or(GovernanceError::NoProposal)?;
        let now = rt.now();
        if let Some(last) = self.last_cancellation_at {
            let until = last.saturating_add(CANCELLATION_COOLDOWN_SECS);
            if now < until {
                return Err(GovernanceError::CooldownActive { until });
            }
        }

        self.pending = None;
        self.last_cancellation_at = Some(now);

        rt.emit(self.contract, Event::FeeChangeCancelled { fee: change.fee });
        info!(fee = change.fee, "fee change cancelled");
        Ok(())
    }

    /// Points fee payments at a new recipient.
    pub fn set_fee_recipient(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        recipient: Address,
    ) -> Result<(), GovernanceError> {
        self.only_owner(&caller)?;
        self.only_initialized()?;
        if recipient.is_zero() {
            return Err(GovernanceError::InvalidFeeRecipient);
        }

        let previous = self.fee_recipient;
        self.fee_recipient = recipient;
        rt.emit(
            self.contract,
            Event::FeeRecipientChanged {
                previous,
                current: recipient,
            },
        );
        Ok(())
    }

    /// Exempts or un-exempts one account. Allowed before initialization.
    pub fn set_fee_exemption(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        account: Address,
        exempt: bool,
    ) -> Result<(), GovernanceError> {
        self.only_owner(&caller)?;
        if account.is_zero() {
            return Err(GovernanceError::InvalidFeeRecipient);
        }
        self.apply_exemption(rt, account, exempt);
        Ok(())
    }

    /// Exempts or un-exempts many accounts. One null entry rejects the batch.
    pub fn batch_set_fee_exemption(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        accounts: &[Address],
        exempt: bool,
    ) -> Result<(), GovernanceError> {
        self.only_owner(&caller)?;
        if accounts.len() > MAX_BATCH_SIZE {
            return Err(GovernanceError::TooMany {
                len: accounts.len(),
                max: MAX_BATCH_SIZE,
            });
        }
        if accounts.iter().any(Address::is_zero) {
            return Err(GovernanceError::InvalidFeeRecipient);
        }

        for account in accounts {
            self.apply_exemption(rt, *account, exempt);
        }
        info!(count = accounts.len(), exempt, "exemptions updated");
        Ok(())
    }

    fn apply_exemption(&mut self, rt: &mut Runtime, account: Address, exempt: bool) {
        if exempt {
            self.exemptions.insert(account);
        } else {
            self.exemptions.remove(&account);
        }
        rt.emit(self.contract, Event::FeeExemptionSet { account, exempt });
    }

    /// Suspends fee collection for `duration` seconds.
    ///
    /// Pausing while already paused restarts the window from now.
    pub fn pause_fees(&mut self, rt: &mut Runtime, caller: Address, duration: u64) -> Result<(), GovernanceError> {
        self.only_owner(&caller)?;
        self.only_initialized()?;
        if duration == 0 {
            return Err(GovernanceError::InvalidDuration);
        }
        if duration > MAX_PAUSE_DURATION_SECS {
            return Err(GovernanceError::PauseTooLong {
                duration,
                max: MAX_PAUSE_DURATION_SECS,
            });
        }

        let until = rt.now().saturating_add(duration);
        self.paused_until = Some(until);
        rt.emit(self.contract, Event::FeesPaused { until });
        info!(until, "fees paused");
        Ok(())
    }

    /// Lifts a pause before its window ends.
    pub fn unpause_fees(&mut self, rt: &mut Runtime, caller: Address) -> Result<(), GovernanceError> {
        self.only_owner(&caller)?;
        self.only_initialized()?;
        if self.paused_until.take().is_none() {
            return Err(GovernanceError::NotPaused);
        }
        rt.emit(self.contract, Event::FeesUnpaused { automatic: false });
        info!("fees unpaused");
        Ok(())
    }

    /// Clears a pause whose window has elapsed. Returns `true` if it did.
    ///
    /// Called at the start of every fee-charging path.
    pub fn refresh_pause(&mut self, rt: &mut Runtime) -> bool {
        match self.paused_until {
            Some(until) if rt.now() >= until => {
                self.paused_until = None;
                rt.emit(self.contract, Event::FeesUnpaused { automatic: true });
                info!(until, "pause window elapsed, fees resumed");
                true
            }
            _ => false,
        }
    }

    /// Hands the owner role to `new_owner`. Takes effect immediately.
    pub fn transfer_ownership(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        new_owner: Address,
    ) -> Result<(), GovernanceError> {
        self.only_owner(&caller)?;
        if new_owner.is_zero() {
            return Err(GovernanceError::InvalidOwner);
        }
        let previous = self.owner;
        self.owner = new_owner;
        rt.emit(
            self.contract,
            Event::OwnershipTransferred {
                previous,
                current: new_owner,
            },
        );
        info!(previous = %previous, current = %new_owner, "ownership transferred");
        Ok(())
    }

    // -- Views --

    /// Fee `account` would pay, ignoring pauses: zero when fees are disabled
    /// or the account is exempt.
    pub fn effective_fee(&self, account: &Address) -> u128 {
        if !self.fees_enabled() || self.is_exempt(account) {
            return 0;
        }
        self.current_fee
    }

    /// `true` once a pending change has waited out its delay.
    pub fn can_execute_fee_change(&self, now: u64) -> bool {
        self.pending.is_some_and(|change| now >= change.effective_at)
    }

    /// A token is configured and the fee is nonzero.
    pub fn fees_enabled(&self) -> bool {
        !self.fee_token.is_zero() && self.current_fee != 0
    }

    /// Not paused, or the pause window has elapsed.
    pub fn fees_active(&self, now: u64) -> bool {
        self.paused_until.map_or(true, |until| now >= until)
    }

    /// `initialize` has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Current main state.
    pub fn phase(&self) -> GovernorPhase {
        match (self.initialized, self.pending) {
            (false, _) => GovernorPhase::Uninitialized,
            (true, None) => GovernorPhase::Initialized,
            (true, Some(_)) => GovernorPhase::Proposed,
        }
    }

    /// Whether `account` is exempt.
    pub fn is_exempt(&self, account: &Address) -> bool {
        self.exemptions.contains(account)
    }

    /// The privileged identity.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// The fee token, zero if unset.
    pub fn fee_token(&self) -> Address {
        self.fee_token
    }

    /// Where fees go.
    pub fn fee_recipient(&self) -> Address {
        self.fee_recipient
    }

    /// Fee in force.
    pub fn current_fee(&self) -> u128 {
        self.current_fee
    }

    /// The pending proposal, if any.
    pub fn pending_change(&self) -> Option<PendingFeeChange> {
        self.pending
    }

    /// Proposed fee, zero if none pending.
    pub fn pending_fee(&self) -> u128 {
        self.pending.map_or(0, |change| change.fee)
    }

    /// Proposal effective time, zero if none pending.
    pub fn pending_effective_at(&self) -> u64 {
        self.pending.map_or(0, |change| change.effective_at)
    }

    /// Time of the last cancellation, zero if never.
    pub fn last_cancellation_at(&self) -> u64 {
        self.last_cancellation_at.unwrap_or(0)
    }

    /// The pause flag as stored. May still be set after the window elapsed
    /// until the next fee-charging call clears it.
    pub fn is_paused(&self) -> bool {
        self.paused_until.is_some()
    }

    /// End of the pause window, zero if not paused.
    pub fn pause_until(&self) -> u64 {
        self.paused_until.unwrap_or(0)
    }
}
