//! # Commitment Ledger
//!
//! Escrow keyed by commitment hash. A payer locks native value against
//! `BLAKE3(secret || recipient)`; whoever can present the secret *from the
//! recipient account* claims it.
//!
//! ## Lifecycle of a commitment
//!
//! 1. **Deposit**: value goes from zero to the deposited amount. A hash
//!    that already holds value cannot be deposited against again.
//! 2. **Claim**: the entry is zeroed first, then the value is paid out.
//!    If the payout fails the whole claim is rolled back, zeroing included.
//! 3. **Reuse**: once zero, the hash may be deposited against again.
//!
//! ## Why zero before paying
//!
//! The payout can run receiver code that calls back in. That code sees the
//! commitment already at zero, and the instance-wide reentrancy guard turns
//! the nested claim into an error anyway. Rolling back on failure keeps the
//! early zeroing from ever losing value.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use veil_protocol::config::MAX_BATCH_SIZE;
use veil_protocol::crypto::{commitment_hash, CommitmentHash};
use veil_protocol::identity::Address;

use crate::events::Event;
use crate::guard::{ReentrancyGuard, ReentrancyViolation};
use crate::runtime::{Runtime, RuntimeError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during ledger operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// A deposit carried no value.
    #[error("deposit must carry value")]
    NoValue,

    /// The hash already holds an unclaimed deposit.
    #[error("commitment {0} already holds value")]
    HashAlreadyUsed(CommitmentHash),

    /// Value sent outside `deposit`.
    #[error("plain transfers are not accepted, use deposit")]
    UseDeposit,

    /// No claimable value for the given secret and caller.
    #[error("nothing to withdraw")]
    NothingToWithdraw,

    /// A batch exceeded the size limit.
    #[error("batch of {len} exceeds the limit of {max}")]
    TooMany {
        /// Submitted batch length.
        len: usize,
        /// Maximum allowed.
        max: usize,
    },

    /// Summing a batch overflowed.
    #[error("amount overflow while summing batch")]
    AmountOverflow,

    /// The depositor cannot cover the deposit.
    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        /// Depositor's balance.
        available: u128,
        /// Amount of the deposit.
        requested: u128,
    },

    /// The payout to the claimant failed.
    #[error("transfer failed: {0}")]
    TransferFailed(String),

    /// A guarded call arrived while another was in flight.
    #[error(transparent)]
    Reentrancy(#[from] ReentrancyViolation),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Result of a successful batch withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    /// Secrets whose commitment held value and was claimed.
    pub claimed: u32,
    /// Secrets whose commitment was empty and was skipped.
    pub skipped: u32,
    /// Sum paid out.
    pub total: u128,
}

/// The commitment escrow contract.
#[derive(Debug, Clone)]
pub struct CommitmentLedger {
    address: Address,
    /// Only nonzero values are stored; absence means zero.
    commitments: HashMap<CommitmentHash, u128>,
    guard: ReentrancyGuard,
}

impl CommitmentLedger {
    /// Creates an empty ledger whose native balance lives at `address`.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            commitments: HashMap::new(),
            guard: ReentrancyGuard::new(),
        }
    }

    /// The ledger's own account in the runtime.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Locks `amount` of the caller's native value against `hash`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NoValue`] for a zero amount,
    /// [`LedgerError::HashAlreadyUsed`] if `hash` still holds value and
    /// [`LedgerError::InsufficientFunds`] if the caller cannot pay.
    pub fn deposit(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        hash: CommitmentHash,
        amount: u128,
    ) -> Result<(), LedgerError> {
        rt.atomically(self, |ledger, rt| {
            if amount == 0 {
                return Err(LedgerError::NoValue);
            }
            if ledger.balance_of(&hash) != 0 {
                return Err(LedgerError::HashAlreadyUsed(hash));
            }

            rt.move_value(&caller, &ledger.address, amount)
                .map_err(|err| match err {
                    RuntimeError::InsufficientFunds {
                        available,
                        requested,
                        ..
                    } => LedgerError::InsufficientFunds {
                        available,
                        requested,
                    },
                    other => LedgerError::TransferFailed(other.to_string()),
                })?;
            ledger.commitments.insert(hash, amount);

            rt.emit(
                ledger.address,
                Event::Deposited {
                    hash,
                    amount,
                    depositor: caller,
                },
            );
            info!(hash = %hash, amount, "commitment funded");
            Ok(())
        })
    }

    /// Entry point for value sent without calling `deposit`. Always refused:
    /// value that is not tied to a commitment could never be claimed.
    pub fn receive_plain(&self, caller: Address, amount: u128) -> Result<(), LedgerError> {
        debug!(sender = %caller, amount, "plain transfer refused");
        Err(LedgerError::UseDeposit)
    }

    /// Claims the commitment `compute_hash(secret, caller)` and pays it to
    /// the caller. Returns the amount paid.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Reentrancy`] if called from inside another guarded call.
    /// - [`LedgerError::NothingToWithdraw`] if the commitment is empty.
    /// - [`LedgerError::TransferFailed`] if the payout is refused; the
    ///   commitment keeps its value.
    pub fn withdraw(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        secret: &[u8],
    ) -> Result<u128, LedgerError> {
        rt.atomically(self, |ledger, rt| {
            ledger.guard.enter()?;

            let hash = Self::compute_hash(secret, &caller);
            let amount = ledger
                .commitments
                .remove(&hash)
                .ok_or(LedgerError::NothingToWithdraw)?;

            ledger.send(rt, &caller, amount)?;
            rt.emit(
                ledger.address,
                Event::Withdrawn {
                    hash,
                    amount,
                    recipient: caller,
                },
            );
            info!(hash = %hash, recipient = %caller, amount, "commitment claimed");

            ledger.guard.exit();
            Ok(amount)
        })
    }

    /// Claims every non-empty commitment among `secrets` for the caller and
    /// pays the sum in one transfer.
    ///
    /// Empty commitments are skipped, not treated as errors. The call fails
    /// only if the batch is empty or oversized, nothing at all was claimable,
    /// the sum overflows, or the aggregate payout is refused; in each case
    /// nothing is claimed.
    pub fn batch_withdraw<S: AsRef<[u8]>>(
        &mut self,
        rt: &mut Runtime,
        caller: Address,
        secrets: &[S],
    ) -> Result<BatchOutcome, LedgerError> {
        rt.atomically(self, |ledger, rt| {
            ledger.guard.enter()?;

            if secrets.is_empty() {
                return Err(LedgerError::NothingToWithdraw);
            }
            if secrets.len() > MAX_BATCH_SIZE {
                return Err(LedgerError::TooMany {
                    len: secrets.len(),
                    max: MAX_BATCH_SIZE,
                });
            }

            let mut outcome = BatchOutcome {
                claimed: 0,
                skipped: 0,
                total: 0,
            };
            for secret in secrets {
                let hash = Self::compute_hash(secret.as_ref(), &caller);
                let Some(amount) = ledger.commitments.remove(&hash) else {
                    debug!(hash = %hash, "empty commitment skipped");
                    outcome.skipped += 1;
                    continue;
                };
                outcome.total = outcome
                    .total
                    .checked_add(amount)
                    .ok_or(LedgerError::AmountOverflow)?;
                outcome.claimed += 1;
                rt.emit(
                    ledger.address,
                    Event::Withdrawn {
                        hash,
                        amount,
                        recipient: caller,
                    },
                );
            }

            if outcome.claimed == 0 {
                return Err(LedgerError::NothingToWithdraw);
            }

            ledger.send(rt, &caller, outcome.total)?;
            rt.emit(
                ledger.address,
                Event::BatchWithdrawn {
                    recipient: caller,
                    count: outcome.claimed,
                    total_amount: outcome.total,
                },
            );
            info!(
                recipient = %caller,
                claimed = outcome.claimed,
                skipped = outcome.skipped,
                total = outcome.total,
                "batch claimed"
            );

            ledger.guard.exit();
            Ok(outcome)
        })
    }

    /// Value locked against `hash`; zero if never funded or already claimed.
    pub fn balance_of(&self, hash: &CommitmentHash) -> u128 {
        self.commitments.get(hash).copied().unwrap_or(0)
    }

    /// The exact digest the ledger uses to key commitments.
    ///
    /// Payers use it to build a commitment before depositing.
    pub fn compute_hash(secret: &[u8], recipient: &Address) -> CommitmentHash {
        commitment_hash(secret, recipient)
    }

    /// Number of commitments currently holding value.
    pub fn open_commitments(&self) -> usize {
        self.commitments.len()
    }

    /// `true` while a guarded call is in flight.
    pub fn is_locked(&self) -> bool {
        self.guard.is_held()
    }

    fn send(&mut self, rt: &mut Runtime, to: &Address, amount: u128) -> Result<(), LedgerError> {
        rt.pay_out(self, to, amount).map_err(|err| {
            warn!(recipient = %to, amount, error = %err, "payout failed, rolling back claim");
            LedgerError::TransferFailed(err.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Runtime, CommitmentLedger, Address) {
        let mut rt = Runtime::new(1_700_000_000);
        let payer = Address::from_label("payer");
        rt.mint_native(&payer, 1_000).unwrap();
        (rt, CommitmentLedger::new(Address::from_label("ledger")), payer)
    }

    #[test]
    fn deposit_then_balance() {
        let (mut rt, mut ledger, payer) = setup();
        let hash = CommitmentLedger::compute_hash(b"s", &Address::from_label("payee"));
        ledger.deposit(&mut rt, payer, hash, 250).unwrap();
        assert_eq!(ledger.balance_of(&hash), 250);
        assert_eq!(rt.native_balance(&ledger.address()), 250);
        assert_eq!(rt.native_balance(&payer), 750);
    }

    #[test]
    fn zero_deposit_rejected() {
        let (mut rt, mut ledger, payer) = setup();
        let hash = CommitmentLedger::compute_hash(b"s", &payer);
        assert_eq!(
            ledger.deposit(&mut rt, payer, hash, 0),
            Err(LedgerError::NoValue)
        );
    }

    #[test]
    fn underfunded_deposit_rejected_without_effects() {
        let (mut rt, mut ledger, payer) = setup();
        let hash = CommitmentLedger::compute_hash(b"s", &payer);
        assert_eq!(
            ledger.deposit(&mut rt, payer, hash, 1_001),
            Err(LedgerError::InsufficientFunds {
                available: 1_000,
                requested: 1_001
            })
        );
        assert_eq!(ledger.balance_of(&hash), 0);
        assert!(rt.logs().is_empty());
    }

    #[test]
    fn plain_transfer_refused() {
        let (_, ledger, payer) = setup();
        assert_eq!(ledger.receive_plain(payer, 1), Err(LedgerError::UseDeposit));
    }

    #[test]
    fn withdraw_releases_guard() {
        let (mut rt, mut ledger, payer) = setup();
        let payee = Address::from_label("payee");
        let hash = CommitmentLedger::compute_hash(b"s", &payee);
        ledger.deposit(&mut rt, payer, hash, 10).unwrap();
        assert_eq!(ledger.withdraw(&mut rt, payee, b"s"), Ok(10));
        assert!(!ledger.is_locked());
        assert_eq!(ledger.open_commitments(), 0);
    }

    #[test]
    fn failed_withdraw_releases_guard() {
        let (mut rt, mut ledger, _) = setup();
        assert_eq!(
            ledger.withdraw(&mut rt, Address::from_label("x"), b"nope"),
            Err(LedgerError::NothingToWithdraw)
        );
        assert!(!ledger.is_locked());
    }

    #[test]
    fn batch_size_limit() {
        let (mut rt, mut ledger, payer) = setup();
        let secrets = vec![vec![1u8]; MAX_BATCH_SIZE + 1];
        assert_eq!(
            ledger.batch_withdraw(&mut rt, payer, &secrets),
            Err(LedgerError::TooMany {
                len: MAX_BATCH_SIZE + 1,
                max: MAX_BATCH_SIZE
            })
        );
        let empty: Vec<Vec<u8>> = Vec::new();
        assert_eq!(
            ledger.batch_withdraw(&mut rt, payer, &empty),
            Err(LedgerError::NothingToWithdraw)
        );
    }
}
