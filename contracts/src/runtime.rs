//! # Contract Runtime
//!
//! The in-process stand-in for the chain the contracts run on. It owns
//! everything that is not contract state:
//!
//! - a monotonic clock in unix seconds,
//! - native value balances,
//! - deployed fee tokens,
//! - receiver hooks, i.e. code that runs when native value arrives at an
//!   address and may call back into the paying contract,
//! - the event log.
//!
//! ## Atomic calls
//!
//! [`Runtime::atomically`] is the transaction boundary. It snapshots the
//! calling contract's state and the runtime's balances, tokens and log
//! length, runs the operation, and restores all of it if the operation
//! returns `Err`. Receiver hooks are external code and are never rolled
//! back. Nested calls (a hook calling back into a contract) get their own
//! boundary, so a rejected nested call cannot corrupt its caller.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tracing::{debug, trace};

use veil_protocol::identity::Address;
use veil_protocol::token::PermitToken;

use crate::commitment_ledger::CommitmentLedger;
use crate::events::{Event, LogEntry, Topic};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by the runtime itself.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    /// The sender does not hold enough native value.
    #[error("insufficient funds: {account} has {available}, needs {requested}")]
    InsufficientFunds {
        /// Account being debited.
        account: Address,
        /// Its balance.
        available: u128,
        /// Amount requested.
        requested: u128,
    },

    /// Crediting would overflow a balance.
    #[error("balance overflow crediting {account}")]
    BalanceOverflow {
        /// Account being credited.
        account: Address,
    },

    /// The clock only moves forward.
    #[error("clock cannot move backwards: now {now}, requested {requested}")]
    ClockRewind {
        /// Current time.
        now: u64,
        /// Requested time.
        requested: u64,
    },

    /// No token is deployed at this address.
    #[error("no token deployed at {0}")]
    UnknownToken(Address),

    /// A token is already deployed at this address.
    #[error("address {0} already hosts a token")]
    TokenExists(Address),

    /// The receiving address refused the value.
    #[error("{recipient} rejected the transfer: {reason}")]
    Rejected {
        /// Address that refused.
        recipient: Address,
        /// Reason given by the receiver hook.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Receiver hooks
// ---------------------------------------------------------------------------

/// Code that runs when a commitment ledger pays native value to an address.
///
/// The hook gets the paying ledger and the runtime, so it can call back into
/// the ledger before the payout returns. Returning `Err` refuses the value;
/// the payout then fails and the surrounding call is rolled back.
pub trait ValueReceiver {
    /// Called after the value has been credited to the receiving address.
    fn on_value_received(
        &mut self,
        ledger: &mut CommitmentLedger,
        rt: &mut Runtime,
        amount: u128,
    ) -> Result<(), String>;
}

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// State the runtime restores when an atomic call fails.
struct WorldSnapshot {
    native: HashMap<Address, u128>,
    tokens: HashMap<Address, PermitToken>,
    log_len: usize,
}

/// Clock, balances, tokens, receiver hooks and the event log.
pub struct Runtime {
    now: u64,
    native: HashMap<Address, u128>,
    tokens: HashMap<Address, PermitToken>,
    receivers: HashMap<Address, Box<dyn ValueReceiver>>,
    logs: Vec<LogEntry>,
}

impl Runtime {
    /// Creates an empty runtime with the clock at `now`.
    pub fn new(now: u64) -> Self {
        Self {
            now,
            native: HashMap::new(),
            tokens: HashMap::new(),
            receivers: HashMap::new(),
            logs: Vec::new(),
        }
    }

    // -- Clock --

    /// Current time in unix seconds.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Moves the clock forward by `secs`, saturating at `u64::MAX`.
    pub fn advance(&mut self, secs: u64) {
        self.now = self.now.saturating_add(secs);
    }

    /// Sets the clock to `time`, which must not be in the past.
    pub fn set_time(&mut self, time: u64) -> Result<(), RuntimeError> {
        if time < self.now {
            return Err(RuntimeError::ClockRewind {
                now: self.now,
                requested: time,
            });
        }
        self.now = time;
        Ok(())
    }

    // -- Native value --

    /// Native balance of `account`.
    pub fn native_balance(&self, account: &Address) -> u128 {
        self.native.get(account).copied().unwrap_or(0)
    }

    /// Creates native value out of thin air. Genesis and tests only.
    pub fn mint_native(&mut self, to: &Address, amount: u128) -> Result<(), RuntimeError> {
        let balance = self
            .native_balance(to)
            .checked_add(amount)
            .ok_or(RuntimeError::BalanceOverflow { account: *to })?;
        self.native.insert(*to, balance);
        Ok(())
    }

    /// Moves native value without invoking any receiver hook.
    pub fn move_value(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), RuntimeError> {
        let available = self.native_balance(from);
        if available < amount {
            return Err(RuntimeError::InsufficientFunds {
                account: *from,
                available,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = self
            .native_balance(to)
            .checked_add(amount)
            .ok_or(RuntimeError::BalanceOverflow { account: *to })?;
        self.native.insert(*from, available - amount);
        self.native.insert(*to, credited);
        Ok(())
    }

    /// Pays `amount` from the ledger's balance to `to`, then runs `to`'s
    /// receiver hook, if any.
    ///
    /// The hook is taken out of the registry while it runs, so it may freely
    /// call back into the ledger. A refusal is reported as
    /// [`RuntimeError::Rejected`]; undoing the credit is left to the
    /// enclosing atomic call.
    pub fn pay_out(
        &mut self,
        ledger: &mut CommitmentLedger,
        to: &Address,
        amount: u128,
    ) -> Result<(), RuntimeError> {
        self.move_value(&ledger.address(), to, amount)?;

        let Some(mut hook) = self.receivers.remove(to) else {
            return Ok(());
        };
        trace!(recipient = %to, amount, "invoking receiver hook");
        let outcome = hook.on_value_received(ledger, self, amount);
        self.receivers.entry(*to).or_insert(hook);

        outcome.map_err(|reason| RuntimeError::Rejected {
            recipient: *to,
            reason,
        })
    }

    /// Installs a hook that runs whenever a ledger pays `address`.
    pub fn register_receiver(&mut self, address: Address, receiver: Box<dyn ValueReceiver>) {
        self.receivers.insert(address, receiver);
    }

    /// Removes the hook for `address`, returning it.
    pub fn remove_receiver(&mut self, address: &Address) -> Option<Box<dyn ValueReceiver>> {
        self.receivers.remove(address)
    }

    // -- Tokens --

    /// Deploys a token at its own address.
    pub fn deploy_token(&mut self, token: PermitToken) -> Result<Address, RuntimeError> {
        let address = token.address();
        if self.tokens.contains_key(&address) {
            return Err(RuntimeError::TokenExists(address));
        }
        self.tokens.insert(address, token);
        Ok(address)
    }

    /// Read access to a deployed token.
    pub fn token(&self, address: &Address) -> Option<&PermitToken> {
        self.tokens.get(address)
    }

    /// Write access to a deployed token.
    pub fn token_mut(&mut self, address: &Address) -> Result<&mut PermitToken, RuntimeError> {
        self.tokens
            .get_mut(address)
            .ok_or(RuntimeError::UnknownToken(*address))
    }

    // -- Events --

    /// Appends an event to the log.
    pub fn emit(&mut self, emitter: Address, event: Event) {
        debug!(emitter = %emitter, event = %event, "event emitted");
        self.logs.push(LogEntry::new(emitter, event));
    }

    /// The full event log, oldest first.
    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    /// Events carrying `topic` among their indexed fields.
    pub fn logs_with_topic<'a>(&'a self, topic: &'a Topic) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.logs.iter().filter(move |entry| entry.topics.contains(topic))
    }

    // -- Transactions --

    /// Runs `op` against `state` as one all-or-nothing call.
    ///
    /// On `Err`, `state`, native balances, tokens and the event log are put
    /// back exactly as they were before `op` started.
    pub fn atomically<S, T, E>(
        &mut self,
        state: &mut S,
        op: impl FnOnce(&mut S, &mut Runtime) -> Result<T, E>,
    ) -> Result<T, E>
    where
        S: Clone,
    {
        let saved_state = state.clone();
        let saved_world = self.snapshot();

        match op(state, self) {
            Ok(value) => Ok(value),
            Err(err) => {
                *state = saved_state;
                self.restore(saved_world);
                Err(err)
            }
        }
    }

    fn snapshot(&self) -> WorldSnapshot {
        WorldSnapshot {
            native: self.native.clone(),
            tokens: self.tokens.clone(),
            log_len: self.logs.len(),
        }
    }

    fn restore(&mut self, snapshot: WorldSnapshot) {
        let discarded = self.logs.len().saturating_sub(snapshot.log_len);
        self.native = snapshot.native;
        self.tokens = snapshot.tokens;
        self.logs.truncate(snapshot.log_len);
        trace!(discarded_events = discarded, "call rolled back");
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("now", &self.now)
            .field("accounts", &self.native.len())
            .field("tokens", &self.tokens.len())
            .field("receivers", &self.receivers.len())
            .field("logs", &self.logs.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_monotonic() {
        let mut rt = Runtime::new(100);
        rt.advance(50);
        assert_eq!(rt.now(), 150);
        assert!(rt.set_time(200).is_ok());
        assert_eq!(
            rt.set_time(199),
            Err(RuntimeError::ClockRewind { now: 200, requested: 199 })
        );
    }

    #[test]
    fn move_value_checks_balance() {
        let mut rt = Runtime::default();
        let a = Address::from_label("a");
        let b = Address::from_label("b");
        rt.mint_native(&a, 10).unwrap();
        rt.move_value(&a, &b, 4).unwrap();
        assert_eq!(rt.native_balance(&a), 6);
        assert_eq!(rt.native_balance(&b), 4);
        assert!(matches!(
            rt.move_value(&a, &b, 7),
            Err(RuntimeError::InsufficientFunds { available: 6, .. })
        ));
    }

    #[test]
    fn atomically_rolls_back_everything_on_error() {
        let mut rt = Runtime::default();
        let a = Address::from_label("a");
        let b = Address::from_label("b");
        rt.mint_native(&a, 10).unwrap();
        let mut counter = 0u32;

        let result: Result<(), &str> = rt.atomically(&mut counter, |c, rt| {
            *c += 1;
            rt.move_value(&a, &b, 10).unwrap();
            rt.emit(a, Event::FeesPaused { until: 1 });
            Err("boom")
        });

        assert_eq!(result, Err("boom"));
        assert_eq!(counter, 0);
        assert_eq!(rt.native_balance(&a), 10);
        assert_eq!(rt.native_balance(&b), 0);
        assert!(rt.logs().is_empty());
    }

    #[test]
    fn atomically_keeps_effects_on_success() {
        let mut rt = Runtime::default();
        let a = Address::from_label("a");
        let mut counter = 0u32;
        let out: Result<u32, ()> = rt.atomically(&mut counter, |c, rt| {
            *c += 2;
            rt.emit(a, Event::FeesUnpaused { automatic: false });
            Ok(*c)
        });
        assert_eq!(out, Ok(2));
        assert_eq!(counter, 2);
        assert_eq!(rt.logs().len(), 1);
    }

    #[test]
    fn duplicate_token_deploy_is_rejected() {
        let mut rt = Runtime::default();
        let addr = Address::from_label("token");
        rt.deploy_token(PermitToken::new(addr, "VEIL")).unwrap();
        assert_eq!(
            rt.deploy_token(PermitToken::new(addr, "VEIL")),
            Err(RuntimeError::TokenExists(addr))
        );
        assert!(rt.token_mut(&Address::from_label("nope")).is_err());
    }
}
