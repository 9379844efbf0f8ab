//! # Reentrancy Guard
//!
//! A single binary lock per contract instance. Guarded operations take it
//! on entry and hand it back on success; a second guarded call arriving
//! while it is held (typically from a receiver hook in the middle of a
//! payout) is rejected with [`ReentrancyViolation`].
//!
//! The guard does not release itself on failure. Failed operations are
//! rolled back by [`Runtime::atomically`](crate::runtime::Runtime::atomically),
//! and the lock lives in the rolled-back state, so it returns to `Free`
//! together with every other effect of the call.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A guarded operation was entered while another was still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("reentrant call: a guarded operation is already in flight")]
pub struct ReentrancyViolation;

/// Lock state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockState {
    /// No guarded operation is running.
    #[default]
    Free,
    /// A guarded operation is running.
    Held,
}

/// Instance-wide mutual exclusion for guarded operations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReentrancyGuard {
    state: LockState,
}

impl ReentrancyGuard {
    /// Creates a free guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock, failing if it is already held.
    pub fn enter(&mut self) -> Result<(), ReentrancyViolation> {
        match self.state {
            LockState::Held => Err(ReentrancyViolation),
            LockState::Free => {
                self.state = LockState::Held;
                Ok(())
            }
        }
    }

    /// Releases the lock.
    pub fn exit(&mut self) {
        self.state = LockState::Free;
    }

    /// `true` while a guarded operation is in flight.
    pub fn is_held(&self) -> bool {
        self.state == LockState::Held
    }
}
