//! # Veil Contracts
//!
//! Two trust-sensitive contracts and the environment they run in:
//!
//! - **Commitment Ledger**: escrow keyed by `BLAKE3(secret || recipient)`.
//!   A payer locks value against the hash; the bound recipient claims it by
//!   revealing the secret. Claims are exactly-once and reentrancy-guarded.
//! - **Announcer**: publishes stealth-payment announcements and charges an
//!   optional fee for doing so. The fee is governed by a timelocked state
//!   machine with exemptions and bounded pause windows.
//! - **Runtime**: clock, native balances, fee tokens, receiver hooks and the
//!   event log. Every public contract operation runs through
//!   [`Runtime::atomically`](runtime::Runtime::atomically), so a failed call
//!   leaves no trace.
//!
//! ## Design Principles
//!
//! 1. Effects before interactions: state is updated before any value leaves
//!    a contract, and a failed transfer discards both.
//! 2. Every rejection has its own error variant. Nothing collapses into a
//!    generic "operation failed".
//! 3. All value arithmetic is checked.
//! 4. Governance changes are explicit owner calls; time only ever lifts a
//!    pause, it never changes a parameter.

pub mod announcer;
pub mod commitment_ledger;
pub mod events;
pub mod fee_governor;
pub mod guard;
pub mod payment_collector;
pub mod runtime;

pub use announcer::{AnnounceError, Announcement, Announcer};
pub use commitment_ledger::{BatchOutcome, CommitmentLedger, LedgerError};
pub use events::{Event, LogEntry};
pub use fee_governor::{FeeGovernor, GovernanceError, GovernorPhase, PendingFeeChange};
pub use guard::{ReentrancyGuard, ReentrancyViolation};
pub use payment_collector::{collect, CollectionError, CollectionMethod};
pub use runtime::{Runtime, RuntimeError, ValueReceiver};
