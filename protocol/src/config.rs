//! # Protocol Configuration & Constants
//!
//! Every magic number in Veil lives here. The governance constants in
//! particular are part of the contract surface: integrators compute
//! proposal effective times and pause windows from them, so changing one
//! is a breaking change, not a tweak.

// ---------------------------------------------------------------------------
// Value Units
// ---------------------------------------------------------------------------

/// One whole fee token expressed in its smallest unit (18 decimals).
pub const TOKEN_UNIT: u128 = 1_000_000_000_000_000_000;

/// Decimal places of the fee token.
pub const TOKEN_DECIMALS: u8 = 18;

// ---------------------------------------------------------------------------
// Fee Governance
// ---------------------------------------------------------------------------

/// Hard ceiling on the per-announcement fee. Neither the current fee nor a
/// pending proposal may exceed it.
pub const MAX_FEE: u128 = 1_000 * TOKEN_UNIT;

/// Seconds in a day. Everything below is expressed in whole days.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Minimum delay between proposing a fee change and executing it.
pub const FEE_CHANGE_DELAY_SECS: u64 = 7 * SECONDS_PER_DAY;

/// Minimum spacing between two proposal cancellations.
pub const CANCELLATION_COOLDOWN_SECS: u64 = SECONDS_PER_DAY;

/// Longest pause window the owner can request in a single call.
pub const MAX_PAUSE_DURATION_SECS: u64 = 30 * SECONDS_PER_DAY;

// ---------------------------------------------------------------------------
// Batch Limits
// ---------------------------------------------------------------------------

/// Upper bound on batch withdrawals and batch exemption updates.
pub const MAX_BATCH_SIZE: usize = 256;

// ---------------------------------------------------------------------------
// Identifier and Payload Sizes
// ---------------------------------------------------------------------------

/// Account address length in bytes.
pub const ADDRESS_LENGTH: usize = 20;

/// Commitment hash length in bytes (BLAKE3 output).
pub const HASH_OUTPUT_LENGTH: usize = 32;

/// Compressed secp256k1-style ephemeral key length in announcements.
/// The first byte must be `0x02` or `0x03`; the point itself is not checked.
pub const EPHEMERAL_KEY_LENGTH: usize = 33;

/// Longest announcement metadata accepted. The first byte is the view tag.
pub const MAX_METADATA_LENGTH: usize = 1024;

/// Ed25519 public key length in bytes.
pub const VERIFYING_KEY_LENGTH: usize = 32;

/// Ed25519 signature length. Always 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// Domain tag mixed into every permit digest so a permit can never be
/// replayed as some other signed message.
pub const PERMIT_DOMAIN: &[u8] = b"VEIL-PERMIT-V1";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_governance_windows() {
        assert_eq!(FEE_CHANGE_DELAY_SECS, 604_800);
        assert_eq!(CANCELLATION_COOLDOWN_SECS, 86_400);
        assert_eq!(MAX_PAUSE_DURATION_SECS, 2_592_000);
        // The cooldown must be shorter than the timelock, otherwise a
        // cancel-and-repropose cycle could never land inside one delay.
        assert!(CANCELLATION_COOLDOWN_SECS < FEE_CHANGE_DELAY_SECS);
    }

    #[test]
    fn test_fee_ceiling() {
        assert_eq!(MAX_FEE, 1_000 * 10u128.pow(TOKEN_DECIMALS as u32));
    }

    #[test]
    fn test_sizes() {
        assert_eq!(MAX_BATCH_SIZE, 256);
        assert_eq!(ADDRESS_LENGTH, 20);
        assert_eq!(HASH_OUTPUT_LENGTH, 32);
        assert_eq!(EPHEMERAL_KEY_LENGTH, 33);
        assert_eq!(SIGNATURE_LENGTH, 64);
    }
}
