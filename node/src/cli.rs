//! # CLI Interface
//!
//! Defines the command-line argument structure for `veil-node` using
//! `clap` derive. Three subcommands: `hash`, `simulate` and `version`.

use clap::{Parser, Subcommand};

use veil_protocol::config::TOKEN_UNIT;
use veil_protocol::identity::Address;

use crate::logging::LogFormat;

/// Veil contract driver.
///
/// Computes commitment hashes for payers and runs the escrow and announcer
/// contracts against an in-memory runtime.
#[derive(Parser, Debug)]
#[command(
    name = "veil-node",
    about = "Veil commitment escrow and announcer driver",
    version,
    propagate_version = true
)]
pub struct VeilNodeCli {
    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = "VEIL_LOG_FORMAT", default_value = "pretty")]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the Veil binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the commitment hash a payer deposits against.
    Hash(HashArgs),
    /// Run a scripted deposit/claim/announce scenario and print its events.
    Simulate(SimulateArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `hash` subcommand.
#[derive(Parser, Debug)]
pub struct HashArgs {
    /// Hex-encoded secret shared with the recipient (optional `0x` prefix).
    #[arg(long)]
    pub secret: String,

    /// Recipient address (40 hex chars, optional `0x` prefix).
    #[arg(long)]
    pub recipient: Address,
}

/// Arguments for the `simulate` subcommand.
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Initial announcement fee, in base units.
    #[arg(long, env = "VEIL_INITIAL_FEE", default_value_t = TOKEN_UNIT)]
    pub initial_fee: u128,

    /// Start the simulated clock at this unix time instead of now.
    #[arg(long)]
    pub start_time: Option<u64>,
}

impl HashArgs {
    /// Decodes the secret from hex.
    pub fn secret_bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(self.secret.strip_prefix("0x").unwrap_or(&self.secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        VeilNodeCli::command().debug_assert();
    }

    #[test]
    fn parses_hash_arguments() {
        let cli = VeilNodeCli::try_parse_from([
            "veil-node",
            "hash",
            "--secret",
            "0xdeadbeef",
            "--recipient",
            "0x0101010101010101010101010101010101010101",
        ])
        .unwrap();
        match cli.command {
            Commands::Hash(args) => {
                assert_eq!(args.secret_bytes().unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
                assert_eq!(args.recipient, Address::from_bytes([1u8; 20]));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_bad_recipient() {
        let parsed = VeilNodeCli::try_parse_from([
            "veil-node",
            "hash",
            "--secret",
            "00",
            "--recipient",
            "0x1234",
        ]);
        assert!(parsed.is_err());
    }
}
