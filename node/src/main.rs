// Copyright (c) 2026 Veil Contributors. MIT License.
// See LICENSE for details.

//! # Veil Node
//!
//! Entry point for the `veil-node` binary. Parses CLI arguments, initializes
//! logging, and dispatches to one of three subcommands:
//!
//! - `hash`: compute the commitment hash a payer deposits against
//! - `simulate`: run a scripted scenario and print its event log
//! - `version`: print build version information

mod cli;
mod logging;
mod simulate;

use anyhow::{Context, Result};
use clap::Parser;

use veil_contracts::CommitmentLedger;

use cli::{Commands, VeilNodeCli};

fn main() -> Result<()> {
    let cli = VeilNodeCli::parse();

    match cli.command {
        Commands::Hash(args) => {
            logging::init_logging("veil_node=warn", cli.log_format);
            print_hash(args)
        }
        Commands::Simulate(args) => {
            logging::init_logging("veil_node=info,veil_contracts=info", cli.log_format);
            run_simulation(args)
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Prints `BLAKE3(secret || recipient)` as 0x-prefixed hex.
fn print_hash(args: cli::HashArgs) -> Result<()> {
    let secret = args.secret_bytes().context("secret is not valid hex")?;
    let hash = CommitmentLedger::compute_hash(&secret, &args.recipient);
    tracing::debug!(recipient = %args.recipient, secret_len = secret.len(), "commitment hash computed");
    println!("{hash}");
    Ok(())
}

/// Runs the scripted scenario and writes one JSON object per event to stdout.
fn run_simulation(args: cli::SimulateArgs) -> Result<()> {
    let start = match args.start_time {
        Some(t) => t,
        None => u64::try_from(chrono::Utc::now().timestamp()).context("system clock is before 1970")?,
    };
    tracing::info!(start, initial_fee = args.initial_fee, "starting simulation");

    let report = simulate::run(start, args.initial_fee)?;
    for entry in report.runtime.logs() {
        let line = serde_json::to_string(entry).context("serializing event")?;
        println!("{line}");
    }

    tracing::info!(
        events = report.runtime.logs().len(),
        fees = ?report.fees_charged,
        reentrancy_blocked = report.reentrancy_blocked,
        "simulation finished"
    );
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("veil-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc     {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
