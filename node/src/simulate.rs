//! # Scripted Scenario
//!
//! Drives both contracts through a fixed script against an in-memory
//! runtime: a deposit and claim, a claim whose recipient tries to re-enter
//! the ledger, a timelocked fee change, and announcements paid by allowance,
//! by permit, during a pause and by an exempt sender.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{ensure, Context, Result};
use tracing::info;

use veil_contracts::{Announcement, Announcer, CommitmentLedger, LedgerError, Runtime, ValueReceiver};
use veil_protocol::config::{FEE_CHANGE_DELAY_SECS, MAX_FEE, SECONDS_PER_DAY, TOKEN_UNIT};
use veil_protocol::crypto::VeilKeypair;
use veil_protocol::identity::Address;
use veil_protocol::token::{PermitAuthorization, PermitToken};

/// Outcome of nested claims attempted from inside a payout.
type Observed = Rc<RefCell<Vec<Result<u128, LedgerError>>>>;

/// A recipient whose receive hook immediately tries a second claim.
struct GreedyRecipient {
    address: Address,
    second_secret: Vec<u8>,
    observed: Observed,
}

impl ValueReceiver for GreedyRecipient {
    fn on_value_received(
        &mut self,
        ledger: &mut CommitmentLedger,
        rt: &mut Runtime,
        _amount: u128,
    ) -> std::result::Result<(), String> {
        let nested = ledger.withdraw(rt, self.address, &self.second_secret);
        self.observed.borrow_mut().push(nested);
        Ok(())
    }
}

/// What the scenario produced, besides the event log.
#[derive(Debug)]
pub struct Report {
    /// The runtime after the last step; its log holds every event.
    pub runtime: Runtime,
    /// Fees charged per announcement, in order.
    pub fees_charged: Vec<u128>,
    /// Whether the nested claim was refused.
    pub reentrancy_blocked: bool,
}

/// Runs the scenario with the clock starting at `start` and the given
/// initial announcement fee.
pub fn run(start: u64, initial_fee: u128) -> Result<Report> {
    ensure!(
        initial_fee <= MAX_FEE,
        "initial fee {initial_fee} exceeds the maximum of {MAX_FEE}"
    );
    let mut rt = Runtime::new(start);

    // -- Escrow --

    let payer = Address::from_label("payer");
    let recipient = Address::from_label("recipient");
    rt.mint_native(&payer, 10 * TOKEN_UNIT)
        .context("funding payer")?;

    let mut ledger = CommitmentLedger::new(Address::from_label("veil-ledger"));
    let hash = CommitmentLedger::compute_hash(b"first-secret", &recipient);
    ledger
        .deposit(&mut rt, payer, hash, 2 * TOKEN_UNIT)
        .context("depositing first commitment")?;
    let claimed = ledger
        .withdraw(&mut rt, recipient, b"first-secret")
        .context("claiming first commitment")?;
    info!(%hash, claimed, "plain claim done");

    let greedy = Address::from_label("greedy");
    for secret in [&b"greedy-a"[..], &b"greedy-b"[..]] {
        let hash = CommitmentLedger::compute_hash(secret, &greedy);
        ledger
            .deposit(&mut rt, payer, hash, TOKEN_UNIT)
            .context("depositing greedy commitment")?;
    }
    let observed: Observed = Rc::default();
    rt.register_receiver(
        greedy,
        Box::new(GreedyRecipient {
            address: greedy,
            second_secret: b"greedy-b".to_vec(),
            observed: Rc::clone(&observed),
        }),
    );
    ledger
        .withdraw(&mut rt, greedy, b"greedy-a")
        .context("claiming with re-entering recipient")?;
    rt.remove_receiver(&greedy);
    let reentrancy_blocked = {
        let nested = observed.borrow();
        !nested.is_empty()
            && nested
                .iter()
                .all(|attempt| matches!(attempt, Err(LedgerError::Reentrancy(_))))
    };
    let outcome = ledger
        .batch_withdraw(&mut rt, greedy, &[&b"greedy-b"[..], &b"never-funded"[..]])
        .context("batch claim")?;
    info!(claimed = outcome.claimed, skipped = outcome.skipped, "batch claim done");

    // -- Announcements --

    let owner = Address::from_label("announcer-owner");
    let treasury = Address::from_label("treasury");
    let sender = VeilKeypair::from_seed(&[7u8; 32]);
    let mut token = PermitToken::new(Address::from_label("veil-fee-token"), "VFEE");
    token
        .mint(&sender.address(), 10_000 * TOKEN_UNIT)
        .context("minting fee tokens")?;
    let token = rt.deploy_token(token).context("deploying fee token")?;

    let mut announcer = Announcer::new(Address::from_label("veil-announcer"), owner);
    announcer
        .initialize_fees(&mut rt, owner, token, treasury, initial_fee)
        .context("initializing fees")?;
    rt.token_mut(&token)?
        .approve(&sender.address(), &announcer.address(), u128::MAX)
        .context("approving announcer")?;

    let mut fees_charged = Vec::new();
    fees_charged.push(
        announcer
            .announce(&mut rt, sender.address(), announcement(0x01))
            .context("announcing with allowance")?,
    );

    let new_fee = initial_fee.saturating_mul(2).min(MAX_FEE);
    announcer
        .propose_fee_change(&mut rt, owner, new_fee)
        .context("proposing fee change")?;
    rt.advance(FEE_CHANGE_DELAY_SECS);
    announcer
        .execute_fee_change(&mut rt, owner)
        .context("executing fee change")?;

    let nonce = rt
        .token(&token)
        .map(|t| t.nonce_of(&sender.address()))
        .unwrap_or(0);
    let permit = PermitAuthorization::sign(
        &sender,
        &token,
        &announcer.address(),
        new_fee,
        nonce,
        rt.now() + 3_600,
    );
    fees_charged.push(
        announcer
            .announce_with_permit(&mut rt, sender.address(), announcement(0x02), permit)
            .context("announcing with permit")?,
    );

    announcer
        .pause_fees(&mut rt, owner, SECONDS_PER_DAY)
        .context("pausing fees")?;
    fees_charged.push(
        announcer
            .announce(&mut rt, sender.address(), announcement(0x03))
            .context("announcing while paused")?,
    );

    rt.advance(SECONDS_PER_DAY);
    announcer
        .set_fee_exemption(&mut rt, owner, sender.address(), true)
        .context("exempting sender")?;
    fees_charged.push(
        announcer
            .announce(&mut rt, sender.address(), announcement(0x04))
            .context("announcing as exempt sender")?,
    );

    Ok(Report {
        runtime: rt,
        fees_charged,
        reentrancy_blocked,
    })
}

fn announcement(view_tag: u8) -> Announcement {
    let mut ephemeral_pub_key = vec![0x02];
    ephemeral_pub_key.extend_from_slice(&[view_tag; 32]);
    Announcement {
        scheme_id: 1,
        stealth_address: Address::from_label(&format!("stealth-{view_tag}")),
        ephemeral_pub_key,
        metadata: vec![view_tag],
    }
}
