//! Integration tests for the commitment ledger.
//!
//! These drive the ledger through the runtime the way outside callers do:
//! funded payers, claimants with receiver hooks, and hooks that try to call
//! back into the ledger mid-payout.

use std::cell::RefCell;
use std::rc::Rc;

use veil_contracts::events::{address_topic, hash_topic};
use veil_contracts::{BatchOutcome, CommitmentLedger, Event, LedgerError, Runtime, ValueReceiver};
use veil_protocol::identity::Address;

const T0: u64 = 1_700_000_000;

fn setup() -> (Runtime, CommitmentLedger, Address) {
    let mut rt = Runtime::new(T0);
    let payer = Address::from_label("payer");
    rt.mint_native(&payer, 1_000_000).unwrap();
    (rt, CommitmentLedger::new(Address::from_label("ledger")), payer)
}

/// Refuses every payment.
struct Refuser;

impl ValueReceiver for Refuser {
    fn on_value_received(&mut self, _: &mut CommitmentLedger, _: &mut Runtime, _: u128) -> Result<(), String> {
        Err("no thanks".into())
    }
}

/// Tries to claim a second commitment while the first payout is in flight,
/// and records what the ledger told it.
struct Reenterer {
    claimant: Address,
    secret: Vec<u8>,
    observed: Rc<RefCell<Vec<Result<u128, LedgerError>>>>,
}

impl ValueReceiver for Reenterer {
    fn on_value_received(&mut self, ledger: &mut CommitmentLedger, rt: &mut Runtime, _: u128) -> Result<(), String> {
        let nested = ledger.withdraw(rt, self.claimant, &self.secret);
        self.observed.borrow_mut().push(nested);
        Ok(())
    }
}

/// Tries a batch claim from inside a payout.
struct BatchReenterer {
    claimant: Address,
    secrets: Vec<Vec<u8>>,
    observed: Rc<RefCell<Vec<Result<BatchOutcome, LedgerError>>>>,
}

impl ValueReceiver for BatchReenterer {
    fn on_value_received(&mut self, ledger: &mut CommitmentLedger, rt: &mut Runtime, _: u128) -> Result<(), String> {
        let nested = ledger.batch_withdraw(rt, self.claimant, &self.secrets);
        self.observed.borrow_mut().push(nested);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Deposit
// ---------------------------------------------------------------------------

#[test]
fn deposit_records_value_and_event() {
    let (mut rt, mut ledger, payer) = setup();
    let hash = CommitmentLedger::compute_hash(b"alpha", &Address::from_label("payee"));

    ledger.deposit(&mut rt, payer, hash, 500).unwrap();

    assert_eq!(ledger.balance_of(&hash), 500);
    let entry = rt.logs().last().unwrap();
    assert_eq!(
        entry.event,
        Event::Deposited {
            hash,
            amount: 500,
            depositor: payer
        }
    );
    assert_eq!(entry.topics, vec![hash_topic(&hash)]);
}

#[test]
fn second_deposit_on_live_hash_is_rejected() {
    let (mut rt, mut ledger, payer) = setup();
    let hash = CommitmentLedger::compute_hash(b"alpha", &Address::from_label("payee"));
    ledger.deposit(&mut rt, payer, hash, 500).unwrap();

    assert_eq!(
        ledger.deposit(&mut rt, payer, hash, 1),
        Err(LedgerError::HashAlreadyUsed(hash))
    );
    assert_eq!(ledger.balance_of(&hash), 500);
    assert_eq!(rt.native_balance(&payer), 1_000_000 - 500);
}

// ---------------------------------------------------------------------------
// Withdraw
// ---------------------------------------------------------------------------

#[test]
fn claim_happens_exactly_once() {
    let (mut rt, mut ledger, payer) = setup();
    let payee = Address::from_label("payee");
    let hash = CommitmentLedger::compute_hash(b"alpha", &payee);
    ledger.deposit(&mut rt, payer, hash, 750).unwrap();

    assert_eq!(ledger.withdraw(&mut rt, payee, b"alpha"), Ok(750));
    assert_eq!(rt.native_balance(&payee), 750);
    assert_eq!(ledger.balance_of(&hash), 0);

    assert_eq!(
        ledger.withdraw(&mut rt, payee, b"alpha"),
        Err(LedgerError::NothingToWithdraw)
    );
    assert_eq!(rt.native_balance(&payee), 750);

    let withdrawn = rt
        .logs_with_topic(&address_topic(&payee))
        .filter(|e| matches!(e.event, Event::Withdrawn { .. }))
        .count();
    assert_eq!(withdrawn, 1);
}

#[test]
fn claimed_hash_can_be_funded_again() {
    let (mut rt, mut ledger, payer) = setup();
    let payee = Address::from_label("payee");
    let hash = CommitmentLedger::compute_hash(b"alpha", &payee);

    ledger.deposit(&mut rt, payer, hash, 10).unwrap();
    ledger.withdraw(&mut rt, payee, b"alpha").unwrap();
    ledger.deposit(&mut rt, payer, hash, 20).unwrap();

    assert_eq!(ledger.withdraw(&mut rt, payee, b"alpha"), Ok(20));
}

#[test]
fn secret_is_bound_to_recipient() {
    let (mut rt, mut ledger, payer) = setup();
    let payee = Address::from_label("payee");
    let thief = Address::from_label("thief");
    let hash = CommitmentLedger::compute_hash(b"alpha", &payee);
    ledger.deposit(&mut rt, payer, hash, 100).unwrap();

    // A front-runner who copies the secret from a pending claim gets nothing.
    assert_eq!(
        ledger.withdraw(&mut rt, thief, b"alpha"),
        Err(LedgerError::NothingToWithdraw)
    );
    assert_eq!(ledger.balance_of(&hash), 100);
    assert_eq!(ledger.withdraw(&mut rt, payee, b"alpha"), Ok(100));
}

#[test]
fn refused_payout_rolls_back_claim() {
    let (mut rt, mut ledger, payer) = setup();
    let payee = Address::from_label("payee");
    let hash = CommitmentLedger::compute_hash(b"alpha", &payee);
    ledger.deposit(&mut rt, payer, hash, 300).unwrap();
    let logs_before = rt.logs().len();

    rt.register_receiver(payee, Box::new(Refuser));
    let result = ledger.withdraw(&mut rt, payee, b"alpha");

    assert!(matches!(result, Err(LedgerError::TransferFailed(_))));
    assert_eq!(ledger.balance_of(&hash), 300);
    assert_eq!(rt.native_balance(&payee), 0);
    assert_eq!(rt.native_balance(&ledger.address()), 300);
    assert_eq!(rt.logs().len(), logs_before);
    assert!(!ledger.is_locked());

    // Once the hook is gone, the same claim succeeds.
    rt.remove_receiver(&payee);
    assert_eq!(ledger.withdraw(&mut rt, payee, b"alpha"), Ok(300));
}

#[test]
fn reentrant_claim_is_rejected() {
    let (mut rt, mut ledger, payer) = setup();
    let payee = Address::from_label("payee");
    let first = CommitmentLedger::compute_hash(b"first", &payee);
    let second = CommitmentLedger::compute_hash(b"second", &payee);
    ledger.deposit(&mut rt, payer, first, 40).unwrap();
    ledger.deposit(&mut rt, payer, second, 60).unwrap();

    let observed = Rc::new(RefCell::new(Vec::new()));
    rt.register_receiver(
        payee,
        Box::new(Reenterer {
            claimant: payee,
            secret: b"second".to_vec(),
            observed: Rc::clone(&observed),
        }),
    );

    assert_eq!(ledger.withdraw(&mut rt, payee, b"first"), Ok(40));

    let seen = observed.borrow();
    assert_eq!(seen.len(), 1);
    assert!(matches!(seen[0], Err(LedgerError::Reentrancy(_))));
    assert_eq!(ledger.balance_of(&first), 0);
    assert_eq!(ledger.balance_of(&second), 60);
    assert_eq!(rt.native_balance(&payee), 40);
    assert!(!ledger.is_locked());
}

#[test]
fn reentrant_claim_of_same_secret_is_rejected() {
    let (mut rt, mut ledger, payer) = setup();
    let payee = Address::from_label("payee");
    let hash = CommitmentLedger::compute_hash(b"only", &payee);
    ledger.deposit(&mut rt, payer, hash, 100).unwrap();

    let observed = Rc::new(RefCell::new(Vec::new()));
    rt.register_receiver(
        payee,
        Box::new(Reenterer {
            claimant: payee,
            secret: b"only".to_vec(),
            observed: Rc::clone(&observed),
        }),
    );

    assert_eq!(ledger.withdraw(&mut rt, payee, b"only"), Ok(100));

    let seen = observed.borrow();
    assert_eq!(seen.len(), 1);
    assert!(matches!(seen[0], Err(LedgerError::Reentrancy(_))));
    assert_eq!(rt.native_balance(&payee), 100);
    assert_eq!(rt.native_balance(&ledger.address()), 0);
    assert_eq!(ledger.balance_of(&hash), 0);
    assert!(!ledger.is_locked());
}

// ---------------------------------------------------------------------------
// Batch withdraw
// ---------------------------------------------------------------------------

#[test]
fn batch_claims_valid_and_skips_invalid() {
    let (mut rt, mut ledger, payer) = setup();
    let payee = Address::from_label("payee");
    let valid: Vec<Vec<u8>> = (0u8..3).map(|i| vec![b'v', i]).collect();
    for (i, secret) in valid.iter().enumerate() {
        let hash = CommitmentLedger::compute_hash(secret, &payee);
        ledger.deposit(&mut rt, payer, hash, 100 * (i as u128 + 1)).unwrap();
    }

    let mut secrets = valid.clone();
    secrets.push(b"never-funded".to_vec());
    secrets.push(b"also-not".to_vec());

    let outcome = ledger.batch_withdraw(&mut rt, payee, &secrets).unwrap();
    assert_eq!(outcome.claimed, 3);
    assert_eq!(outcome.skipped, 2);
    assert_eq!(outcome.total, 600);
    assert_eq!(rt.native_balance(&payee), 600);
    assert_eq!(ledger.open_commitments(), 0);

    let last = rt.logs().last().unwrap();
    assert_eq!(
        last.event,
        Event::BatchWithdrawn {
            recipient: payee,
            count: 3,
            total_amount: 600
        }
    );
}

#[test]
fn batch_with_nothing_claimable_fails() {
    let (mut rt, mut ledger, _) = setup();
    let payee = Address::from_label("payee");
    assert_eq!(
        ledger.batch_withdraw(&mut rt, payee, &[b"x".as_slice(), b"y".as_slice()]),
        Err(LedgerError::NothingToWithdraw)
    );
    assert!(!ledger.is_locked());
}

#[test]
fn refused_batch_payout_restores_every_commitment() {
    let (mut rt, mut ledger, payer) = setup();
    let payee = Address::from_label("payee");
    let a = CommitmentLedger::compute_hash(b"a", &payee);
    let b = CommitmentLedger::compute_hash(b"b", &payee);
    ledger.deposit(&mut rt, payer, a, 5).unwrap();
    ledger.deposit(&mut rt, payer, b, 7).unwrap();

    rt.register_receiver(payee, Box::new(Refuser));
    let result = ledger.batch_withdraw(&mut rt, payee, &[b"a".as_slice(), b"b".as_slice()]);

    assert!(matches!(result, Err(LedgerError::TransferFailed(_))));
    assert_eq!(ledger.balance_of(&a), 5);
    assert_eq!(ledger.balance_of(&b), 7);
    assert_eq!(ledger.open_commitments(), 2);
}

#[test]
fn reentrant_batch_claim_is_rejected() {
    let (mut rt, mut ledger, payer) = setup();
    let payee = Address::from_label("payee");
    let a = CommitmentLedger::compute_hash(b"a", &payee);
    let b = CommitmentLedger::compute_hash(b"b", &payee);
    ledger.deposit(&mut rt, payer, a, 30).unwrap();
    ledger.deposit(&mut rt, payer, b, 70).unwrap();

    let observed = Rc::new(RefCell::new(Vec::new()));
    rt.register_receiver(
        payee,
        Box::new(BatchReenterer {
            claimant: payee,
            secrets: vec![b"a".to_vec(), b"b".to_vec()],
            observed: Rc::clone(&observed),
        }),
    );

    let outcome = ledger
        .batch_withdraw(&mut rt, payee, &[b"a".as_slice(), b"b".as_slice()])
        .unwrap();
    assert_eq!(outcome.claimed, 2);
    assert_eq!(outcome.total, 100);

    let seen = observed.borrow();
    assert_eq!(seen.len(), 1);
    assert!(matches!(seen[0], Err(LedgerError::Reentrancy(_))));
    assert_eq!(rt.native_balance(&payee), 100);
    assert_eq!(rt.native_balance(&ledger.address()), 0);
    assert_eq!(ledger.balance_of(&a), 0);
    assert_eq!(ledger.balance_of(&b), 0);
    assert!(!ledger.is_locked());
}
