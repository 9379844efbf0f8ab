//! # Contract Events
//!
//! Everything the contracts report to the outside world. Events are
//! appended to the runtime log together with their *topics*: the indexed
//! fields, each widened to 32 bytes, that off-chain consumers filter on.
//!
//! What is indexed matters for privacy. A deposit indexes only its hash;
//! indexing the depositor would hand observers a key that links every
//! deposit a payer ever made.

use serde::Serialize;
use std::fmt;

use veil_protocol::crypto::CommitmentHash;
use veil_protocol::identity::Address;

/// A 32-byte indexed value.
pub type Topic = [u8; 32];

/// Left-pads an address into a topic.
pub fn address_topic(address: &Address) -> Topic {
    let mut topic = [0u8; 32];
    topic[12..].copy_from_slice(address.as_bytes());
    topic
}

/// A commitment hash is already 32 bytes.
pub fn hash_topic(hash: &CommitmentHash) -> Topic {
    *hash.as_bytes()
}

/// Big-endian, left-padded integer topic.
pub fn u32_topic(value: u32) -> Topic {
    let mut topic = [0u8; 32];
    topic[28..].copy_from_slice(&value.to_be_bytes());
    topic
}

/// Every event the Veil contracts emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "PascalCase")]
pub enum Event {
    // -- Commitment ledger --
    Deposited {
        hash: CommitmentHash,
        amount: u128,
        depositor: Address,
    },
    Withdrawn {
        hash: CommitmentHash,
        amount: u128,
        recipient: Address,
    },
    BatchWithdrawn {
        recipient: Address,
        count: u32,
        total_amount: u128,
    },

    // -- Fee governance --
    FeeTokenSet {
        token: Address,
    },
    FeeRecipientChanged {
        previous: Address,
        current: Address,
    },
    FeeChanged {
        previous: u128,
        current: u128,
    },
    FeeChangeProposed {
        fee: u128,
        effective_at: u64,
    },
    FeeChangeCancelled {
        fee: u128,
    },
    FeeExemptionSet {
        account: Address,
        exempt: bool,
    },
    FeesPaused {
        until: u64,
    },
    FeesUnpaused {
        /// `true` when lifted lazily because the window elapsed.
        automatic: bool,
    },
    OwnershipTransferred {
        previous: Address,
        current: Address,
    },

    // -- Fee collection and announcements --
    FeeCollected {
        payer: Address,
        recipient: Address,
        amount: u128,
    },
    Announced {
        scheme_id: u32,
        stealth_address: Address,
        caller: Address,
        #[serde(serialize_with = "hex_bytes")]
        ephemeral_pub_key: Vec<u8>,
        #[serde(serialize_with = "hex_bytes")]
        metadata: Vec<u8>,
    },
}

impl Event {
    /// The indexed fields of this event, in declaration order.
    pub fn topics(&self) -> Vec<Topic> {
        match self {
            Event::Deposited { hash, .. } => vec![hash_topic(hash)],
            Event::Withdrawn {
                hash, recipient, ..
            } => vec![hash_topic(hash), address_topic(recipient)],
            Event::BatchWithdrawn { recipient, .. } => vec![address_topic(recipient)],
            Event::FeeTokenSet { token } => vec![address_topic(token)],
            Event::FeeRecipientChanged { previous, current }
            | Event::OwnershipTransferred { previous, current } => {
                vec![address_topic(previous), address_topic(current)]
            }
            Event::FeeExemptionSet { account, .. } => vec![address_topic(account)],
            Event::FeeCollected { payer, .. } => vec![address_topic(payer)],
            Event::Announced {
                scheme_id,
                stealth_address,
                caller,
                ..
            } => vec![
                u32_topic(*scheme_id),
                address_topic(stealth_address),
                address_topic(caller),
            ],
            Event::FeeChanged { .. }
            | Event::FeeChangeProposed { .. }
            | Event::FeeChangeCancelled { .. }
            | Event::FeesPaused { .. }
            | Event::FeesUnpaused { .. } => Vec::new(),
        }
    }

    /// Short event name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Deposited { .. } => "Deposited",
            Event::Withdrawn { .. } => "Withdrawn",
            Event::BatchWithdrawn { .. } => "BatchWithdrawn",
            Event::FeeTokenSet { .. } => "FeeTokenSet",
            Event::FeeRecipientChanged { .. } => "FeeRecipientChanged",
            Event::FeeChanged { .. } => "FeeChanged",
            Event::FeeChangeProposed { .. } => "FeeChangeProposed",
            Event::FeeChangeCancelled { .. } => "FeeChangeCancelled",
            Event::FeeExemptionSet { .. } => "FeeExemptionSet",
            Event::FeesPaused { .. } => "FeesPaused",
            Event::FeesUnpaused { .. } => "FeesUnpaused",
            Event::OwnershipTransferred { .. } => "OwnershipTransferred",
            Event::FeeCollected { .. } => "FeeCollected",
            Event::Announced { .. } => "Announced",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One entry in the runtime's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Contract that emitted the event.
    pub emitter: Address,
    /// Indexed fields, see [`Event::topics`].
    #[serde(skip)]
    pub topics: Vec<Topic>,
    /// The event itself.
    #[serde(flatten)]
    pub event: Event,
}

impl LogEntry {
    /// Builds a log entry, deriving topics from the event.
    pub fn new(emitter: Address, event: Event) -> Self {
        Self {
            emitter,
            topics: event.topics(),
            event,
        }
    }
}

/// Byte payloads travel as hex strings.
fn hex_bytes<S: serde::Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&hex::encode(bytes))
}
