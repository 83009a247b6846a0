//! Operations for model-based testing.
//!
//! Operations represent every public archive call plus the passage of time.
//! They are generated randomly by proptest (or decoded from fuzz input) and
//! applied to both the model and the real service.

use arbitrary::Arbitrary;
use tardis_core::{Address, ArchiveError, KeyRecord, MessageId, MessageRecord};

/// Caller identifier (kept small so callers collide often).
pub type CallerId = u8;

/// Address of a simulated caller.
pub fn caller_address(id: CallerId) -> Address {
    Address::new(format!("user-{id}"))
}

/// Operations that can be applied to the system.
#[derive(Debug, Clone, Arbitrary)]
pub enum Operation {
    /// Caller asks for a key.
    GenerateKey {
        /// Requesting caller.
        caller: CallerId,
        /// Requested length class, see [`KeyLength`].
        length: KeyLength,
        /// Replace a still-valid key.
        force_new: bool,
    },

    /// Caller encrypts `content` under its current key and submits it.
    ///
    /// A caller without any key encrypts with the empty key.
    AddMessage {
        /// Sending caller.
        caller: CallerId,
        /// Plaintext (kept small for efficiency).
        content: SmallMessage,
        /// Release time relative to now; negative is in the past.
        release_offset: i16,
        /// Only list to the sender.
        private: bool,
    },

    /// Virtual clock moves forward.
    AdvanceTime {
        /// Milliseconds to advance.
        millis: u16,
    },

    /// Look a message up by id.
    GetById {
        /// Which id to ask for.
        target: IdTarget,
    },

    /// Caller asks for its latest message id.
    GetLastId {
        /// Asking caller.
        caller: CallerId,
    },

    /// Caller lists another address's messages.
    FilterByAddress {
        /// Asking caller.
        caller: CallerId,
        /// Listed address; `None` is the empty address.
        address: Option<CallerId>,
    },

    /// Caller lists recent released messages.
    GetRecent {
        /// Asking caller.
        caller: CallerId,
        /// Maximum number of records.
        count: u8,
        /// Lower bound on release time, as milliseconds before now.
        after_back: Option<u16>,
    },

    /// Caller reads its key.
    GetKey {
        /// Asking caller.
        caller: CallerId,
    },
}

/// Requested key length, bucketed so every length rule is exercised.
#[derive(Debug, Clone, Copy, Arbitrary)]
pub enum KeyLength {
    /// No length given (default applies).
    Default,
    /// Zero (default applies).
    Zero,
    /// A short key.
    Short,
    /// Longer than the maximum (default applies).
    Oversized,
}

impl KeyLength {
    /// Length passed to `generate_key`.
    pub fn requested(self) -> Option<usize> {
        match self {
            Self::Default => None,
            Self::Zero => Some(0),
            Self::Short => Some(24),
            Self::Oversized => Some(20_000),
        }
    }
}

/// Which id a lookup asks for.
#[derive(Debug, Clone, Copy, Arbitrary)]
pub enum IdTarget {
    /// The absent id.
    Zero,
    /// The id stored at position `index % len` (or 1 if the archive is empty).
    Stored(u8),
    /// An arbitrary id, almost certainly unknown.
    Raw(u64),
}

impl IdTarget {
    /// Concrete id, resolved against the stored records.
    pub fn resolve(self, records: &[MessageRecord]) -> u64 {
        match self {
            Self::Zero => 0,
            Self::Stored(index) => {
                if records.is_empty() {
                    return 1;
                }
                records[usize::from(index) % records.len()].id.map_or(1, MessageId::get)
            },
            Self::Raw(id) => id,
        }
    }
}

/// Small message for testing.
#[derive(Debug, Clone, Copy, Arbitrary)]
pub struct SmallMessage {
    /// Message seed (expanded to content).
    pub seed: u8,
    /// Message length hint (0-3 maps to empty/small/medium/large).
    pub size_class: u8,
}

impl SmallMessage {
    /// Expand to actual message bytes.
    pub fn to_bytes(self) -> Vec<u8> {
        let len = match self.size_class % 4 {
            0 => 0,
            1 => 8,
            2 => 64,
            _ => 256,
        };

        (0..len).map(|i| self.seed.wrapping_add(i as u8)).collect()
    }
}

/// Release timestamp for `offset` milliseconds from `now`.
pub fn release_at(now: u64, offset: i16) -> u64 {
    now.saturating_add_signed(i64::from(offset))
}

/// Lower bound for a recent-messages query.
pub fn after_ts(now: u64, after_back: Option<u16>) -> Option<u64> {
    after_back.map(|back| now.saturating_sub(u64::from(back)))
}

/// Result of applying an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// `generate_key` returned.
    KeyGenerated(bool),
    /// `add_message` returned the submitted record.
    Added(MessageRecord),
    /// Clock moved.
    TimeAdvanced,
    /// `get_message_by_id` returned.
    Message(Option<MessageRecord>),
    /// `get_last_message_id` returned.
    LastId(Option<MessageId>),
    /// A listing returned.
    Messages(Vec<MessageRecord>),
    /// `get_key` returned.
    Key(Option<KeyRecord>),
    /// The archive rejected the call.
    Rejected(ArchiveError),
}

impl OperationResult {
    /// True if the operation was rejected.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}
