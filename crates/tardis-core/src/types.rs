//! Domain types shared by the archive, the key registry and storage.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Opaque caller address supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wrap a host-supplied address string.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty address (treated as "absent").
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for Address {
    fn from(address: String) -> Self {
        Self(address)
    }
}

/// Message identifier drawn from the archive's generator.
///
/// Ids are the absolute value of a generator draw. They are not checked for
/// uniqueness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(u64);

impl MessageId {
    /// Wrap a raw id.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Id derived from a signed generator draw.
    pub fn from_draw(draw: i64) -> Self {
        Self(draw.unsigned_abs())
    }

    /// Raw id value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message as stored in the archive.
///
/// Stored records hold the decrypted plaintext and a real id. Read paths hand
/// out copies, masking `text` for messages that are not yet released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    /// Plaintext (or the original ciphertext in an add response)
    pub text: Bytes,
    /// Release time (epoch ms); text is withheld until this passes
    pub release_ts: u64,
    /// Submission time (epoch ms)
    pub send_ts: u64,
    /// Submitting address
    pub sender: Address,
    /// Assigned id; `None` in the add response
    pub id: Option<MessageId>,
    /// Private messages are only listed to their sender
    pub private: bool,
}

impl MessageRecord {
    /// True once `now` has reached the release time.
    pub fn is_released(&self, now: u64) -> bool {
        self.release_ts <= now
    }

    /// Copy with `text` cleared if the message is still time-locked at `now`.
    pub fn visible_at(&self, now: u64) -> Self {
        let mut record = self.clone();
        if !record.is_released(now) {
            record.text = Bytes::new();
        }
        record
    }
}

/// Symmetric key issued to one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Key material (base-36 string)
    pub value: String,
    /// Expiry time (epoch ms)
    pub expires: u64,
}

impl KeyRecord {
    /// True once the expiry lies strictly in the past.
    ///
    /// Issuance and decryption use this check.
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires < now
    }

    /// True while the expiry lies strictly in the future.
    ///
    /// Key lookup uses this stricter check, so a key whose expiry equals `now`
    /// is hidden from `get_key` but still accepted for decryption.
    pub fn is_live(&self, now: u64) -> bool {
        self.expires > now
    }
}
