//! JSON shapes printed by the CLI.

use serde::Serialize;
use tardis_core::{KeyRecord, MessageRecord};

/// A message as printed by the CLI.
///
/// Text is binary; `text` holds it as UTF-8 when it decodes cleanly and
/// `text_hex` always holds the raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    /// Message id (absent in the add response)
    pub id: Option<u64>,
    /// Sender address
    pub sender: String,
    /// Text as UTF-8, if valid
    pub text: Option<String>,
    /// Text as lowercase hex
    pub text_hex: String,
    /// Release time (epoch ms)
    pub release_ts: u64,
    /// Submission time (epoch ms)
    pub send_ts: u64,
    /// Listed to the sender only
    pub private: bool,
}

impl From<&MessageRecord> for MessageView {
    fn from(record: &MessageRecord) -> Self {
        Self {
            id: record.id.map(|id| id.get()),
            sender: record.sender.to_string(),
            text: std::str::from_utf8(&record.text).ok().map(str::to_owned),
            text_hex: hex::encode(&record.text),
            release_ts: record.release_ts,
            send_ts: record.send_ts,
            private: record.private,
        }
    }
}

/// A key as printed by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyView {
    /// Key material
    pub value: String,
    /// Expiry (epoch ms)
    pub expires: u64,
}

impl From<&KeyRecord> for KeyView {
    fn from(key: &KeyRecord) -> Self {
        Self { value: key.value.clone(), expires: key.expires }
    }
}
