//! Error types for archive operations.
//!
//! Every variant is a validation failure detected before any state change,
//! so a failed call never leaves a partial record behind. None of them are
//! retried internally; they surface to the caller as the operation's result.

use thiserror::Error;

use crate::types::Address;

/// Errors returned by archive operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    /// Caller has no key, or the key has expired
    #[error("no valid encryption key for {address}: generate a key first")]
    InvalidKeyState {
        /// Address that attempted to submit
        address: Address,
    },

    /// Release timestamp lies in the past
    #[error("incorrect release time: {release_ts} is before current time {now}")]
    InvalidRelease {
        /// Requested release time (epoch ms)
        release_ts: u64,
        /// Clock reading at validation (epoch ms)
        now: u64,
    },

    /// Ciphertext was empty
    #[error("message can't be empty")]
    EmptyMessage,

    /// Message id was absent (zero)
    #[error("id can't be empty")]
    EmptyId,

    /// Address was absent (empty string)
    #[error("address can't be empty")]
    EmptyAddress,
}

impl ArchiveError {
    /// Returns true if the caller can fix this by generating a key.
    ///
    /// All other variants indicate malformed input and will fail again with
    /// the same arguments.
    pub fn needs_key(&self) -> bool {
        matches!(self, Self::InvalidKeyState { .. })
    }
}
