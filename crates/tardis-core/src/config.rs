//! Archive configuration fixed at initialization.

use serde::{Deserialize, Serialize};

/// Default key lifetime: one day.
pub const DEFAULT_KEY_EXPIRES_SECS: u64 = 60 * 60 * 24;

/// Default cipher feedback window.
pub const DEFAULT_CRYPT_BLOCK_SIZE: u64 = 5;

/// Archive configuration.
///
/// Written once by `init` and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Seconds until an issued key expires
    pub key_expires_secs: u64,
    /// Feedback window for the stream cipher
    pub crypt_block_size: u64,
}

impl ArchiveConfig {
    /// Key lifetime in milliseconds.
    pub fn key_lifetime_millis(&self) -> u64 {
        self.key_expires_secs.saturating_mul(1000)
    }

    /// Block size as a slice offset.
    pub fn block_size(&self) -> usize {
        usize::try_from(self.crypt_block_size).unwrap_or(usize::MAX)
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            key_expires_secs: DEFAULT_KEY_EXPIRES_SECS,
            crypt_block_size: DEFAULT_CRYPT_BLOCK_SIZE,
        }
    }
}
