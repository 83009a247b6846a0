//! Per-address symmetric key registry.
//!
//! Each address moves through `NoKey -> Active -> Expired -> Active`. Keys are
//! overwritten on regeneration and never deleted.

use std::collections::HashMap;

use tardis_crypto::{DeterministicRng, generate_key_string};

use crate::{
    error::ArchiveError,
    types::{Address, KeyRecord},
};

/// Key length used when none (or an oversized one) is requested.
pub const DEFAULT_KEY_LENGTH: usize = 1024;

/// Largest key length honored as requested.
pub const MAX_KEY_LENGTH: usize = 10_000;

/// Effective key length for a request.
///
/// Absent, zero, or above [`MAX_KEY_LENGTH`] falls back to
/// [`DEFAULT_KEY_LENGTH`].
pub fn effective_key_length(requested: Option<usize>) -> usize {
    match requested {
        Some(length) if length > 0 && length <= MAX_KEY_LENGTH => length,
        _ => DEFAULT_KEY_LENGTH,
    }
}

/// Registry of issued keys, one per address.
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    keys: HashMap<Address, KeyRecord>,
}

impl KeyRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry rebuilt from stored records.
    pub fn from_records(records: impl IntoIterator<Item = (Address, KeyRecord)>) -> Self {
        Self { keys: records.into_iter().collect() }
    }

    /// Stored record for `address`, expired or not.
    pub fn get(&self, address: &Address) -> Option<&KeyRecord> {
        self.keys.get(address)
    }

    /// Key for `address` if present and unexpired at `now`.
    pub fn get_key(&self, address: &Address, now: u64) -> Option<&KeyRecord> {
        self.keys.get(address).filter(|key| key.is_live(now))
    }

    /// Key for `address`, or `InvalidKeyState` if missing or expired.
    pub fn require_valid_key(&self, address: &Address, now: u64) -> Result<&KeyRecord, ArchiveError> {
        match self.keys.get(address) {
            Some(key) if !key.is_expired(now) => Ok(key),
            _ => Err(ArchiveError::InvalidKeyState { address: address.clone() }),
        }
    }

    /// Whether a generate request must issue a fresh key.
    pub fn needs_new_key(&self, address: &Address, now: u64, force_new: bool) -> bool {
        force_new || self.keys.get(address).is_none_or(|key| key.is_expired(now))
    }

    /// Build a new key record without registering it.
    ///
    /// Draws from `rng`; the caller persists the advanced generator state
    /// together with the record.
    pub fn issue(
        requested_length: Option<usize>,
        now: u64,
        lifetime_millis: u64,
        rng: &mut DeterministicRng,
    ) -> KeyRecord {
        let length = effective_key_length(requested_length);
        KeyRecord {
            value: generate_key_string(rng, length),
            expires: now.saturating_add(lifetime_millis),
        }
    }

    /// Register (or overwrite) the key for `address`.
    pub fn insert(&mut self, address: Address, key: KeyRecord) {
        self.keys.insert(address, key);
    }

    /// Number of addresses that have ever been issued a key.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True if no key was ever issued.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// All registered keys.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &KeyRecord)> {
        self.keys.iter()
    }
}
