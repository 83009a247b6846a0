//! Storage abstraction for the Tardis archive
//!
//! Trait-based abstraction for persisting archive state. The trait is
//! synchronous (no async): every service call is one short transaction.
//!
//! # Layout
//!
//! Independent maps, each with its own table in durable backends:
//!
//! - messages: position -> [`MessageRecord`]
//! - id index: [`MessageId`] -> position
//! - address index: [`Address`] -> positions, oldest first
//! - keys: [`Address`] -> [`KeyRecord`]
//! - seed: the generator state
//! - config: scalar entries fixed at init

mod chaotic;
mod codec;
mod error;
mod memory;
mod redb;

use std::collections::HashMap;

pub use chaotic::ChaoticStorage;
pub use codec::{CborCodec, Codec, JsonCodec};
pub use error::StorageError;
pub use memory::MemoryStorage;
use tardis_core::{Address, ArchiveAction, ArchiveConfig, KeyRecord, MessageId, MessageRecord};
use tardis_crypto::RngState;

pub use self::redb::RedbStorage;

/// Storage abstraction for archive state
///
/// Must be Clone (handles are shared between the service and tests), Send +
/// Sync (thread-safe), and synchronous. Implementations share internal state
/// via Arc, so clones access the same underlying storage.
///
/// # Panics
///
/// Implementations may panic if internal synchronization primitives are
/// poisoned (a thread panicked while holding a lock).
pub trait Storage: Clone + Send + Sync + 'static {
    /// Persist a batch of actions in one atomic transaction.
    ///
    /// # Invariants
    ///
    /// - Pre: every `AppendMessage` position equals the number of messages
    ///   stored before it (counting earlier appends in the same batch)
    /// - Post: either every action is durable or none is
    ///
    /// # Errors
    ///
    /// `StorageError::Conflict` on a misplaced append; backend errors
    /// otherwise. Nothing is written on error.
    fn apply(&self, actions: &[ArchiveAction]) -> Result<(), StorageError>;

    /// Stored configuration. `None` if the archive was never initialized.
    fn load_config(&self) -> Result<Option<ArchiveConfig>, StorageError>;

    /// Stored generator state.
    fn load_seed(&self) -> Result<Option<RngState>, StorageError>;

    /// Number of stored messages.
    fn message_count(&self) -> Result<u64, StorageError>;

    /// Load messages by position
    ///
    /// Returns messages in range `[from, from+limit)`.
    /// If fewer than `limit` messages exist, returns all available messages.
    fn load_messages(&self, from: u64, limit: usize) -> Result<Vec<MessageRecord>, StorageError>;

    /// Full id index.
    fn load_id_index(&self) -> Result<HashMap<MessageId, u64>, StorageError>;

    /// Full address index.
    fn load_address_index(&self) -> Result<HashMap<Address, Vec<u64>>, StorageError>;

    /// All stored keys.
    fn load_keys(&self) -> Result<Vec<(Address, KeyRecord)>, StorageError>;
}
