//! Durable mutations planned by the archive state machine.
//!
//! The state machine never writes storage itself. Mutating operations return
//! a list of actions; the driver persists them in one transaction and only
//! then applies them to the in-memory state. A failed commit therefore leaves
//! both sides untouched.

use tardis_crypto::RngState;

use crate::{
    config::ArchiveConfig,
    types::{Address, KeyRecord, MessageId, MessageRecord},
};

/// A single durable mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveAction {
    /// Persist the configuration (init only)
    StoreConfig(ArchiveConfig),

    /// Persist the generator state after draws
    StoreSeed(RngState),

    /// Append a record to the archive
    AppendMessage {
        /// Position the record occupies (must equal the current length)
        position: u64,
        /// Record with plaintext and real id
        record: MessageRecord,
    },

    /// Route a message id to an archive position
    IndexMessageId {
        /// Message id
        id: MessageId,
        /// Archive position
        position: u64,
    },

    /// Replace a sender's position list
    IndexSender {
        /// Sending address
        sender: Address,
        /// All of the sender's positions, oldest first
        positions: Vec<u64>,
    },

    /// Register or overwrite an address's key
    StoreKey {
        /// Key owner
        address: Address,
        /// New key record
        key: KeyRecord,
    },
}

/// Result of planning a mutating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Planned<T> {
    /// Value returned to the caller once the actions are committed
    pub response: T,
    /// Mutations to persist, in order
    pub actions: Vec<ArchiveAction>,
}

impl<T> Planned<T> {
    /// A response that needs no durable change.
    pub fn read_only(response: T) -> Self {
        Self { response, actions: Vec::new() }
    }
}
