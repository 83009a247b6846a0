#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tardis_core::{Address, ArchiveAction, ArchiveConfig, KeyRecord, MessageId, MessageRecord};
use tardis_crypto::RngState;

use super::{Storage, StorageError};

/// In-memory storage implementation for testing and simulation
///
/// Uses `HashMap` for the indices and keys and a Vec for the ordered message
/// log. All state is wrapped in Arc<Mutex<>> to allow Clone and concurrent
/// access. Uses `lock().expect()` which will panic if the mutex is poisoned,
/// acceptable for test code.
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryStorageInner>>,
}

#[derive(Default)]
struct MemoryStorageInner {
    config: Option<ArchiveConfig>,
    seed: Option<RngState>,

    /// Messages in position order
    messages: Vec<MessageRecord>,

    id_index: HashMap<MessageId, u64>,
    address_index: HashMap<Address, Vec<u64>>,
    keys: HashMap<Address, KeyRecord>,
}

impl MemoryStorageInner {
    /// Reject the batch if any append lands off the end of the log.
    fn check_appends(&self, actions: &[ArchiveAction]) -> Result<(), StorageError> {
        let mut expected = self.messages.len() as u64;
        for action in actions {
            if let ArchiveAction::AppendMessage { position, .. } = action {
                if *position != expected {
                    return Err(StorageError::Conflict { expected, got: *position });
                }
                expected += 1;
            }
        }
        Ok(())
    }

    fn write(&mut self, action: &ArchiveAction) {
        match action {
            ArchiveAction::StoreConfig(config) => self.config = Some(*config),
            ArchiveAction::StoreSeed(seed) => self.seed = Some(*seed),
            ArchiveAction::AppendMessage { position, record } => {
                debug_assert_eq!(*position, self.messages.len() as u64);
                self.messages.push(record.clone());
            },
            ArchiveAction::IndexMessageId { id, position } => {
                self.id_index.insert(*id, *position);
            },
            ArchiveAction::IndexSender { sender, positions } => {
                self.address_index.insert(sender.clone(), positions.clone());
            },
            ArchiveAction::StoreKey { address, key } => {
                self.keys.insert(address.clone(), key.clone());
            },
        }
    }
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(MemoryStorageInner::default())) }
    }

    /// Number of addresses with a stored key.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned (a thread panicked while
    /// holding the lock). This is acceptable for test/simulation code.
    #[allow(clippy::expect_used)]
    pub fn key_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").keys.len()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn apply(&self, actions: &[ArchiveAction]) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        // Appends are the only fallible write, so validating them up front
        // makes the batch all-or-nothing.
        inner.check_appends(actions)?;
        for action in actions {
            inner.write(action);
        }

        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn load_config(&self) -> Result<Option<ArchiveConfig>, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").config)
    }

    #[allow(clippy::expect_used)]
    fn load_seed(&self) -> Result<Option<RngState>, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").seed)
    }

    #[allow(clippy::expect_used)]
    fn message_count(&self) -> Result<u64, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").messages.len() as u64)
    }

    #[allow(clippy::expect_used)]
    fn load_messages(&self, from: u64, limit: usize) -> Result<Vec<MessageRecord>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");

        let start = usize::try_from(from).unwrap_or(usize::MAX).min(inner.messages.len());
        let end = start.saturating_add(limit).min(inner.messages.len());

        Ok(inner.messages[start..end].to_vec())
    }

    #[allow(clippy::expect_used)]
    fn load_id_index(&self) -> Result<HashMap<MessageId, u64>, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").id_index.clone())
    }

    #[allow(clippy::expect_used)]
    fn load_address_index(&self) -> Result<HashMap<Address, Vec<u64>>, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").address_index.clone())
    }

    #[allow(clippy::expect_used)]
    fn load_keys(&self) -> Result<Vec<(Address, KeyRecord)>, StorageError> {
        let inner = self.inner.lock().expect("Mutex poisoned");
        Ok(inner.keys.iter().map(|(a, k)| (a.clone(), k.clone())).collect())
    }
}
