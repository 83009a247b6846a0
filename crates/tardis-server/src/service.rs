//! Write-through façade over the archive state machine.
//!
//! [`ArchiveService`] binds an [`Environment`], a [`Storage`] backend and the
//! in-memory [`ArchiveState`]. Mutations follow plan, commit, apply:
//!
//! ```text
//! ArchiveState::plan(&self) ──► Planned { response, actions }
//!                                      │
//!                       Storage::apply(&actions)  (one transaction)
//!                                      │ Ok
//!                       ArchiveState::apply_all(actions)
//!                                      │
//!                                  response
//! ```
//!
//! A failed commit returns before the in-memory state is touched, so both
//! sides stay at the previous call's state.

use tardis_core::{
    Address, ArchiveConfig, ArchiveState, Environment, KeyRecord, KeyRegistry, MessageArchive,
    MessageId, MessageRecord, Planned,
};

use crate::{
    error::ServiceError,
    storage::{Storage, StorageError},
};

/// Durable archive host.
pub struct ArchiveService<E: Environment, S: Storage> {
    env: E,
    storage: S,
    state: ArchiveState,
}

impl<E: Environment, S: Storage> ArchiveService<E, S> {
    /// Initialize a new archive in `storage`.
    ///
    /// # Errors
    ///
    /// `AlreadyInitialized` if `storage` already holds a configuration, or a
    /// storage error if the initial commit fails.
    pub fn init(env: E, storage: S, config: ArchiveConfig) -> Result<Self, ServiceError> {
        if storage.load_config()?.is_some() {
            return Err(ServiceError::AlreadyInitialized);
        }

        let Planned { response: state, actions } = ArchiveState::init(config, &env);
        storage.apply(&actions).inspect_err(|err| {
            tracing::error!(error = %err, "Failed to persist archive initialization");
        })?;

        Ok(Self { env, storage, state })
    }

    /// Rebuild the archive held in `storage`.
    ///
    /// # Errors
    ///
    /// `NotInitialized` if `storage` holds no configuration. `Corrupted` if
    /// the seed is missing or out of range, or an index points at a missing
    /// or mismatched record.
    pub fn open(env: E, storage: S) -> Result<Self, ServiceError> {
        let config = storage.load_config()?.ok_or(ServiceError::NotInitialized)?;
        let seed = storage
            .load_seed()?
            .ok_or_else(|| StorageError::Corrupted("configuration without seed".to_string()))?;
        if !seed.is_reachable() {
            return Err(StorageError::Corrupted(format!("seed {seed:?} out of range")).into());
        }

        let count = storage.message_count()?;
        let limit = usize::try_from(count)
            .map_err(|_| StorageError::Corrupted(format!("message count {count} too large")))?;
        let messages = storage.load_messages(0, limit)?;
        if messages.len() != limit {
            return Err(StorageError::Corrupted(format!(
                "expected {count} messages, loaded {}",
                messages.len()
            ))
            .into());
        }

        let archive = MessageArchive::from_parts(
            messages,
            storage.load_id_index()?,
            storage.load_address_index()?,
        );
        if !archive.is_consistent() {
            return Err(StorageError::Corrupted("index points at missing record".to_string()).into());
        }

        let keys = KeyRegistry::from_records(storage.load_keys()?);

        tracing::info!(messages = archive.len(), keys = keys.len(), "Opened archive");

        let state = ArchiveState::from_parts(config, seed, keys, archive);
        Ok(Self { env, storage, state })
    }

    /// Open the archive in `storage`, initializing it with `config` if absent.
    ///
    /// # Errors
    ///
    /// As [`open`](Self::open) and [`init`](Self::init).
    pub fn open_or_init(env: E, storage: S, config: ArchiveConfig) -> Result<Self, ServiceError> {
        match Self::open(env.clone(), storage.clone()) {
            Err(ServiceError::NotInitialized) => Self::init(env, storage, config),
            other => other,
        }
    }

    /// In-memory archive state.
    pub fn state(&self) -> &ArchiveState {
        &self.state
    }

    /// Storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Persist planned actions, then apply them in memory.
    fn commit<T>(&mut self, planned: Planned<T>) -> Result<T, ServiceError> {
        let Planned { response, actions } = planned;
        if actions.is_empty() {
            return Ok(response);
        }

        if let Err(err) = self.storage.apply(&actions) {
            tracing::error!(error = %err, actions = actions.len(), "Storage commit failed");
            return Err(err.into());
        }

        self.state.apply_all(actions);
        Ok(response)
    }

    /// Submit `ciphertext` from `caller`, readable once `release_ts` passes.
    ///
    /// Returns the submitted record with the ciphertext as text and no id.
    ///
    /// # Errors
    ///
    /// `InvalidRelease`, `EmptyMessage`, `InvalidKeyState` (in that order),
    /// or a storage error.
    pub fn add_message(
        &mut self,
        caller: &Address,
        ciphertext: &[u8],
        release_ts: u64,
        private: bool,
    ) -> Result<MessageRecord, ServiceError> {
        let planned =
            self.state.add_message(caller, ciphertext, release_ts, private, &self.env)?;
        let record = self.commit(planned)?;

        tracing::info!(
            sender = %caller,
            position = self.state.archive().len() - 1,
            release_ts,
            private,
            "Message archived"
        );

        Ok(record)
    }

    /// Message with `id`, text withheld until release.
    ///
    /// # Errors
    ///
    /// `EmptyId` for id 0.
    pub fn get_message_by_id(&self, id: u64) -> Result<Option<MessageRecord>, ServiceError> {
        tracing::debug!(id, "Lookup by id");
        Ok(self.state.get_message_by_id(id, &self.env)?)
    }

    /// Id of `caller`'s most recent message.
    pub fn get_last_message_id(&self, caller: &Address) -> Option<MessageId> {
        self.state.get_last_message_id(caller)
    }

    /// Messages sent by `address`, most recent first, as seen by `caller`.
    ///
    /// # Errors
    ///
    /// `EmptyAddress` for an empty address.
    pub fn filter_by_address(
        &self,
        caller: &Address,
        address: &Address,
    ) -> Result<Vec<MessageRecord>, ServiceError> {
        tracing::debug!(caller = %caller, address = %address, "Lookup by address");
        Ok(self.state.filter_by_address(caller, address, &self.env)?)
    }

    /// Up to `count` released messages visible to `caller`, newest first.
    pub fn get_recent_messages(
        &self,
        caller: &Address,
        count: usize,
        after_ts: Option<u64>,
    ) -> Vec<MessageRecord> {
        tracing::debug!(caller = %caller, count, after_ts, "Recent messages");
        self.state.get_recent_messages(caller, count, after_ts, &self.env)
    }

    /// Make sure `caller` holds a usable key, issuing one if needed.
    ///
    /// # Errors
    ///
    /// Only storage errors; key generation itself always succeeds.
    pub fn generate_key(
        &mut self,
        caller: &Address,
        requested_length: Option<usize>,
        force_new: bool,
    ) -> Result<bool, ServiceError> {
        let planned = self.state.generate_key(caller, requested_length, force_new, &self.env);
        self.commit(planned)
    }

    /// `caller`'s key if present and unexpired.
    pub fn get_key(&self, caller: &Address) -> Option<KeyRecord> {
        self.state.get_key(caller, &self.env)
    }

    /// The caller's own address.
    pub fn echo(&self, caller: &Address) -> Address {
        caller.clone()
    }
}
