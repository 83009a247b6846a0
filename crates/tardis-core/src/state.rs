//! Archive state machine.
//!
//! Owns the configuration, generator, key registry and message archive.
//! Reads are answered directly. Writes are planned against a staged copy of
//! the generator and returned as [`ArchiveAction`]s for the driver to commit.
//!
//! Flow for a submission: validate release time and payload, look up the
//! caller's key, decrypt, draw an id, emit append + index + seed actions.

use bytes::Bytes;
use tardis_crypto::{DeterministicRng, RngState, decrypt};

use crate::{
    action::{ArchiveAction, Planned},
    archive::MessageArchive,
    config::ArchiveConfig,
    env::Environment,
    error::ArchiveError,
    keys::KeyRegistry,
    types::{Address, KeyRecord, MessageId, MessageRecord},
};

/// In-memory archive state.
#[derive(Debug, Clone)]
pub struct ArchiveState {
    config: ArchiveConfig,
    rng: DeterministicRng,
    keys: KeyRegistry,
    archive: MessageArchive,
}

impl ArchiveState {
    /// Fresh archive seeded from the environment's entropy.
    ///
    /// Returns the state together with the actions that persist its
    /// configuration and seed.
    pub fn init<E: Environment>(config: ArchiveConfig, env: &E) -> Planned<Self> {
        let seed = RngState::from_entropy(env.random_u64(), env.random_u64());

        tracing::info!(
            key_expires_secs = config.key_expires_secs,
            crypt_block_size = config.crypt_block_size,
            "Initializing archive"
        );

        let state = Self {
            config,
            rng: DeterministicRng::new(seed),
            keys: KeyRegistry::new(),
            archive: MessageArchive::new(),
        };

        Planned {
            response: state,
            actions: vec![ArchiveAction::StoreConfig(config), ArchiveAction::StoreSeed(seed)],
        }
    }

    /// State rebuilt from stored parts.
    pub fn from_parts(
        config: ArchiveConfig,
        seed: RngState,
        keys: KeyRegistry,
        archive: MessageArchive,
    ) -> Self {
        Self { config, rng: DeterministicRng::new(seed), keys, archive }
    }

    /// Configuration fixed at init.
    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Current generator state.
    pub fn rng_state(&self) -> RngState {
        self.rng.state()
    }

    /// Key registry.
    pub fn keys(&self) -> &KeyRegistry {
        &self.keys
    }

    /// Message archive.
    pub fn archive(&self) -> &MessageArchive {
        &self.archive
    }

    /// Plan a message submission from `caller`.
    ///
    /// The response carries the submitted ciphertext and no id, so it does not
    /// leak the id of a private message; the sender learns the id through
    /// [`get_last_message_id`](Self::get_last_message_id).
    ///
    /// # Errors
    ///
    /// Checked in order: `InvalidRelease` if `release_ts` is in the past,
    /// `EmptyMessage` for an empty payload, `InvalidKeyState` if the caller
    /// has no usable key. Nothing is planned on error.
    pub fn add_message<E: Environment>(
        &self,
        caller: &Address,
        ciphertext: &[u8],
        release_ts: u64,
        private: bool,
        env: &E,
    ) -> Result<Planned<MessageRecord>, ArchiveError> {
        let now = env.wall_clock_millis();

        if release_ts < now {
            return Err(ArchiveError::InvalidRelease { release_ts, now });
        }
        if ciphertext.is_empty() {
            return Err(ArchiveError::EmptyMessage);
        }

        let key = self.keys.require_valid_key(caller, now)?;
        let plaintext = decrypt(ciphertext, key.value.as_bytes(), self.config.block_size());

        let mut rng = self.rng;
        let id = MessageId::from_draw(rng.next());
        let position = self.archive.next_position();

        if let Some(existing) = self.archive.position_of(id) {
            tracing::warn!(
                id = %id,
                existing_position = existing,
                new_position = position,
                "Message id collision, rerouting id to newest message"
            );
        }

        let record = MessageRecord {
            text: Bytes::from(plaintext),
            release_ts,
            send_ts: now,
            sender: caller.clone(),
            id: Some(id),
            private,
        };

        let response = MessageRecord {
            text: Bytes::copy_from_slice(ciphertext),
            id: None,
            ..record.clone()
        };

        let mut positions = self.archive.positions_for(caller).to_vec();
        positions.push(position);

        tracing::debug!(sender = %caller, position, release_ts, private, "Planned message append");

        Ok(Planned {
            response,
            actions: vec![
                ArchiveAction::StoreSeed(rng.state()),
                ArchiveAction::AppendMessage { position, record },
                ArchiveAction::IndexMessageId { id, position },
                ArchiveAction::IndexSender { sender: caller.clone(), positions },
            ],
        })
    }

    /// Stored message for `id`, masked while time-locked.
    ///
    /// The sender gets no exemption here. Returns `Ok(None)` for an unknown
    /// id and `EmptyId` for id 0.
    pub fn get_message_by_id<E: Environment>(
        &self,
        id: u64,
        env: &E,
    ) -> Result<Option<MessageRecord>, ArchiveError> {
        if id == 0 {
            return Err(ArchiveError::EmptyId);
        }
        Ok(self.archive.get_by_id(MessageId::new(id), env.wall_clock_millis()))
    }

    /// Id of `caller`'s most recent message.
    pub fn get_last_message_id(&self, caller: &Address) -> Option<MessageId> {
        self.archive.last_id_for(caller)
    }

    /// Messages sent by `address`, most recent first, as seen by `caller`.
    pub fn filter_by_address<E: Environment>(
        &self,
        caller: &Address,
        address: &Address,
        env: &E,
    ) -> Result<Vec<MessageRecord>, ArchiveError> {
        if address.is_empty() {
            return Err(ArchiveError::EmptyAddress);
        }
        Ok(self.archive.filter_by_address(caller, address, env.wall_clock_millis()))
    }

    /// Up to `count` released messages, newest first.
    ///
    /// An `after_ts` of `None` or `Some(0)` disables the lower bound.
    pub fn get_recent_messages<E: Environment>(
        &self,
        caller: &Address,
        count: usize,
        after_ts: Option<u64>,
        env: &E,
    ) -> Vec<MessageRecord> {
        let after_ts = after_ts.filter(|&ts| ts > 0);
        self.archive.recent(caller, count, after_ts, env.wall_clock_millis())
    }

    /// Plan key issuance for `caller`.
    ///
    /// Issues a key when `force_new` is set or the caller has no unexpired
    /// key; otherwise plans nothing. The response is always `true`.
    pub fn generate_key<E: Environment>(
        &self,
        caller: &Address,
        requested_length: Option<usize>,
        force_new: bool,
        env: &E,
    ) -> Planned<bool> {
        let now = env.wall_clock_millis();

        if !self.keys.needs_new_key(caller, now, force_new) {
            tracing::debug!(address = %caller, "Existing key still valid");
            return Planned::read_only(true);
        }

        let mut rng = self.rng;
        let key = KeyRegistry::issue(
            requested_length,
            now,
            self.config.key_lifetime_millis(),
            &mut rng,
        );

        tracing::info!(
            address = %caller,
            length = key.value.len(),
            expires = key.expires,
            forced = force_new,
            "Issuing key"
        );

        Planned {
            response: true,
            actions: vec![
                ArchiveAction::StoreSeed(rng.state()),
                ArchiveAction::StoreKey { address: caller.clone(), key },
            ],
        }
    }

    /// `caller`'s key if present and unexpired.
    pub fn get_key<E: Environment>(&self, caller: &Address, env: &E) -> Option<KeyRecord> {
        self.keys.get_key(caller, env.wall_clock_millis()).cloned()
    }

    /// Apply a committed action.
    pub fn apply(&mut self, action: ArchiveAction) {
        match action {
            ArchiveAction::StoreConfig(config) => self.config = config,
            ArchiveAction::StoreSeed(seed) => self.rng = DeterministicRng::new(seed),
            ArchiveAction::AppendMessage { position, record } => {
                self.archive.append(position, record);
            },
            ArchiveAction::IndexMessageId { id, position } => self.archive.index_id(id, position),
            ArchiveAction::IndexSender { sender, positions } => {
                self.archive.index_sender(sender, positions);
            },
            ArchiveAction::StoreKey { address, key } => self.keys.insert(address, key),
        }
    }

    /// Apply committed actions in order.
    pub fn apply_all(&mut self, actions: impl IntoIterator<Item = ArchiveAction>) {
        for action in actions {
            self.apply(action);
        }
    }
}
