//! Redb-backed durable storage implementation.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. Every
//! [`Storage::apply`] batch is one write transaction, so a crash mid-call
//! leaves the previous call's state intact.

use std::{collections::HashMap, fmt::Display, marker::PhantomData, path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use tardis_core::{Address, ArchiveAction, ArchiveConfig, KeyRecord, MessageId, MessageRecord};
use tardis_crypto::RngState;

use super::{CborCodec, Codec, Storage, StorageError};

/// Table: messages
/// Key: position as big-endian bytes [8 bytes]
/// Value: encoded MessageRecord
const MESSAGES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("messages");

/// Table: id_index
/// Key: message id as big-endian bytes [8 bytes]
/// Value: position as big-endian bytes [8 bytes]
const ID_INDEX: TableDefinition<&[u8], &[u8]> = TableDefinition::new("id_index");

/// Table: address_index
/// Key: address UTF-8 bytes
/// Value: encoded Vec<u64> of positions
const ADDRESS_INDEX: TableDefinition<&[u8], &[u8]> = TableDefinition::new("address_index");

/// Table: keys
/// Key: address UTF-8 bytes
/// Value: encoded KeyRecord
const KEYS: TableDefinition<&[u8], &[u8]> = TableDefinition::new("keys");

/// Table: seed
/// Key: [`SEED_KEY`]
/// Value: encoded RngState
const SEED: TableDefinition<&[u8], &[u8]> = TableDefinition::new("seed");

/// Table: config
/// Key: entry name
/// Value: u64 as big-endian bytes [8 bytes]
const CONFIG: TableDefinition<&[u8], &[u8]> = TableDefinition::new("config");

const SEED_KEY: &[u8] = b"state";
const KEY_EXPIRES_SECS: &[u8] = b"key_expires_secs";
const CRYPT_BLOCK_SIZE: &[u8] = b"crypt_block_size";

/// Durable storage backed by Redb.
///
/// Values are encoded with `C` (CBOR by default). Thread-safe through Redb's
/// internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStorage<C: Codec = CborCodec> {
    db: Arc<Database>,
    _codec: PhantomData<C>,
}

impl RedbStorage<CborCodec> {
    /// Open or create a CBOR-encoded database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with_codec(path)
    }
}

impl<C: Codec> RedbStorage<C> {
    /// Open or create a database at the given path, encoding values with `C`.
    ///
    /// Creates tables if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open_with_codec(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(io_error)?;

        let txn = db.begin_write().map_err(io_error)?;
        {
            let _ = txn.open_table(MESSAGES).map_err(io_error)?;
            let _ = txn.open_table(ID_INDEX).map_err(io_error)?;
            let _ = txn.open_table(ADDRESS_INDEX).map_err(io_error)?;
            let _ = txn.open_table(KEYS).map_err(io_error)?;
            let _ = txn.open_table(SEED).map_err(io_error)?;
            let _ = txn.open_table(CONFIG).map_err(io_error)?;
        }
        txn.commit().map_err(io_error)?;

        tracing::debug!(path = %path.as_ref().display(), codec = C::NAME, "Opened redb storage");

        Ok(Self { db: Arc::new(db), _codec: PhantomData })
    }

    /// Write every action inside `txn`. The caller commits or aborts.
    fn write_batch(txn: &WriteTransaction, actions: &[ArchiveAction]) -> Result<(), StorageError> {
        let mut messages = txn.open_table(MESSAGES).map_err(io_error)?;
        let mut id_index = txn.open_table(ID_INDEX).map_err(io_error)?;
        let mut address_index = txn.open_table(ADDRESS_INDEX).map_err(io_error)?;
        let mut keys = txn.open_table(KEYS).map_err(io_error)?;
        let mut seed = txn.open_table(SEED).map_err(io_error)?;
        let mut config = txn.open_table(CONFIG).map_err(io_error)?;

        let mut expected = next_position(&messages)?;

        for action in actions {
            match action {
                ArchiveAction::StoreConfig(cfg) => {
                    config
                        .insert(KEY_EXPIRES_SECS, cfg.key_expires_secs.to_be_bytes().as_slice())
                        .map_err(io_error)?;
                    config
                        .insert(CRYPT_BLOCK_SIZE, cfg.crypt_block_size.to_be_bytes().as_slice())
                        .map_err(io_error)?;
                },
                ArchiveAction::StoreSeed(state) => {
                    let bytes = C::encode(state)?;
                    seed.insert(SEED_KEY, bytes.as_slice()).map_err(io_error)?;
                },
                ArchiveAction::AppendMessage { position, record } => {
                    if *position != expected {
                        return Err(StorageError::Conflict { expected, got: *position });
                    }
                    let bytes = C::encode(record)?;
                    messages
                        .insert(position.to_be_bytes().as_slice(), bytes.as_slice())
                        .map_err(io_error)?;
                    expected += 1;
                },
                ArchiveAction::IndexMessageId { id, position } => {
                    id_index
                        .insert(id.get().to_be_bytes().as_slice(), position.to_be_bytes().as_slice())
                        .map_err(io_error)?;
                },
                ArchiveAction::IndexSender { sender, positions } => {
                    let bytes = C::encode(positions)?;
                    address_index
                        .insert(sender.as_str().as_bytes(), bytes.as_slice())
                        .map_err(io_error)?;
                },
                ArchiveAction::StoreKey { address, key } => {
                    let bytes = C::encode(key)?;
                    keys.insert(address.as_str().as_bytes(), bytes.as_slice()).map_err(io_error)?;
                },
            }
        }

        Ok(())
    }
}

impl<C: Codec> Storage for RedbStorage<C> {
    fn apply(&self, actions: &[ArchiveAction]) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(io_error)?;

        match Self::write_batch(&txn, actions) {
            Ok(()) => txn.commit().map_err(io_error),
            Err(err) => {
                txn.abort().map_err(io_error)?;
                Err(err)
            },
        }
    }

    fn load_config(&self) -> Result<Option<ArchiveConfig>, StorageError> {
        let txn = self.db.begin_read().map_err(io_error)?;
        let table = txn.open_table(CONFIG).map_err(io_error)?;

        let key_expires = table.get(KEY_EXPIRES_SECS).map_err(io_error)?;
        let block_size = table.get(CRYPT_BLOCK_SIZE).map_err(io_error)?;

        match (key_expires, block_size) {
            (None, None) => Ok(None),
            (Some(key_expires), Some(block_size)) => Ok(Some(ArchiveConfig {
                key_expires_secs: decode_u64(key_expires.value())?,
                crypt_block_size: decode_u64(block_size.value())?,
            })),
            _ => Err(StorageError::Corrupted("partial config".to_string())),
        }
    }

    fn load_seed(&self) -> Result<Option<RngState>, StorageError> {
        let txn = self.db.begin_read().map_err(io_error)?;
        let table = txn.open_table(SEED).map_err(io_error)?;

        match table.get(SEED_KEY).map_err(io_error)? {
            Some(value) => Ok(Some(C::decode(value.value())?)),
            None => Ok(None),
        }
    }

    fn message_count(&self) -> Result<u64, StorageError> {
        let txn = self.db.begin_read().map_err(io_error)?;
        let table = txn.open_table(MESSAGES).map_err(io_error)?;

        next_position(&table)
    }

    fn load_messages(&self, from: u64, limit: usize) -> Result<Vec<MessageRecord>, StorageError> {
        let txn = self.db.begin_read().map_err(io_error)?;
        let table = txn.open_table(MESSAGES).map_err(io_error)?;

        let start_key = from.to_be_bytes();
        let results = table.range(start_key.as_slice()..).map_err(io_error)?;

        let mut messages = Vec::with_capacity(limit.min(1024));
        let mut expected = from;
        for result in results {
            if messages.len() >= limit {
                break;
            }

            let (key, value) = result.map_err(io_error)?;
            let position = decode_u64(key.value())?;
            if position != expected {
                return Err(StorageError::Corrupted(format!(
                    "message log gap: expected position {expected}, found {position}"
                )));
            }

            messages.push(C::decode(value.value())?);
            expected += 1;
        }

        Ok(messages)
    }

    fn load_id_index(&self) -> Result<HashMap<MessageId, u64>, StorageError> {
        let txn = self.db.begin_read().map_err(io_error)?;
        let table = txn.open_table(ID_INDEX).map_err(io_error)?;

        let mut index = HashMap::new();
        for result in table.iter().map_err(io_error)? {
            let (key, value) = result.map_err(io_error)?;
            index.insert(MessageId::new(decode_u64(key.value())?), decode_u64(value.value())?);
        }

        Ok(index)
    }

    fn load_address_index(&self) -> Result<HashMap<Address, Vec<u64>>, StorageError> {
        let txn = self.db.begin_read().map_err(io_error)?;
        let table = txn.open_table(ADDRESS_INDEX).map_err(io_error)?;

        let mut index = HashMap::new();
        for result in table.iter().map_err(io_error)? {
            let (key, value) = result.map_err(io_error)?;
            index.insert(decode_address(key.value())?, C::decode(value.value())?);
        }

        Ok(index)
    }

    fn load_keys(&self) -> Result<Vec<(Address, KeyRecord)>, StorageError> {
        let txn = self.db.begin_read().map_err(io_error)?;
        let table = txn.open_table(KEYS).map_err(io_error)?;

        let mut keys = Vec::new();
        for result in table.iter().map_err(io_error)? {
            let (key, value) = result.map_err(io_error)?;
            keys.push((decode_address(key.value())?, C::decode(value.value())?));
        }

        Ok(keys)
    }
}

/// Position the next appended message will occupy.
fn next_position<T: ReadableTable<&'static [u8], &'static [u8]>>(
    table: &T,
) -> Result<u64, StorageError> {
    match table.last().map_err(io_error)? {
        Some((key, _)) => Ok(decode_u64(key.value())? + 1),
        None => Ok(0),
    }
}

fn decode_u64(bytes: &[u8]) -> Result<u64, StorageError> {
    let array: [u8; 8] = bytes.try_into().map_err(|_| {
        StorageError::Corrupted(format!("expected 8-byte integer, got {} bytes", bytes.len()))
    })?;
    Ok(u64::from_be_bytes(array))
}

fn decode_address(bytes: &[u8]) -> Result<Address, StorageError> {
    String::from_utf8(bytes.to_vec())
        .map(Address::from)
        .map_err(|e| StorageError::Corrupted(format!("address is not UTF-8: {e}")))
}

fn io_error<E: Display>(err: E) -> StorageError {
    StorageError::Io(err.to_string())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use tempfile::TempDir;

    use super::*;
    use crate::storage::JsonCodec;

    fn record(sender: &str, id: u64) -> MessageRecord {
        MessageRecord {
            text: Bytes::from(format!("msg-{id}")),
            release_ts: 100,
            send_ts: 50,
            sender: Address::from(sender),
            id: Some(MessageId::new(id)),
            private: false,
        }
    }

    fn append(position: u64, sender: &str, id: u64) -> Vec<ArchiveAction> {
        vec![
            ArchiveAction::AppendMessage { position, record: record(sender, id) },
            ArchiveAction::IndexMessageId { id: MessageId::new(id), position },
            ArchiveAction::IndexSender {
                sender: Address::from(sender),
                positions: (0..=position).collect(),
            },
        ]
    }

    #[test]
    fn empty_database() {
        let dir = TempDir::new().unwrap();
        let storage = RedbStorage::open(dir.path().join("tardis.redb")).unwrap();

        assert_eq!(storage.load_config().unwrap(), None);
        assert_eq!(storage.load_seed().unwrap(), None);
        assert_eq!(storage.message_count().unwrap(), 0);
        assert!(storage.load_messages(0, 10).unwrap().is_empty());
        assert!(storage.load_keys().unwrap().is_empty());
    }

    #[test]
    fn config_is_stored_as_scalars() {
        let dir = TempDir::new().unwrap();
        let storage = RedbStorage::open(dir.path().join("tardis.redb")).unwrap();
        let config = ArchiveConfig { key_expires_secs: 60, crypt_block_size: 3 };

        storage.apply(&[ArchiveAction::StoreConfig(config)]).unwrap();
        assert_eq!(storage.load_config().unwrap(), Some(config));
    }

    #[test]
    fn messages_and_indices_persist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tardis.redb");
        {
            let storage = RedbStorage::open(&path).unwrap();
            storage.apply(&append(0, "alice", 11)).unwrap();
            storage.apply(&append(1, "alice", 12)).unwrap();
        }

        let storage = RedbStorage::open(&path).unwrap();
        assert_eq!(storage.message_count().unwrap(), 2);
        assert_eq!(storage.load_messages(0, 10).unwrap(), vec![record("alice", 11), record("alice", 12)]);
        assert_eq!(storage.load_messages(1, 1).unwrap(), vec![record("alice", 12)]);
        assert_eq!(storage.load_id_index().unwrap().get(&MessageId::new(12)), Some(&1));
        assert_eq!(
            storage.load_address_index().unwrap().get(&Address::from("alice")),
            Some(&vec![0, 1])
        );
    }

    #[test]
    fn conflict_aborts_whole_batch() {
        let dir = TempDir::new().unwrap();
        let storage = RedbStorage::open(dir.path().join("tardis.redb")).unwrap();

        let mut batch = vec![ArchiveAction::StoreSeed(RngState::new(1, 2))];
        batch.extend(append(3, "alice", 11));

        assert_eq!(storage.apply(&batch), Err(StorageError::Conflict { expected: 0, got: 3 }));
        assert_eq!(storage.load_seed().unwrap(), None);
        assert!(storage.load_id_index().unwrap().is_empty());
    }

    #[test]
    fn json_codec_round_trips_keys() {
        let dir = TempDir::new().unwrap();
        let storage =
            RedbStorage::<JsonCodec>::open_with_codec(dir.path().join("tardis.redb")).unwrap();
        let key = KeyRecord { value: "abc".into(), expires: 99 };

        storage
            .apply(&[ArchiveAction::StoreKey { address: Address::from("bob"), key: key.clone() }])
            .unwrap();

        assert_eq!(storage.load_keys().unwrap(), vec![(Address::from("bob"), key)]);
    }
}
