//! Crash recovery tests for `RedbStorage`.
//!
//! These tests verify that an archive persists across database close/reopen
//! cycles, simulating process restarts, and that damaged state is detected.

use bytes::Bytes;
use tardis_core::{Address, ArchiveAction, ArchiveConfig, MessageId, MessageRecord};
use tardis_crypto::{RngState, encrypt};
use tardis_harness::SimEnv;
use tardis_server::{
    ArchiveService, Codec, JsonCodec, RedbStorage, ServiceError, Storage, StorageError,
};
use tempfile::tempdir;

fn populate<C: Codec>(
    env: &SimEnv,
    storage: RedbStorage<C>,
) -> ArchiveService<SimEnv, RedbStorage<C>> {
    let config = ArchiveConfig { key_expires_secs: 600, crypt_block_size: 3 };
    let mut service = ArchiveService::init(env.clone(), storage, config).unwrap();

    for (i, name) in ["alice", "bob", "alice", "carol", "alice"].iter().enumerate() {
        let caller = Address::from(*name);
        service.generate_key(&caller, Some(48), false).unwrap();
        let key = service.get_key(&caller).unwrap();
        let text = format!("message {i} from {name}");
        let ciphertext = encrypt(text.as_bytes(), key.value.as_bytes(), 3);
        service.add_message(&caller, &ciphertext, env.now() + 50 * i as u64, i == 3).unwrap();
        env.advance(20);
    }

    service
}

#[test]
fn test_archive_survives_restart() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tardis.redb");
    let env = SimEnv::with_seed(21);

    let before = {
        let service = populate(&env, RedbStorage::open(&db_path).unwrap());
        (
            service.state().archive().records().to_vec(),
            service.state().rng_state(),
            service.filter_by_address(&Address::from("bob"), &Address::from("alice")).unwrap(),
            service.get_recent_messages(&Address::from("carol"), 10, None),
        )
        // Database dropped
    };

    let service = ArchiveService::open(env.clone(), RedbStorage::open(&db_path).unwrap()).unwrap();
    assert_eq!(service.state().archive().records(), before.0.as_slice());
    assert_eq!(service.state().rng_state(), before.1);
    assert_eq!(
        service.filter_by_address(&Address::from("bob"), &Address::from("alice")).unwrap(),
        before.2
    );
    assert_eq!(service.get_recent_messages(&Address::from("carol"), 10, None), before.3);
    assert_eq!(service.state().config().crypt_block_size, 3);
    assert_eq!(service.state().keys().len(), 3);
}

#[test]
fn test_generator_continues_after_restart() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tardis.redb");
    let env = SimEnv::with_seed(4);
    let alice = Address::from("alice");

    // Reference run without a restart
    let uninterrupted = {
        let ref_dir = tempdir().unwrap();
        let storage = RedbStorage::open(ref_dir.path().join("a.redb")).unwrap();
        let mut service = populate(&env, storage);
        service.generate_key(&alice, Some(30), true).unwrap();
        service.get_key(&alice).unwrap().value
    };

    let env = SimEnv::with_seed(4);
    drop(populate(&env, RedbStorage::open(&db_path).unwrap()));
    let mut service = ArchiveService::open(env, RedbStorage::open(&db_path).unwrap()).unwrap();
    service.generate_key(&alice, Some(30), true).unwrap();

    assert_eq!(service.get_key(&alice).unwrap().value, uninterrupted);
}

#[test]
fn test_json_codec_survives_restart() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tardis.json.redb");
    let env = SimEnv::with_seed(8);

    let records = {
        let storage = RedbStorage::<JsonCodec>::open_with_codec(&db_path).unwrap();
        populate(&env, storage).state().archive().records().to_vec()
    };

    let storage = RedbStorage::<JsonCodec>::open_with_codec(&db_path).unwrap();
    let service = ArchiveService::open(env, storage).unwrap();
    assert_eq!(service.state().archive().records(), records.as_slice());
}

#[test]
fn test_uninitialized_database() {
    let dir = tempdir().unwrap();
    let storage = RedbStorage::open(dir.path().join("empty.redb")).unwrap();

    assert_eq!(
        ArchiveService::open(SimEnv::with_seed(0), storage).err(),
        Some(ServiceError::NotInitialized)
    );
}

#[test]
fn test_dangling_index_is_detected() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tardis.redb");
    let env = SimEnv::with_seed(2);

    {
        let storage = RedbStorage::open(&db_path).unwrap();
        drop(populate(&env, storage.clone()));

        // An id routed past the end of the log
        storage
            .apply(&[ArchiveAction::IndexMessageId { id: MessageId::new(77), position: 999 }])
            .unwrap();
    }

    let storage = RedbStorage::open(&db_path).unwrap();
    assert!(matches!(
        ArchiveService::open(env, storage).err(),
        Some(ServiceError::Storage(StorageError::Corrupted(_)))
    ));
}

#[test]
fn test_sender_index_mismatch_is_detected() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tardis.redb");
    let env = SimEnv::with_seed(2);

    {
        let storage = RedbStorage::open(&db_path).unwrap();
        drop(populate(&env, storage.clone()));

        // Position 1 belongs to bob
        storage
            .apply(&[ArchiveAction::IndexSender {
                sender: Address::from("mallory"),
                positions: vec![1],
            }])
            .unwrap();
    }

    let storage = RedbStorage::open(&db_path).unwrap();
    assert!(matches!(
        ArchiveService::open(env, storage).err(),
        Some(ServiceError::Storage(StorageError::Corrupted(_)))
    ));
}

#[test]
fn test_out_of_range_seed_is_detected() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("tardis.redb");
    let env = SimEnv::with_seed(2);

    {
        let storage = RedbStorage::open(&db_path).unwrap();
        drop(populate(&env, storage.clone()));

        storage.apply(&[ArchiveAction::StoreSeed(RngState::new(1, i64::MAX))]).unwrap();
    }

    let storage = RedbStorage::open(&db_path).unwrap();
    assert!(matches!(
        ArchiveService::open(env, storage).err(),
        Some(ServiceError::Storage(StorageError::Corrupted(_)))
    ));
}

#[test]
fn test_misplaced_append_is_rejected() {
    let dir = tempdir().unwrap();
    let storage = RedbStorage::open(dir.path().join("tardis.redb")).unwrap();
    let env = SimEnv::with_seed(9);
    drop(populate(&env, storage.clone()));

    let record = MessageRecord {
        text: Bytes::from_static(b"forged"),
        release_ts: 0,
        send_ts: 0,
        sender: Address::from("mallory"),
        id: Some(MessageId::new(1)),
        private: false,
    };

    assert_eq!(
        storage.apply(&[ArchiveAction::AppendMessage { position: 2, record }]),
        Err(StorageError::Conflict { expected: 5, got: 2 })
    );
    assert_eq!(storage.message_count().unwrap(), 5);
}
