//! Fuzz target for the archive service under storage failures
//!
//! # Strategy
//!
//! Decode a seed, a failure rate and an operation sequence, then drive an
//! `ArchiveService` over `ChaoticStorage<MemoryStorage>`.
//!
//! # Invariants
//!
//! - Indices stay consistent with the records after every operation
//! - The archive never shrinks
//! - Durable state always matches in-memory state (no partial commits)
//! - Reopening from storage rebuilds the same archive

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use tardis_core::{Address, ArchiveConfig};
use tardis_crypto::encrypt;
use tardis_harness::{Operation, SimEnv, after_ts, caller_address, release_at};
use tardis_server::{ArchiveService, ChaoticStorage, MemoryStorage, Storage};

#[derive(Debug, Arbitrary)]
struct Input {
    seed: u64,
    failure_percent: u8,
    ops: Vec<Operation>,
}

fuzz_target!(|input: Input| {
    let env = SimEnv::with_seed(input.seed);
    let inner = MemoryStorage::new();
    let config = ArchiveConfig { key_expires_secs: 5, crypt_block_size: 5 };
    if ArchiveService::init(env.clone(), inner.clone(), config).is_err() {
        return;
    }

    let rate = f64::from(input.failure_percent % 101) / 100.0;
    let storage = ChaoticStorage::with_seed(inner.clone(), rate, input.seed);
    let Ok(mut service) = ArchiveService::open(env.clone(), storage) else {
        return;
    };

    for op in input.ops.iter().take(200) {
        let before = service.state().archive().len();

        match *op {
            Operation::GenerateKey { caller, length, force_new } => {
                let address = caller_address(caller);
                let _ = service.generate_key(&address, length.requested(), force_new);
            },
            Operation::AddMessage { caller, content, release_offset, private } => {
                let address = caller_address(caller);
                let keys = service.state().keys();
                let key = keys.get(&address).map_or("", |k| k.value.as_str());
                let ciphertext = encrypt(&content.to_bytes(), key.as_bytes(), 5);
                let release_ts = release_at(env.now(), release_offset);
                let _ = service.add_message(&address, &ciphertext, release_ts, private);
            },
            Operation::AdvanceTime { millis } => env.advance(u64::from(millis)),
            Operation::GetById { target } => {
                let id = target.resolve(service.state().archive().records());
                let _ = service.get_message_by_id(id);
            },
            Operation::GetLastId { caller } => {
                let _ = service.get_last_message_id(&caller_address(caller));
            },
            Operation::FilterByAddress { caller, address } => {
                let address = address.map_or_else(|| Address::new(""), caller_address);
                let _ = service.filter_by_address(&caller_address(caller), &address);
            },
            Operation::GetRecent { caller, count, after_back } => {
                let records = service.get_recent_messages(
                    &caller_address(caller),
                    usize::from(count),
                    after_ts(env.now(), after_back),
                );
                assert!(records.len() <= usize::from(count));
                assert!(records.iter().all(|r| r.release_ts <= env.now()));
            },
            Operation::GetKey { caller } => {
                let _ = service.get_key(&caller_address(caller));
            },
        }

        let archive = service.state().archive();
        assert!(archive.is_consistent());
        assert!(archive.len() >= before);
        assert_eq!(inner.message_count().unwrap() as usize, archive.len());
        assert_eq!(inner.load_seed().unwrap(), Some(service.state().rng_state()));
    }

    let reopened = ArchiveService::open(env, inner).unwrap();
    assert_eq!(reopened.state().archive().records(), service.state().archive().records());
});
