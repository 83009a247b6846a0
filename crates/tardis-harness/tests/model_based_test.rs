//! Model-based property tests.
//!
//! These tests generate random operation sequences and verify that the real
//! service behaves identically to the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!     ModelArchive    RealArchive      Compare
//!     (reference)   (ArchiveService)   Results
//! ```

use proptest::prelude::*;
use tardis_core::{Address, ArchiveConfig, ArchiveError, KeyRecord};
use tardis_crypto::encrypt;
use tardis_harness::{
    IdTarget, KeyLength, ModelArchive, ObservableState, Operation, OperationResult, SimEnv,
    SmallMessage, after_ts, caller_address, release_at,
};
use tardis_server::{ArchiveService, MemoryStorage, ServiceError};

/// Real system wrapper that mirrors `ModelArchive`'s interface.
struct RealArchive {
    env: SimEnv,
    service: ArchiveService<SimEnv, MemoryStorage>,
}

impl RealArchive {
    fn new(seed: u64, config: ArchiveConfig) -> Self {
        let env = SimEnv::with_seed(seed);
        let service = ArchiveService::init(env.clone(), MemoryStorage::new(), config).unwrap();
        Self { env, service }
    }

    fn model(&self) -> ModelArchive {
        ModelArchive::new(
            *self.service.state().config(),
            self.service.state().rng_state(),
            self.env.now(),
        )
    }

    fn apply(&mut self, op: &Operation) -> OperationResult {
        match *op {
            Operation::GenerateKey { caller, length, force_new } => {
                let generated = self
                    .service
                    .generate_key(&caller_address(caller), length.requested(), force_new)
                    .unwrap();
                OperationResult::KeyGenerated(generated)
            },
            Operation::AddMessage { caller, content, release_offset, private } => {
                let address = caller_address(caller);
                let key =
                    self.service.state().keys().get(&address).map_or("", |k| k.value.as_str());
                let block_size = self.service.state().config().block_size();
                let ciphertext = encrypt(&content.to_bytes(), key.as_bytes(), block_size);
                let release_ts = release_at(self.env.now(), release_offset);

                match self.service.add_message(&address, &ciphertext, release_ts, private) {
                    Ok(record) => OperationResult::Added(record),
                    Err(err) => OperationResult::Rejected(archive_error(err)),
                }
            },
            Operation::AdvanceTime { millis } => {
                self.env.advance(u64::from(millis));
                OperationResult::TimeAdvanced
            },
            Operation::GetById { target } => {
                let id = target.resolve(self.service.state().archive().records());
                match self.service.get_message_by_id(id) {
                    Ok(record) => OperationResult::Message(record),
                    Err(err) => OperationResult::Rejected(archive_error(err)),
                }
            },
            Operation::GetLastId { caller } => {
                OperationResult::LastId(self.service.get_last_message_id(&caller_address(caller)))
            },
            Operation::FilterByAddress { caller, address } => {
                let address = address.map_or_else(|| Address::new(""), caller_address);
                match self.service.filter_by_address(&caller_address(caller), &address) {
                    Ok(records) => OperationResult::Messages(records),
                    Err(err) => OperationResult::Rejected(archive_error(err)),
                }
            },
            Operation::GetRecent { caller, count, after_back } => {
                OperationResult::Messages(self.service.get_recent_messages(
                    &caller_address(caller),
                    usize::from(count),
                    after_ts(self.env.now(), after_back),
                ))
            },
            Operation::GetKey { caller } => {
                OperationResult::Key(self.service.get_key(&caller_address(caller)))
            },
        }
    }

    fn observable_state(&self) -> ObservableState {
        let state = self.service.state();
        let mut keys: Vec<(Address, KeyRecord)> =
            state.keys().iter().map(|(a, k)| (a.clone(), k.clone())).collect();
        keys.sort_by(|a, b| a.0.cmp(&b.0));

        ObservableState {
            messages: state.archive().records().to_vec(),
            keys,
            rng_state: state.rng_state(),
        }
    }
}

fn archive_error(err: ServiceError) -> ArchiveError {
    match err {
        ServiceError::Archive(err) => err,
        other => panic!("unexpected service error: {other}"),
    }
}

/// Strategy for generating SmallMessage.
fn small_message_strategy() -> impl Strategy<Value = SmallMessage> {
    (any::<u8>(), any::<u8>()).prop_map(|(seed, size_class)| SmallMessage { seed, size_class })
}

fn key_length_strategy() -> impl Strategy<Value = KeyLength> {
    prop_oneof![
        1 => Just(KeyLength::Default),
        1 => Just(KeyLength::Zero),
        4 => Just(KeyLength::Short),
        1 => Just(KeyLength::Oversized),
    ]
}

fn id_target_strategy() -> impl Strategy<Value = IdTarget> {
    prop_oneof![
        1 => Just(IdTarget::Zero),
        6 => any::<u8>().prop_map(IdTarget::Stored),
        1 => any::<u64>().prop_map(IdTarget::Raw),
    ]
}

/// Strategy for generating operations with valid caller ids.
fn operation_strategy(num_callers: u8) -> impl Strategy<Value = Operation> {
    let caller = 0..num_callers;

    prop_oneof![
        2 => (caller.clone(), key_length_strategy(), any::<bool>()).prop_map(
            |(caller, length, force_new)| Operation::GenerateKey { caller, length, force_new }
        ),
        5 => (caller.clone(), small_message_strategy(), -50i16..2_000, any::<bool>()).prop_map(
            |(caller, content, release_offset, private)| Operation::AddMessage {
                caller,
                content,
                release_offset,
                private,
            }
        ),
        3 => (0u16..1_500).prop_map(|millis| Operation::AdvanceTime { millis }),
        2 => id_target_strategy().prop_map(|target| Operation::GetById { target }),
        1 => caller.clone().prop_map(|caller| Operation::GetLastId { caller }),
        2 => (caller.clone(), proptest::option::weighted(0.9, caller.clone())).prop_map(
            |(caller, address)| Operation::FilterByAddress { caller, address }
        ),
        2 => (caller.clone(), 0u8..8, proptest::option::of(0u16..3_000)).prop_map(
            |(caller, count, after_back)| Operation::GetRecent { caller, count, after_back }
        ),
        1 => caller.prop_map(|caller| Operation::GetKey { caller }),
    ]
}

fn short_keys() -> ArchiveConfig {
    // Two-second keys so expiry happens within a run
    ArchiveConfig { key_expires_secs: 2, crypt_block_size: 5 }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Verify that operation results match between model and real implementation.
    #[test]
    fn prop_results_match_model(
        seed in any::<u64>(),
        ops in prop::collection::vec(operation_strategy(3), 1..60),
    ) {
        let mut real = RealArchive::new(seed, short_keys());
        let mut model = real.model();

        for (i, op) in ops.iter().enumerate() {
            let expected = model.apply(op);
            let actual = real.apply(op);
            prop_assert_eq!(&expected, &actual, "op {} diverged: {:?}", i, op);
        }

        prop_assert_eq!(model.observable_state(), real.observable_state());
    }

    /// Indices stay consistent with the records after any sequence.
    #[test]
    fn prop_indices_stay_consistent(
        seed in any::<u64>(),
        ops in prop::collection::vec(operation_strategy(4), 1..60),
    ) {
        let mut real = RealArchive::new(seed, ArchiveConfig::default());
        let mut len = 0;

        for op in &ops {
            real.apply(op);
            let archive = real.service.state().archive();
            prop_assert!(archive.is_consistent());
            prop_assert!(archive.len() >= len, "archive shrank");
            len = archive.len();
        }
    }

    /// Rejected operations leave the observable state untouched.
    #[test]
    fn prop_rejections_change_nothing(
        seed in any::<u64>(),
        ops in prop::collection::vec(operation_strategy(3), 1..40),
    ) {
        let mut real = RealArchive::new(seed, short_keys());

        for op in &ops {
            let before = real.observable_state();
            if real.apply(op).is_rejected() {
                prop_assert_eq!(before, real.observable_state());
            }
        }
    }
}

#[test]
fn same_seed_same_archive() {
    let ops: Vec<Operation> = (0..3)
        .flat_map(|caller| {
            [
                Operation::GenerateKey { caller, length: KeyLength::Short, force_new: false },
                Operation::AddMessage {
                    caller,
                    content: SmallMessage { seed: caller, size_class: 2 },
                    release_offset: 10,
                    private: caller == 1,
                },
                Operation::AdvanceTime { millis: 20 },
            ]
        })
        .collect();

    let run = || {
        let mut real = RealArchive::new(99, ArchiveConfig::default());
        for op in &ops {
            real.apply(op);
        }
        real.observable_state()
    };

    let first = run();
    assert_eq!(first.messages.len(), 3);
    assert_eq!(first, run());
}
