//! Chaotic storage wrapper for fault injection testing
//!
//! Storage wrapper that randomly fails operations to test error handling and
//! recovery. A failed `apply` never reaches the inner storage, so the batch
//! is dropped whole, which is exactly what a rolled-back transaction looks
//! like to the service.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tardis_core::{Address, ArchiveAction, ArchiveConfig, KeyRecord, MessageId, MessageRecord};
use tardis_crypto::RngState;

use super::{Storage, StorageError};

/// Chaotic storage wrapper that randomly injects failures
///
/// Delegates to an underlying storage implementation but randomly fails
/// operations based on a configured failure rate. Used for chaos testing to
/// verify error handling. Uses Arc<Mutex<>> for the RNG state, making it Clone
/// and thread-safe.
#[derive(Clone)]
pub struct ChaoticStorage<S: Storage> {
    inner: S,
    /// Failure rate (0.0 = never fail, 1.0 = always fail)
    failure_rate: f64,
    /// RNG state for deterministic chaos
    rng: Arc<Mutex<ChaoticRng>>,
    /// Operation counter for performance testing
    operation_count: Arc<Mutex<usize>>,
}

/// Simple deterministic RNG for chaos injection
///
/// Uses linear congruential generator (LCG) for fast, deterministic randomness.
/// This ensures chaos tests are reproducible with the same seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate next random value [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // LCG constants from Numerical Recipes
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }

    /// Check if we should fail (returns true with probability = `failure_rate`)
    fn should_fail(&mut self, failure_rate: f64) -> bool {
        self.next() < failure_rate
    }
}

impl<S: Storage> ChaoticStorage<S> {
    /// Create a new chaotic storage wrapper
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn new(inner: S, failure_rate: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self::with_seed(inner, failure_rate, 0x1234_5678_9ABC_DEF0)
    }

    /// Create with explicit seed for reproducible chaos
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        assert!(
            (0.0..=1.0).contains(&failure_rate),
            "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
        );

        Self {
            inner,
            failure_rate,
            rng: Arc::new(Mutex::new(ChaoticRng::new(seed))),
            operation_count: Arc::new(Mutex::new(0)),
        }
    }

    /// Underlying storage (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of storage operations attempted.
    ///
    /// Each call to any storage method increments this counter.
    pub fn operation_count(&self) -> usize {
        #[allow(clippy::expect_used)]
        *self.operation_count.lock().expect("operation_count mutex poisoned")
    }

    /// Increment operation counter
    fn increment_operation_count(&self) {
        #[allow(clippy::expect_used)]
        let mut count = self.operation_count.lock().expect("operation_count mutex poisoned");
        *count += 1;
    }

    /// Check if this operation should fail
    fn should_fail(&self) -> bool {
        #[allow(clippy::expect_used)]
        self.rng.lock().expect("ChaoticRng mutex poisoned").should_fail(self.failure_rate)
    }
}

impl<S: Storage> ChaoticStorage<S> {
    /// Count the operation and decide whether to inject a failure.
    fn gate(&self) -> Result<(), StorageError> {
        self.increment_operation_count();
        if self.should_fail() {
            return Err(StorageError::Io("chaotic failure injection".to_string()));
        }
        Ok(())
    }
}

impl<S: Storage> Storage for ChaoticStorage<S> {
    fn apply(&self, actions: &[ArchiveAction]) -> Result<(), StorageError> {
        self.gate()?;
        self.inner.apply(actions)
    }

    fn load_config(&self) -> Result<Option<ArchiveConfig>, StorageError> {
        self.gate()?;
        self.inner.load_config()
    }

    fn load_seed(&self) -> Result<Option<RngState>, StorageError> {
        self.gate()?;
        self.inner.load_seed()
    }

    fn message_count(&self) -> Result<u64, StorageError> {
        self.gate()?;
        self.inner.message_count()
    }

    fn load_messages(&self, from: u64, limit: usize) -> Result<Vec<MessageRecord>, StorageError> {
        self.gate()?;
        self.inner.load_messages(from, limit)
    }

    fn load_id_index(&self) -> Result<HashMap<MessageId, u64>, StorageError> {
        self.gate()?;
        self.inner.load_id_index()
    }

    fn load_address_index(&self) -> Result<HashMap<Address, Vec<u64>>, StorageError> {
        self.gate()?;
        self.inner.load_address_index()
    }

    fn load_keys(&self) -> Result<Vec<(Address, KeyRecord)>, StorageError> {
        self.gate()?;
        self.inner.load_keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn zero_rate_never_fails() {
        let storage = ChaoticStorage::new(MemoryStorage::new(), 0.0);
        for _ in 0..100 {
            storage.apply(&[ArchiveAction::StoreSeed(RngState::new(1, 2))]).unwrap();
        }
        assert_eq!(storage.operation_count(), 100);
    }

    #[test]
    fn full_rate_always_fails_and_writes_nothing() {
        let storage = ChaoticStorage::new(MemoryStorage::new(), 1.0);
        let result = storage.apply(&[ArchiveAction::StoreSeed(RngState::new(1, 2))]);

        assert!(matches!(result, Err(StorageError::Io(_))));
        assert_eq!(storage.inner().load_seed().unwrap(), None);
    }

    #[test]
    fn same_seed_same_failures() {
        let outcomes = |seed| {
            let storage = ChaoticStorage::with_seed(MemoryStorage::new(), 0.5, seed);
            (0..50).map(|_| storage.message_count().is_ok()).collect::<Vec<_>>()
        };

        assert_eq!(outcomes(7), outcomes(7));
        assert!(outcomes(7).contains(&false));
        assert!(outcomes(7).contains(&true));
    }
}
