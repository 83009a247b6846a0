//! Seeded xorshift generator for message ids and key material.
//!
//! State is a pair of integers. The first draw after seeding mixes in the
//! full-width seed value; every later state word is a 32-bit value, so the
//! state lives in the 32/53-bit range.
//!
//! # Invariants
//!
//! - Same seed always produces the same sequence
//! - `next()` never fails and never panics (all arithmetic wraps or fits)
//! - Not cryptographically secure

use serde::{Deserialize, Serialize};

/// Inclusive lower bound for seed words.
pub const SEED_MIN: i64 = 10_000_000_000;

/// Exclusive upper bound for seed words.
pub const SEED_MAX: i64 = 99_999_999_999;

/// Persisted generator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    /// First state word
    pub x: i64,
    /// Second state word (the last output word)
    pub y: i64,
}

impl RngState {
    /// State from explicit words.
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Seed from two raw entropy words.
    ///
    /// Each word is mapped uniformly (up to modulo bias) into
    /// `[SEED_MIN, SEED_MAX)`.
    pub fn from_entropy(a: u64, b: u64) -> Self {
        Self { x: seed_word(a), y: seed_word(b) }
    }

    /// True if both words are reachable from a seed.
    ///
    /// A reachable word is either a seed word in `[SEED_MIN, SEED_MAX)` or a
    /// 32-bit output word.
    pub fn is_reachable(&self) -> bool {
        let reachable =
            |word: i64| (SEED_MIN..SEED_MAX).contains(&word) || i32::try_from(word).is_ok();
        reachable(self.x) && reachable(self.y)
    }
}

fn seed_word(raw: u64) -> i64 {
    let span = (SEED_MAX - SEED_MIN) as u64;
    SEED_MIN + (raw % span) as i64
}

/// Deterministic pseudo-random generator.
///
/// Cheap to copy; callers that need to plan draws without committing them
/// work on a copy and persist [`state()`](Self::state) afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeterministicRng {
    state: RngState,
}

impl DeterministicRng {
    /// Generator positioned at `state`.
    pub fn new(state: RngState) -> Self {
        Self { state }
    }

    /// Current state (persist this after drawing).
    pub fn state(&self) -> RngState {
        self.state
    }

    /// Advance and return the next value.
    ///
    /// Values may be negative; callers that need a positive id take the
    /// absolute value.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> i64 {
        let RngState { x, y } = self.state;

        let mut t = x as i32;
        t ^= t.wrapping_shl(23);
        let u = y as i32;
        let word = t ^ u ^ (t >> 17) ^ (u >> 26);

        self.state = RngState { x: y, y: i64::from(word) };

        // only wraps for states outside the seed range
        i64::from(word).wrapping_add(y)
    }
}
