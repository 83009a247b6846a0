//! Environment abstraction for deterministic testing.
//!
//! Decouples archive logic from system resources (wall clock, entropy).
//! Enables deterministic simulation (virtual clock, seeded RNG) and production
//! use with real system resources.

/// Abstract environment providing time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `wall_clock_millis()` reflects the host's notion of "now" at the moment
///   of the call; the archive reads it fresh for every operation
/// - `random_bytes()` uses a non-deterministic source in production
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion, incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current wall-clock time in milliseconds since the Unix epoch.
    ///
    /// Release timestamps, send timestamps and key expiry are all compared
    /// against this value.
    fn wall_clock_millis(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// The archive only uses this once, to seed its own generator at init.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
