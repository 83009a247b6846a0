//! Tardis Cryptographic Primitives
//!
//! Building blocks for the time-locked archive. Pure functions and an
//! explicitly seeded generator, so every output is reproducible from its
//! inputs. Callers own all state; nothing here reads a clock or the OS RNG.
//!
//! # Key Lifecycle
//!
//! ```text
//! OS entropy (init only)
//!        │
//!        ▼
//! RngState seed ──► DeterministicRng ──┬──► message ids (|next()|)
//!                                      │
//!                                      ▼
//!                              base-36 key string
//!                                      │
//!                                      ▼
//!                   feedback stream cipher (encrypt / decrypt)
//! ```
//!
//! # Security
//!
//! None of this is cryptographically strong, and it is not meant to be:
//!
//! - The cipher is a keyed XOR stream with ciphertext feedback. There is no
//!   authentication tag; any byte string decrypts to some plaintext.
//! - The generator is a 32-bit xorshift variant. Its output is predictable
//!   from a few observed values.
//! - Key strings are rendered from generator output, so they inherit the
//!   generator's predictability.
//!
//! The archive relies on the time-lock rule for confidentiality of unreleased
//! messages, not on the cipher.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cipher;
pub mod keygen;
pub mod rng;

pub use cipher::{decrypt, encrypt};
pub use keygen::{generate_key_string, to_base36};
pub use rng::{DeterministicRng, RngState, SEED_MAX, SEED_MIN};
