//! Tardis archive core.
//!
//! Sans-IO state machine for a time-locked, per-sender-encrypted message
//! archive. Senders submit ciphertext under a key the archive issued them;
//! the archive decrypts and stores it with a release timestamp, and withholds
//! the plaintext from readers until that timestamp has passed.
//!
//! # Architecture
//!
//! Nothing in this crate performs I/O. Time and entropy come from an
//! [`Environment`]; the caller identity is passed to every operation.
//! Mutating operations return a [`Planned`] value: the caller's response plus
//! the [`ArchiveAction`]s that must be committed to storage before the
//! response is released. The driver applies the actions to [`ArchiveState`]
//! only after the commit succeeds.
//!
//! # Components
//!
//! - [`KeyRegistry`]: per-address key issuance and expiry
//! - [`MessageArchive`]: append-only records, id and sender indices,
//!   time-lock visibility
//! - [`ArchiveState`]: orchestration of the above plus the generator

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod action;
pub mod archive;
pub mod config;
pub mod env;
pub mod error;
pub mod keys;
pub mod state;
pub mod types;

pub use action::{ArchiveAction, Planned};
pub use archive::MessageArchive;
pub use config::{ArchiveConfig, DEFAULT_CRYPT_BLOCK_SIZE, DEFAULT_KEY_EXPIRES_SECS};
pub use env::Environment;
pub use error::ArchiveError;
pub use keys::{DEFAULT_KEY_LENGTH, KeyRegistry, MAX_KEY_LENGTH, effective_key_length};
pub use state::ArchiveState;
pub use types::{Address, KeyRecord, MessageId, MessageRecord};
