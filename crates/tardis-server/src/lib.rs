//! Tardis archive host.
//!
//! Wraps [`tardis_core`]'s Sans-IO archive state machine with real I/O: a
//! storage backend, the system clock and OS entropy.
//!
//! # Architecture
//!
//! [`ArchiveState`](tardis_core::ArchiveState) plans every mutation as a list
//! of actions. [`ArchiveService`] persists those actions through a [`Storage`]
//! backend in one transaction and applies them in memory only after the
//! commit succeeds.
//!
//! # Components
//!
//! - [`ArchiveService`]: write-through façade used by the CLI and tests
//! - [`Storage`]: persistence trait with [`MemoryStorage`], [`RedbStorage`]
//!   and the fault-injecting [`ChaoticStorage`]
//! - [`Codec`]: value encoding for durable backends ([`CborCodec`],
//!   [`JsonCodec`])
//! - [`SystemEnv`]: production environment (real time, OS RNG)
//! - [`MessageView`]: JSON shape of records printed by the CLI

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod service;
pub mod storage;
mod system_env;
mod view;

pub use error::ServiceError;
pub use service::ArchiveService;
pub use storage::{
    CborCodec, ChaoticStorage, Codec, JsonCodec, MemoryStorage, RedbStorage, Storage, StorageError,
};
pub use system_env::SystemEnv;
pub use view::{KeyView, MessageView};
