//! Service error types.

use std::fmt;

use tardis_core::ArchiveError;

use crate::storage::StorageError;

/// Errors returned by [`ArchiveService`](crate::ArchiveService).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The request was rejected by archive validation.
    ///
    /// Immediate and final: retrying the same request fails the same way.
    /// Nothing was written.
    Archive(ArchiveError),

    /// Storage failed to load or commit.
    ///
    /// A failed commit leaves both durable and in-memory state unchanged, so
    /// the request may be retried.
    Storage(StorageError),

    /// No archive exists in this storage yet. Run `init` first.
    NotInitialized,

    /// `init` was called on storage that already holds an archive.
    AlreadyInitialized,
}

impl ServiceError {
    /// True if the caller must generate a key before retrying.
    pub fn needs_key(&self) -> bool {
        matches!(self, Self::Archive(err) if err.needs_key())
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Archive(err) => write!(f, "{err}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::NotInitialized => write!(f, "archive not initialized"),
            Self::AlreadyInitialized => write!(f, "archive already initialized"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Archive(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ArchiveError> for ServiceError {
    fn from(err: ArchiveError) -> Self {
        Self::Archive(err)
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}
