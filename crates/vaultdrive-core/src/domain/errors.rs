//! Adapter error taxonomy
//!
//! `FsError` is the single error type that crosses the port boundary. OS
//! errors are mapped into it exactly once, in the lowest-level client;
//! decorators never re-interpret raw OS errors.

use thiserror::Error;

/// Errors produced by the local filesystem adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FsError {
    /// The addressed object does not exist (or no longer matches its ID).
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// A component of the addressed path does not exist.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// Optimistic-concurrency divergence: the on-disk object no longer
    /// matches the identity/attributes the caller expected.
    #[error("metadata mismatch on {path}: {details}")]
    MetadataMismatch {
        /// Root-relative path of the diverged object
        path: String,
        /// What diverged (id, size, timestamp)
        details: String,
    },

    /// The OS denied the operation.
    #[error("unauthorized access: {0}")]
    UnauthorizedAccess(String),

    /// A directory holds more children than the platform allows.
    #[error("too many children under {0}")]
    TooManyChildren(String),

    /// The destination name already exists.
    #[error("duplicate name: {0}")]
    DuplicateName(String),

    /// The operation was aborted through its cancellation signal.
    #[error("operation aborted: {0}")]
    Aborted(String),

    /// Any OS failure without a more specific mapping.
    #[error("filesystem error: {0}")]
    Unknown(String),
}

impl FsError {
    /// Wrap an arbitrary error as the catch-all variant.
    pub fn unknown(err: impl std::fmt::Display) -> Self {
        Self::Unknown(err.to_string())
    }

    /// True for the two not-found variants of the taxonomy.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound(_) | Self::PathNotFound(_))
    }
}
