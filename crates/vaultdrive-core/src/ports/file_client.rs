//! File client port (driven/secondary port)
//!
//! The sync engine issues every local file operation through this trait.
//! Implementations are stacked: a native client at the bottom, decorators for
//! virtualization, protection, and platform rules above it. All errors cross
//! this boundary as [`FsError`](crate::FsError) - OS errors are mapped once,
//! at the lowest client, and never re-interpreted by decorators.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::domain::errors::FsError;
use crate::domain::node::{NodeId, NodeInfo, RevisionToken};

use super::placeholder::HydrationHandler;

/// Identity/attribute snapshot the caller expects the target to still have.
///
/// Divergence fails the operation with `FsError::MetadataMismatch`, distinct
/// from any generic I/O failure.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExpectedMetadata {
    /// Expected object ID; `NodeId::UNKNOWN` skips the identity check.
    pub id: NodeId,
    pub size: Option<u64>,
    pub last_write: Option<DateTime<Utc>>,
    pub revision: Option<RevisionToken>,
}

impl ExpectedMetadata {
    /// Compare against the current on-disk value.
    ///
    /// # Errors
    /// Returns `FsError::MetadataMismatch` naming every diverged field.
    pub fn verify(&self, current: &NodeInfo) -> Result<(), FsError> {
        let mut mismatches = Vec::new();
        if !self.id.is_unknown() && self.id != current.id {
            mismatches.push(format!("id {} != {}", current.id, self.id));
        }
        if let Some(size) = self.size {
            if size != current.size {
                mismatches.push(format!("size {} != {size}", current.size));
            }
        }
        if let Some(last_write) = self.last_write {
            if current.last_write != Some(last_write) {
                mismatches.push("last-write diverged".to_string());
            }
        }
        if mismatches.is_empty() {
            Ok(())
        } else {
            Err(FsError::MetadataMismatch {
                path: current.path.as_str().to_string(),
                details: mismatches.join(", "),
            })
        }
    }
}

/// Options steering a content write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteOptions {
    /// Optimistic-concurrency guard checked before the write touches disk.
    pub expected: Option<ExpectedMetadata>,
    /// Rename the existing file aside as a backup before overwriting.
    pub archive: bool,
}

impl WriteOptions {
    /// Options with the archive flag raised.
    #[must_use]
    pub fn archived() -> Self {
        Self {
            expected: None,
            archive: true,
        }
    }
}

/// Whether a deletion goes through the trash or removes outright.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    /// Move the node into the adapter trash; recoverable.
    Soft,
    /// Remove the node outright.
    Permanent,
}

/// Port trait for all local file operations.
///
/// Nodes are addressed by `(root, root-relative path)`; decorated stacks
/// resolve them against their mapping. Implementations must be cheap to
/// share behind an `Arc`.
#[async_trait::async_trait]
pub trait FileClient: Send + Sync {
    /// Resolve a node reference to its current on-disk metadata.
    async fn get_info(&self, node: &NodeInfo) -> Result<NodeInfo, FsError>;

    /// List the children of a directory.
    async fn enumerate(&self, dir: &NodeInfo) -> Result<Vec<NodeInfo>, FsError>;

    /// Create a directory under `parent`.
    async fn create_directory(&self, parent: &NodeInfo, name: &str) -> Result<NodeInfo, FsError>;

    /// Create a file under `parent` with the given content.
    async fn create_file(
        &self,
        parent: &NodeInfo,
        name: &str,
        content: &[u8],
    ) -> Result<NodeInfo, FsError>;

    /// Read the entire content of a file.
    async fn read_file(&self, node: &NodeInfo) -> Result<Vec<u8>, FsError>;

    /// Replace the content of a file.
    async fn write_file(
        &self,
        node: &NodeInfo,
        content: &[u8],
        options: &WriteOptions,
    ) -> Result<NodeInfo, FsError>;

    /// Move/rename a node to a new parent and name.
    async fn move_node(
        &self,
        node: &NodeInfo,
        new_parent: &NodeInfo,
        new_name: &str,
    ) -> Result<NodeInfo, FsError>;

    /// Delete a node, softly (trash) or permanently.
    async fn delete(&self, node: &NodeInfo, mode: DeleteMode) -> Result<(), FsError>;

    /// Pin or unpin a placeholder against automatic dehydration.
    async fn set_pin_state(&self, node: &NodeInfo, pinned: bool) -> Result<(), FsError>;

    /// Mark a node reconciled with the remote side.
    async fn set_in_sync(&self, node: &NodeInfo) -> Result<(), FsError>;

    /// Materialize a placeholder's content; actively canceled through the
    /// token, never merely abandoned.
    async fn hydrate(&self, node: &NodeInfo, cancel: &CancellationToken) -> Result<(), FsError>;

    /// Open the hydration-demand channel; reference-counted, only the first
    /// connect touches the OS.
    async fn connect(&self, handler: Arc<dyn HydrationHandler>) -> Result<(), FsError>;

    /// Close the hydration-demand channel; only the last disconnect touches
    /// the OS.
    async fn disconnect(&self) -> Result<(), FsError>;
}
