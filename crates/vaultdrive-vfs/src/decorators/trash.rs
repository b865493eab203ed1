//! Trash-fallback deletion decorator

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use vaultdrive_core::ports::file_client::{DeleteMode, FileClient, WriteOptions};
use vaultdrive_core::ports::placeholder::HydrationHandler;
use vaultdrive_core::{FsError, NodeInfo};

/// Retries a failed soft (trash) deletion as a permanent one.
///
/// Trashing can fail where outright removal cannot, e.g. when the trash
/// directory sits on another filesystem or cannot be created. Not-found
/// failures are final: there is nothing left to delete.
pub struct TrashFallbackClient {
    inner: Arc<dyn FileClient>,
}

impl TrashFallbackClient {
    pub fn new(inner: Arc<dyn FileClient>) -> Self {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl FileClient for TrashFallbackClient {
    async fn get_info(&self, node: &NodeInfo) -> Result<NodeInfo, FsError> {
        self.inner.get_info(node).await
    }

    async fn enumerate(&self, dir: &NodeInfo) -> Result<Vec<NodeInfo>, FsError> {
        self.inner.enumerate(dir).await
    }

    async fn create_directory(&self, parent: &NodeInfo, name: &str) -> Result<NodeInfo, FsError> {
        self.inner.create_directory(parent, name).await
    }

    async fn create_file(
        &self,
        parent: &NodeInfo,
        name: &str,
        content: &[u8],
    ) -> Result<NodeInfo, FsError> {
        self.inner.create_file(parent, name, content).await
    }

    async fn read_file(&self, node: &NodeInfo) -> Result<Vec<u8>, FsError> {
        self.inner.read_file(node).await
    }

    async fn write_file(
        &self,
        node: &NodeInfo,
        content: &[u8],
        options: &WriteOptions,
    ) -> Result<NodeInfo, FsError> {
        self.inner.write_file(node, content, options).await
    }

    async fn move_node(
        &self,
        node: &NodeInfo,
        new_parent: &NodeInfo,
        new_name: &str,
    ) -> Result<NodeInfo, FsError> {
        self.inner.move_node(node, new_parent, new_name).await
    }

    async fn delete(&self, node: &NodeInfo, mode: DeleteMode) -> Result<(), FsError> {
        match self.inner.delete(node, mode).await {
            Err(err) if mode == DeleteMode::Soft && !err.is_not_found() => {
                warn!(
                    path = %node.path,
                    error = %err,
                    "trash deletion failed, falling back to permanent"
                );
                self.inner.delete(node, DeleteMode::Permanent).await
            }
            other => other,
        }
    }

    async fn set_pin_state(&self, node: &NodeInfo, pinned: bool) -> Result<(), FsError> {
        self.inner.set_pin_state(node, pinned).await
    }

    async fn set_in_sync(&self, node: &NodeInfo) -> Result<(), FsError> {
        self.inner.set_in_sync(node).await
    }

    async fn hydrate(&self, node: &NodeInfo, cancel: &CancellationToken) -> Result<(), FsError> {
        self.inner.hydrate(node, cancel).await
    }

    async fn connect(&self, handler: Arc<dyn HydrationHandler>) -> Result<(), FsError> {
        self.inner.connect(handler).await
    }

    async fn disconnect(&self) -> Result<(), FsError> {
        self.inner.disconnect().await
    }
}
