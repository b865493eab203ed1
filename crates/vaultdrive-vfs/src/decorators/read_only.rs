//! Read-only enforcement decorator

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use vaultdrive_core::ports::file_client::{DeleteMode, FileClient, WriteOptions};
use vaultdrive_core::ports::placeholder::HydrationHandler;
use vaultdrive_core::{FsError, NodeInfo};

/// Rejects every operation that would mutate the tree; reads, placeholder
/// state changes, and hydration pass through.
pub struct ReadOnlyClient {
    inner: Arc<dyn FileClient>,
}

impl ReadOnlyClient {
    pub fn new(inner: Arc<dyn FileClient>) -> Self {
        Self { inner }
    }

    fn rejected(node_path: &str) -> FsError {
        FsError::UnauthorizedAccess(format!("root is read-only: {node_path}"))
    }
}

#[async_trait::async_trait]
impl FileClient for ReadOnlyClient {
    async fn get_info(&self, node: &NodeInfo) -> Result<NodeInfo, FsError> {
        self.inner.get_info(node).await
    }

    async fn enumerate(&self, dir: &NodeInfo) -> Result<Vec<NodeInfo>, FsError> {
        self.inner.enumerate(dir).await
    }

    async fn create_directory(&self, parent: &NodeInfo, _name: &str) -> Result<NodeInfo, FsError> {
        Err(Self::rejected(parent.path.as_str()))
    }

    async fn create_file(
        &self,
        parent: &NodeInfo,
        _name: &str,
        _content: &[u8],
    ) -> Result<NodeInfo, FsError> {
        Err(Self::rejected(parent.path.as_str()))
    }

    async fn read_file(&self, node: &NodeInfo) -> Result<Vec<u8>, FsError> {
        self.inner.read_file(node).await
    }

    async fn write_file(
        &self,
        node: &NodeInfo,
        _content: &[u8],
        _options: &WriteOptions,
    ) -> Result<NodeInfo, FsError> {
        Err(Self::rejected(node.path.as_str()))
    }

    async fn move_node(
        &self,
        node: &NodeInfo,
        _new_parent: &NodeInfo,
        _new_name: &str,
    ) -> Result<NodeInfo, FsError> {
        Err(Self::rejected(node.path.as_str()))
    }

    async fn delete(&self, node: &NodeInfo, _mode: DeleteMode) -> Result<(), FsError> {
        Err(Self::rejected(node.path.as_str()))
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
