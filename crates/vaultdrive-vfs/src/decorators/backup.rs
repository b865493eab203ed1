//! Backup-before-overwrite decorator

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use vaultdrive_core::ports::file_client::{DeleteMode, FileClient, WriteOptions};
use vaultdrive_core::ports::placeholder::HydrationHandler;
use vaultdrive_core::{FsError, NodeInfo};

/// Forces the archive flag on every content write so the previous revision
/// survives an overwrite. The layer below decides how the backup is taken
/// (and when it is pointless, as for a partial placeholder).
pub struct BackupClient {
    inner: Arc<dyn FileClient>,
}

impl BackupClient {
    pub fn new(inner: Arc<dyn FileClient>) -> Self {
        Self { inner }
    }
}

#[async_trait::async_trait]
impl FileClient for BackupClient {
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
        let mut options = options.clone();
        options.archive = true;
        self.inner.write_file(node, content, &options).await
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
        self.inner.delete(node, mode).await
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

#[cfg(test)]
mod tests {
    use vaultdrive_core::{NodeKind, RootId};

    use crate::test_support::{make_node, ScriptedClient};

    use super::*;

    #[tokio::test]
    async fn test_write_carries_archive_flag() {
        let inner = Arc::new(ScriptedClient::new());
        let client = BackupClient::new(Arc::clone(&inner) as _);

        let node = make_node(RootId::new(1), "a.txt", 1, NodeKind::File);
        client
            .write_file(&node, b"x", &WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(inner.calls(), vec!["write_file a.txt archive=true".to_string()]);
    }
}
