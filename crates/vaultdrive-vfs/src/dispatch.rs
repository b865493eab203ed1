//! Dispatching/aggregating client
//!
//! Routes each operation, keyed by root ID, to the correct per-root
//! decorated stack. Roots sharing one physical client share the underlying
//! native client inside their stacks; connect/disconnect fan out so the
//! reference-counted physical channel is opened once.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use vaultdrive_core::ports::file_client::{DeleteMode, FileClient, WriteOptions};
use vaultdrive_core::ports::placeholder::HydrationHandler;
use vaultdrive_core::{FsError, NodeInfo, RootId};

/// Composite client over all per-root stacks of one mapping-set generation.
pub struct DispatchingClient {
    stacks: BTreeMap<RootId, Arc<dyn FileClient>>,
}

impl DispatchingClient {
    pub fn new(stacks: BTreeMap<RootId, Arc<dyn FileClient>>) -> Self {
        Self { stacks }
    }

    /// The root IDs this generation serves.
    pub fn root_ids(&self) -> impl Iterator<Item = RootId> + '_ {
        self.stacks.keys().copied()
    }

    fn route(&self, root: RootId) -> Result<&Arc<dyn FileClient>, FsError> {
        self.stacks
            .get(&root)
            .ok_or_else(|| FsError::ObjectNotFound(format!("root {root} is not mapped")))
    }
}

#[async_trait::async_trait]
impl FileClient for DispatchingClient {
    async fn get_info(&self, node: &NodeInfo) -> Result<NodeInfo, FsError> {
        self.route(node.root)?.get_info(node).await
    }

    async fn enumerate(&self, dir: &NodeInfo) -> Result<Vec<NodeInfo>, FsError> {
        self.route(dir.root)?.enumerate(dir).await
    }

    async fn create_directory(&self, parent: &NodeInfo, name: &str) -> Result<NodeInfo, FsError> {
        self.route(parent.root)?.create_directory(parent, name).await
    }

    async fn create_file(
        &self,
        parent: &NodeInfo,
        name: &str,
        content: &[u8],
    ) -> Result<NodeInfo, FsError> {
        self.route(parent.root)?
            .create_file(parent, name, content)
            .await
    }

    async fn read_file(&self, node: &NodeInfo) -> Result<Vec<u8>, FsError> {
        self.route(node.root)?.read_file(node).await
    }

    async fn write_file(
        &self,
        node: &NodeInfo,
        content: &[u8],
        options: &WriteOptions,
    ) -> Result<NodeInfo, FsError> {
        self.route(node.root)?.write_file(node, content, options).await
    }

    async fn move_node(
        &self,
        node: &NodeInfo,
        new_parent: &NodeInfo,
        new_name: &str,
    ) -> Result<NodeInfo, FsError> {
        if node.root != new_parent.root {
            // Move semantics are scoped per root; a cross-root transfer is a
            // copy+delete the engine performs itself.
            return Err(FsError::Unknown(format!(
                "cross-root move from {} to {}",
                node.root, new_parent.root
            )));
        }
        self.route(node.root)?
            .move_node(node, new_parent, new_name)
            .await
    }

    async fn delete(&self, node: &NodeInfo, mode: DeleteMode) -> Result<(), FsError> {
        self.route(node.root)?.delete(node, mode).await
    }

    async fn set_pin_state(&self, node: &NodeInfo, pinned: bool) -> Result<(), FsError> {
        self.route(node.root)?.set_pin_state(node, pinned).await
    }

    async fn set_in_sync(&self, node: &NodeInfo) -> Result<(), FsError> {
        self.route(node.root)?.set_in_sync(node).await
    }

    async fn hydrate(&self, node: &NodeInfo, cancel: &CancellationToken) -> Result<(), FsError> {
        self.route(node.root)?.hydrate(node, cancel).await
    }

    async fn connect(&self, handler: Arc<dyn HydrationHandler>) -> Result<(), FsError> {
        for stack in self.stacks.values() {
            stack.connect(Arc::clone(&handler)).await?;
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), FsError> {
        // Every stack gets its disconnect even if one fails; the first
        // failure is reported afterwards.
        let mut first_error = None;
        for (root, stack) in &self.stacks {
            if let Err(e) = stack.disconnect().await {
                warn!(%root, error = %e, "stack disconnect failed");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
