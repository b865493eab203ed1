//! Rooted client: path/ID virtualization
//!
//! Wraps an inner client and a fixed [`RootInfo`], rewriting paths
//! root-relative → volume-relative before delegating and back on results so
//! upper layers address every root uniformly. A `NodeInfo` with the default
//! ID and an empty path denotes the root itself and is answered
//! synthetically, without calling the inner client.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use vaultdrive_core::ports::file_client::{DeleteMode, FileClient, WriteOptions};
use vaultdrive_core::ports::placeholder::HydrationHandler;
use vaultdrive_core::{
    FsError, NodeAttributes, NodeId, NodeInfo, NodeKind, RelativePath, RootInfo,
};

/// Path/ID virtualizing decorator for one mapping.
pub struct RootedClient {
    inner: Arc<dyn FileClient>,
    root: RootInfo,
    /// The root's anchor expressed in the inner client's coordinate space.
    prefix: RelativePath,
}

impl std::fmt::Debug for RootedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootedClient")
            .field("root", &self.root)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RootedClient {
    /// Wrap `inner` for one root.
    ///
    /// # Errors
    /// Fails if the supplied root carries the unassigned default ID.
    pub fn new(
        inner: Arc<dyn FileClient>,
        root: RootInfo,
        prefix: RelativePath,
    ) -> Result<Self, FsError> {
        if root.root_id.is_unassigned() {
            return Err(FsError::Unknown(
                "rooted client requires an assigned root id".to_string(),
            ));
        }
        Ok(Self {
            inner,
            root,
            prefix,
        })
    }

    /// The root this client virtualizes.
    #[must_use]
    pub fn root(&self) -> &RootInfo {
        &self.root
    }

    /// The synthetic answer for the root itself: Directory, the root's node
    /// ID, empty name.
    fn synthetic_root(&self) -> NodeInfo {
        NodeInfo {
            id: self.root.node_id,
            parent_id: NodeId::UNKNOWN,
            root: self.root.root_id,
            path: RelativePath::root(),
            name: String::new(),
            kind: NodeKind::Directory,
            size: 0,
            attributes: NodeAttributes {
                directory: true,
                ..NodeAttributes::default()
            },
            last_write: None,
            revision: None,
        }
    }

    /// Rewrite an upper-layer node into the inner coordinate space.
    fn to_inner(&self, node: &NodeInfo) -> NodeInfo {
        let inner_path = self.prefix.append(&node.path);
        node.clone().with_path(inner_path)
    }

    /// Rewrite an inner result back into root-relative coordinates and infer
    /// virtualized IDs: the root answers with its own node ID, and a child
    /// whose relative parent segment is empty gets the root's node ID as
    /// parent.
    fn to_outer(&self, inner: NodeInfo) -> Result<NodeInfo, FsError> {
        let outer_path = inner.path.strip_prefix(&self.prefix)?;
        if outer_path.is_root() {
            return Ok(self.synthetic_root());
        }

        let mut outer = inner.with_path(outer_path);
        outer.root = self.root.root_id;
        if outer
            .path
            .parent()
            .map(|p| p.is_root())
            .unwrap_or(false)
        {
            outer.parent_id = self.root.node_id;
        }
        Ok(outer)
    }
}

#[async_trait::async_trait]
impl FileClient for RootedClient {
    async fn get_info(&self, node: &NodeInfo) -> Result<NodeInfo, FsError> {
        if node.is_root_reference() {
            debug!(root = %self.root.root_id, "answering root reference synthetically");
            return Ok(self.synthetic_root());
        }
        let inner = self.inner.get_info(&self.to_inner(node)).await?;
        self.to_outer(inner)
    }

    async fn enumerate(&self, dir: &NodeInfo) -> Result<Vec<NodeInfo>, FsError> {
        let children = self.inner.enumerate(&self.to_inner(dir)).await?;
        children
            .into_iter()
            .map(|child| self.to_outer(child))
            .collect()
    }

    async fn create_directory(&self, parent: &NodeInfo, name: &str) -> Result<NodeInfo, FsError> {
        let created = self
            .inner
            .create_directory(&self.to_inner(parent), name)
            .await?;
        self.to_outer(created)
    }

    async fn create_file(
        &self,
        parent: &NodeInfo,
        name: &str,
        content: &[u8],
    ) -> Result<NodeInfo, FsError> {
        let created = self
            .inner
            .create_file(&self.to_inner(parent), name, content)
            .await?;
        self.to_outer(created)
    }

    async fn read_file(&self, node: &NodeInfo) -> Result<Vec<u8>, FsError> {
        self.inner.read_file(&self.to_inner(node)).await
    }

    async fn write_file(
        &self,
        node: &NodeInfo,
        content: &[u8],
        options: &WriteOptions,
    ) -> Result<NodeInfo, FsError> {
        let written = self
            .inner
            .write_file(&self.to_inner(node), content, options)
            .await?;
        self.to_outer(written)
    }

    async fn move_node(
        &self,
        node: &NodeInfo,
        new_parent: &NodeInfo,
        new_name: &str,
    ) -> Result<NodeInfo, FsError> {
        // The destination may be the root, but only as a parent: the result
        // node always carries a name, so it can never resolve to the root ID
        // itself.
        let moved = self
            .inner
            .move_node(&self.to_inner(node), &self.to_inner(new_parent), new_name)
            .await?;
        self.to_outer(moved)
    }

    async fn delete(&self, node: &NodeInfo, mode: DeleteMode) -> Result<(), FsError> {
        self.inner.delete(&self.to_inner(node), mode).await
    }

    async fn set_pin_state(&self, node: &NodeInfo, pinned: bool) -> Result<(), FsError> {
        self.inner.set_pin_state(&self.to_inner(node), pinned).await
    }

    async fn set_in_sync(&self, node: &NodeInfo) -> Result<(), FsError> {
        self.inner.set_in_sync(&self.to_inner(node)).await
    }

    async fn hydrate(&self, node: &NodeInfo, cancel: &CancellationToken) -> Result<(), FsError> {
        self.inner.hydrate(&self.to_inner(node), cancel).await
    }

    async fn connect(&self, handler: Arc<dyn HydrationHandler>) -> Result<(), FsError> {
        self.inner.connect(handler).await
    }

    async fn disconnect(&self) -> Result<(), FsError> {
        self.inner.disconnect().await
    }
}

// ============================================================================
// Tests
// ============================================================================
