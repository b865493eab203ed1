//! Virtual single-file root
//!
//! Projects one remote file as the sole entry of its own pseudo-root.
//! Enumeration yields exactly one entry iff a file with the expected name is
//! currently a child of the real parent; every other operation validates the
//! target against that singleton first. Structure changes (move, delete,
//! directory creation) are always rejected - renaming or replacing the
//! singleton is modeled only as content-revision creation under the fixed
//! name.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use vaultdrive_core::ports::file_client::{DeleteMode, FileClient, WriteOptions};
use vaultdrive_core::ports::placeholder::HydrationHandler;
use vaultdrive_core::{
    FsError, NodeAttributes, NodeInfo, NodeKind, RelativePath, RootId,
};

/// One-file pseudo-root over a real root's stack.
pub struct SingleFileRootClient {
    inner: Arc<dyn FileClient>,
    /// Root ID the pseudo-root is addressed by.
    virtual_root: RootId,
    /// Root the projected file really lives in.
    real_root: RootId,
    /// Real parent directory, relative to the real root.
    parent_path: RelativePath,
    /// Fixed name of the singleton.
    file_name: String,
}

impl SingleFileRootClient {
    /// Project `parent_path/file_name` of `real_root` as the only entry of
    /// `virtual_root`.
    ///
    /// # Errors
    /// Fails if either root ID is the unassigned default.
    pub fn new(
        inner: Arc<dyn FileClient>,
        virtual_root: RootId,
        real_root: RootId,
        parent_path: RelativePath,
        file_name: impl Into<String>,
    ) -> Result<Self, FsError> {
        if virtual_root.is_unassigned() || real_root.is_unassigned() {
            return Err(FsError::Unknown(
                "single-file root requires assigned root ids".to_string(),
            ));
        }
        Ok(Self {
            inner,
            virtual_root,
            real_root,
            parent_path,
            file_name: file_name.into(),
        })
    }

    fn parent_reference(&self) -> NodeInfo {
        NodeInfo::reference(self.real_root, self.parent_path.clone())
    }

    fn file_reference(&self) -> Result<NodeInfo, FsError> {
        Ok(NodeInfo::reference(
            self.real_root,
            self.parent_path.join(&self.file_name)?,
        ))
    }

    /// Check that `node` addresses the singleton; everything else in the
    /// pseudo-root namespace does not exist.
    fn validate_target(&self, node: &NodeInfo) -> Result<(), FsError> {
        let display = node.path.as_str().to_string();
        if node.path.parent().map(|p| !p.is_root()).unwrap_or(true) {
            // Root itself or nested path: neither is the singleton.
            return Err(FsError::PathNotFound(display));
        }
        if node.path.file_name() != Some(self.file_name.as_str()) {
            return Err(FsError::ObjectNotFound(display));
        }
        Ok(())
    }

    /// Map the resolved real file into pseudo-root coordinates.
    fn to_outer(&self, inner: NodeInfo) -> Result<NodeInfo, FsError> {
        let mut outer = inner.with_path(RelativePath::root().join(&self.file_name)?);
        outer.root = self.virtual_root;
        Ok(outer)
    }

    /// The pseudo-root directory, backed by the real parent's identity.
    async fn pseudo_root(&self) -> Result<NodeInfo, FsError> {
        let parent = self.inner.get_info(&self.parent_reference()).await?;
        Ok(NodeInfo {
            id: parent.id,
            parent_id: vaultdrive_core::NodeId::UNKNOWN,
            root: self.virtual_root,
            path: RelativePath::root(),
            name: String::new(),
            kind: NodeKind::Directory,
            size: 0,
            attributes: NodeAttributes {
                directory: true,
                ..NodeAttributes::default()
            },
            last_write: parent.last_write,
            revision: None,
        })
    }

    fn structure_rejected(&self) -> FsError {
        FsError::UnauthorizedAccess(format!(
            "single-file root {} only supports content revisions of {}",
            self.virtual_root, self.file_name
        ))
    }
}

#[async_trait::async_trait]
impl FileClient for SingleFileRootClient {
    async fn get_info(&self, node: &NodeInfo) -> Result<NodeInfo, FsError> {
        if node.is_root_reference() {
            return self.pseudo_root().await;
        }
        self.validate_target(node)?;
        let resolved = self.inner.get_info(&self.file_reference()?).await?;
        self.to_outer(resolved)
    }

    async fn enumerate(&self, dir: &NodeInfo) -> Result<Vec<NodeInfo>, FsError> {
        if !dir.path.is_root() {
            return Err(FsError::PathNotFound(dir.path.as_str().to_string()));
        }
        let children = self.inner.enumerate(&self.parent_reference()).await?;
        let singleton = children
            .into_iter()
            .find(|child| child.name == self.file_name && child.kind == NodeKind::File);

        match singleton {
            Some(child) => {
                debug!(name = %self.file_name, "singleton present");
                Ok(vec![self.to_outer(child)?])
            }
            None => {
                debug!(name = %self.file_name, "singleton absent");
                Ok(Vec::new())
            }
        }
    }

    async fn create_directory(&self, _parent: &NodeInfo, _name: &str) -> Result<NodeInfo, FsError> {
        Err(self.structure_rejected())
    }

    async fn create_file(
        &self,
        parent: &NodeInfo,
        name: &str,
        content: &[u8],
    ) -> Result<NodeInfo, FsError> {
        if !parent.path.is_root() {
            return Err(FsError::PathNotFound(parent.path.as_str().to_string()));
        }
        if name != self.file_name {
            return Err(FsError::ObjectNotFound(name.to_string()));
        }
        let created = self
            .inner
            .create_file(&self.parent_reference(), name, content)
            .await?;
        self.to_outer(created)
    }

    async fn read_file(&self, node: &NodeInfo) -> Result<Vec<u8>, FsError> {
        self.validate_target(node)?;
        self.inner.read_file(&self.file_reference()?).await
    }

    async fn write_file(
        &self,
        node: &NodeInfo,
        content: &[u8],
        options: &WriteOptions,
    ) -> Result<NodeInfo, FsError> {
        self.validate_target(node)?;
        let mut target = self.file_reference()?;
        target.id = node.id;
        let written = self.inner.write_file(&target, content, options).await?;
        self.to_outer(written)
    }

    async fn move_node(
        &self,
        _node: &NodeInfo,
        _new_parent: &NodeInfo,
        _new_name: &str,
    ) -> Result<NodeInfo, FsError> {
        Err(self.structure_rejected())
    }

    async fn delete(&self, _node: &NodeInfo, _mode: DeleteMode) -> Result<(), FsError> {
        Err(self.structure_rejected())
    }

    async fn set_pin_state(&self, node: &NodeInfo, pinned: bool) -> Result<(), FsError> {
        self.validate_target(node)?;
        self.inner
            .set_pin_state(&self.file_reference()?, pinned)
            .await
    }

    async fn set_in_sync(&self, node: &NodeInfo) -> Result<(), FsError> {
        self.validate_target(node)?;
        self.inner.set_in_sync(&self.file_reference()?).await
    }

    async fn hydrate(&self, node: &NodeInfo, cancel: &CancellationToken) -> Result<(), FsError> {
        self.validate_target(node)?;
        self.inner.hydrate(&self.file_reference()?, cancel).await
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
