//! Protecting decorators (folder / file variants)
//!
//! Around a mutating operation the relevant protection is lifted and
//! restored: the folder variant leases the parent folder for the call
//! duration, the file variant unprotects the target before a content
//! rewrite. On failure, protection is restored before the error propagates,
//! so the protected/unprotected invariant is never corrupted. Deletion
//! unprotects the whole branch first and re-protects the surviving tree on
//! failure only; directory creation protects the freshly created directory
//! afterward using the original request's path, because the OS create call
//! does not return one.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use vaultdrive_core::ports::file_client::{DeleteMode, FileClient, WriteOptions};
use vaultdrive_core::ports::placeholder::HydrationHandler;
use vaultdrive_core::ports::protector::{FolderProtector, ProtectionType};
use vaultdrive_core::{FsError, NodeInfo, RelativePath, RootInfo};

use crate::protect::tracker::{LeaseKey, ProtectionTracker, UnprotectLease};

// ============================================================================
// ProtectingFolderClient
// ============================================================================

/// Leases the parent folder around every structure mutation.
pub struct ProtectingFolderClient {
    inner: Arc<dyn FileClient>,
    tracker: Arc<ProtectionTracker>,
    protector: Arc<dyn FolderProtector>,
    root: RootInfo,
}

impl ProtectingFolderClient {
    pub fn new(
        inner: Arc<dyn FileClient>,
        tracker: Arc<ProtectionTracker>,
        protector: Arc<dyn FolderProtector>,
        root: RootInfo,
    ) -> Self {
        Self {
            inner,
            tracker,
            protector,
            root,
        }
    }

    fn os_path(&self, path: &RelativePath) -> PathBuf {
        path.resolve_under(&self.root.local_path)
    }

    /// Acquire an unprotect lease for a folder node, resolving its stable
    /// node ID first if the caller did not supply one.
    async fn lease_folder(&self, folder: &NodeInfo) -> Result<UnprotectLease, FsError> {
        let key = if folder.id.is_unknown() {
            let resolved = self.inner.get_info(folder).await?;
            LeaseKey::new(resolved.id)
        } else {
            LeaseKey::new(folder.id)
        };
        Ok(self
            .tracker
            .unprotect_folder(key, &self.os_path(&folder.path), ProtectionType::Ancestor)
            .await)
    }

    /// Acquire a lease for the parent folder of `node`.
    async fn lease_parent_of(&self, node: &NodeInfo) -> Result<UnprotectLease, FsError> {
        let parent_path = node.path.parent().ok_or_else(|| {
            FsError::UnauthorizedAccess("the root itself cannot be mutated".to_string())
        })?;
        let parent = NodeInfo::reference(node.root, parent_path).with_id(node.parent_id);
        self.lease_folder(&parent).await
    }
}

#[async_trait::async_trait]
impl FileClient for ProtectingFolderClient {
    async fn get_info(&self, node: &NodeInfo) -> Result<NodeInfo, FsError> {
        self.inner.get_info(node).await
    }

    async fn enumerate(&self, dir: &NodeInfo) -> Result<Vec<NodeInfo>, FsError> {
        self.inner.enumerate(dir).await
    }

    async fn create_directory(&self, parent: &NodeInfo, name: &str) -> Result<NodeInfo, FsError> {
        let lease = self.lease_folder(parent).await?;
        let result = self.inner.create_directory(parent, name).await;

        if result.is_ok() {
            // Protect the new directory via the requested path; the create
            // call itself does not return one.
            let created_path = self.os_path(&parent.path.join(name)?);
            if !self
                .protector
                .protect_folder(&created_path, ProtectionType::Ancestor)
                .await
            {
                warn!(path = %created_path.display(), "failed to protect created directory");
            }
        }

        lease.release().await;
        result
    }

    async fn create_file(
        &self,
        parent: &NodeInfo,
        name: &str,
        content: &[u8],
    ) -> Result<NodeInfo, FsError> {
        let lease = self.lease_folder(parent).await?;
        let result = self.inner.create_file(parent, name, content).await;

        if result.is_ok() {
            let created_path = self.os_path(&parent.path.join(name)?);
            if !self
                .protector
                .protect_file(&created_path, ProtectionType::Leaf)
                .await
            {
                warn!(path = %created_path.display(), "failed to protect created file");
            }
        }

        lease.release().await;
        result
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
        let source_lease = self.lease_parent_of(node).await?;
        let dest_lease = match self.lease_folder(new_parent).await {
            Ok(lease) => lease,
            Err(e) => {
                source_lease.release().await;
                return Err(e);
            }
        };

        let result = self.inner.move_node(node, new_parent, new_name).await;

        dest_lease.release().await;
        source_lease.release().await;
        result
    }

    async fn delete(&self, node: &NodeInfo, mode: DeleteMode) -> Result<(), FsError> {
        let lease = self.lease_parent_of(node).await?;

        // The whole branch opens up first; a protected descendant would make
        // the removal fail halfway.
        let branch = self.os_path(&node.path);
        if !self.protector.unprotect_branch(&branch).await {
            warn!(path = %branch.display(), "failed to unprotect branch before deletion");
        }

        let result = self.inner.delete(node, mode).await;

        if result.is_err() {
            // Re-protect the surviving tree on failure only; on success the
            // tree no longer exists.
            debug!(path = %branch.display(), "restoring branch protection after failed delete");
            if !self
                .protector
                .protect_branch(&branch, ProtectionType::Ancestor)
                .await
            {
                warn!(path = %branch.display(), "failed to restore branch protection");
            }
        }

        lease.release().await;
        result
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

// ============================================================================
// ProtectingFileClient
// ============================================================================

/// Unprotects the target file around a content rewrite.
pub struct ProtectingFileClient {
    inner: Arc<dyn FileClient>,
    protector: Arc<dyn FolderProtector>,
    root: RootInfo,
}

impl ProtectingFileClient {
    pub fn new(
        inner: Arc<dyn FileClient>,
        protector: Arc<dyn FolderProtector>,
        root: RootInfo,
    ) -> Self {
        Self {
            inner,
            protector,
            root,
        }
    }

    fn os_path(&self, path: &RelativePath) -> PathBuf {
        path.resolve_under(&self.root.local_path)
    }

    /// Open a revision-creation window: the target stays unprotected until
    /// the caller disposes the guard, covering the entire write window.
    pub async fn begin_revision(&self, node: &NodeInfo) -> RevisionGuard {
        let path = self.os_path(&node.path);
        if !self.protector.unprotect_file(&path).await {
            warn!(path = %path.display(), "failed to unprotect file for revision window");
        }
        RevisionGuard {
            protector: Arc::clone(&self.protector),
            path,
            restored: false,
        }
    }
}

#[async_trait::async_trait]
impl FileClient for ProtectingFileClient {
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
        let path = self.os_path(&node.path);
        if !self.protector.unprotect_file(&path).await {
            warn!(path = %path.display(), "failed to unprotect file before rewrite");
        }

        let result = self.inner.write_file(node, content, options).await;

        // The one-shot write window ends here on success and failure alike.
        if !self
            .protector
            .protect_file(&path, ProtectionType::Leaf)
            .await
        {
            warn!(path = %path.display(), "failed to restore file protection");
        }
        result
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

/// Keeps one file unprotected for the duration of a revision-creation
/// process. Prefer [`release`](Self::release); a plain drop restores the
/// protection from a background task.
pub struct RevisionGuard {
    protector: Arc<dyn FolderProtector>,
    path: PathBuf,
    restored: bool,
}

impl RevisionGuard {
    /// Restore protection now. Not cancellable.
    pub async fn release(mut self) {
        self.restored = true;
        if !self
            .protector
            .protect_file(&self.path, ProtectionType::Leaf)
            .await
        {
            warn!(path = %self.path.display(), "failed to restore protection after revision");
        }
    }
}

impl Drop for RevisionGuard {
    fn drop(&mut self) {
        if !self.restored {
            let protector = Arc::clone(&self.protector);
            let path = std::mem::take(&mut self.path);
            tokio::spawn(async move {
                let _ = protector.protect_file(&path, ProtectionType::Leaf).await;
            });
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use vaultdrive_core::{NodeId, NodeKind, RootId, RootInfo, ScopeId, VolumeId};

    use crate::test_support::{make_node, ScriptedClient};

    use super::*;

    /// Protector double journaling every call in order.
    #[derive(Default)]
    struct JournalingProtector {
        journal: Mutex<Vec<String>>,
    }

    impl JournalingProtector {
        fn entries(&self) -> Vec<String> {
            self.journal.lock().unwrap().clone()
        }

        fn log(&self, entry: String) {
            self.journal.lock().unwrap().push(entry);
        }
    }

    #[async_trait::async_trait]
    impl FolderProtector for JournalingProtector {
        async fn protect_folder(&self, path: &Path, _protection: ProtectionType) -> bool {
            self.log(format!("protect_folder {}", path.display()));
            true
        }
        async fn unprotect_folder(&self, path: &Path) -> bool {
            self.log(format!("unprotect_folder {}", path.display()));
            true
        }
        async fn protect_file(&self, path: &Path, _protection: ProtectionType) -> bool {
            self.log(format!("protect_file {}", path.display()));
            true
        }
        async fn unprotect_file(&self, path: &Path) -> bool {
            self.log(format!("unprotect_file {}", path.display()));
            true
        }
        async fn unprotect_branch(&self, path: &Path) -> bool {
            self.log(format!("unprotect_branch {}", path.display()));
            true
        }
        async fn protect_branch(&self, path: &Path, _protection: ProtectionType) -> bool {
            self.log(format!("protect_branch {}", path.display()));
            true
        }
    }

    fn root_info() -> RootInfo {
        RootInfo {
            root_id: RootId::new(1),
            node_id: NodeId::new(500),
            volume_id: VolumeId::new("vol-1"),
            scope: ScopeId::new("scope-a"),
            local_path: "/vault".into(),
            on_demand: false,
            enabled: true,
        }
    }

    fn folder_client(
        inner: Arc<ScriptedClient>,
        protector: Arc<JournalingProtector>,
    ) -> ProtectingFolderClient {
        let tracker = ProtectionTracker::new(Arc::clone(&protector) as _);
        ProtectingFolderClient::new(inner, tracker, protector, root_info())
    }

    #[tokio::test]
    async fn test_create_directory_protects_new_dir_and_restores_parent() {
        let inner = Arc::new(ScriptedClient::new());
        let protector = Arc::new(JournalingProtector::default());
        let client = folder_client(Arc::clone(&inner), Arc::clone(&protector));

        let parent = make_node(RootId::new(1), "docs", 7, NodeKind::Directory);
        client.create_directory(&parent, "new").await.unwrap();

        assert_eq!(
            protector.entries(),
            vec![
                "unprotect_folder /vault/docs".to_string(),
                "protect_folder /vault/docs/new".to_string(),
                "protect_folder /vault/docs".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_create_restores_protection_before_error() {
        let inner = Arc::new(ScriptedClient::new());
        let protector = Arc::new(JournalingProtector::default());
        let client = folder_client(Arc::clone(&inner), Arc::clone(&protector));

        inner.fail_next(FsError::DuplicateName("docs/new".to_string()));
        let parent = make_node(RootId::new(1), "docs", 7, NodeKind::Directory);
        let err = client.create_directory(&parent, "new").await.unwrap_err();
        assert!(matches!(err, FsError::DuplicateName(_)));

        // No protection of the never-created directory; parent restored.
        assert_eq!(
            protector.entries(),
            vec![
                "unprotect_folder /vault/docs".to_string(),
                "protect_folder /vault/docs".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_unprotects_branch_and_restores_on_failure_only() {
        let inner = Arc::new(ScriptedClient::new());
        let protector = Arc::new(JournalingProtector::default());
        let client = folder_client(Arc::clone(&inner), Arc::clone(&protector));

        let mut node = make_node(RootId::new(1), "docs/old", 8, NodeKind::Directory);
        node.parent_id = NodeId::new(7);

        // Success: no branch restoration.
        client.delete(&node, DeleteMode::Permanent).await.unwrap();
        let entries = protector.entries();
        assert!(entries.contains(&"unprotect_branch /vault/docs/old".to_string()));
        assert!(!entries.iter().any(|e| e.starts_with("protect_branch")));

        // Failure: the surviving tree is re-protected.
        inner.fail_next(FsError::unknown("busy"));
        let err = client.delete(&node, DeleteMode::Permanent).await.unwrap_err();
        assert!(matches!(err, FsError::Unknown(_)));
        assert!(protector
            .entries()
            .contains(&"protect_branch /vault/docs/old".to_string()));
    }

    #[tokio::test]
    async fn test_delete_of_root_is_rejected() {
        let inner = Arc::new(ScriptedClient::new());
        let protector = Arc::new(JournalingProtector::default());
        let client = folder_client(Arc::clone(&inner), Arc::clone(&protector));

        let root = make_node(RootId::new(1), "", 500, NodeKind::Directory);
        let err = client.delete(&root, DeleteMode::Soft).await.unwrap_err();
        assert!(matches!(err, FsError::UnauthorizedAccess(_)));
        assert!(protector.entries().is_empty());
    }

    #[tokio::test]
    async fn test_move_leases_both_parents() {
        let inner = Arc::new(ScriptedClient::new());
        let protector = Arc::new(JournalingProtector::default());
        let client = folder_client(Arc::clone(&inner), Arc::clone(&protector));

        let mut node = make_node(RootId::new(1), "docs/a.txt", 8, NodeKind::File);
        node.parent_id = NodeId::new(7);
        let dest = make_node(RootId::new(1), "archive", 9, NodeKind::Directory);

        client.move_node(&node, &dest, "a.txt").await.unwrap();

        assert_eq!(
            protector.entries(),
            vec![
                "unprotect_folder /vault/docs".to_string(),
                "unprotect_folder /vault/archive".to_string(),
                "protect_folder /vault/archive".to_string(),
                "protect_folder /vault/docs".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_file_rewrite_unprotects_and_restores() {
        let inner = Arc::new(ScriptedClient::new());
        let protector = Arc::new(JournalingProtector::default());
        let client =
            ProtectingFileClient::new(Arc::clone(&inner) as _, Arc::clone(&protector) as _, root_info());

        let node = make_node(RootId::new(1), "docs/a.txt", 8, NodeKind::File);
        client
            .write_file(&node, b"x", &WriteOptions::default())
            .await
            .unwrap();

        assert_eq!(
            protector.entries(),
            vec![
                "unprotect_file /vault/docs/a.txt".to_string(),
                "protect_file /vault/docs/a.txt".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_file_rewrite_restores_protection_on_failure() {
        let inner = Arc::new(ScriptedClient::new());
        let protector = Arc::new(JournalingProtector::default());
        let client =
            ProtectingFileClient::new(Arc::clone(&inner) as _, Arc::clone(&protector) as _, root_info());

        inner.fail_next(FsError::MetadataMismatch {
            path: "docs/a.txt".to_string(),
            details: "size diverged".to_string(),
        });
        let node = make_node(RootId::new(1), "docs/a.txt", 8, NodeKind::File);
        let err = client
            .write_file(&node, b"x", &WriteOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FsError::MetadataMismatch { .. }));

        assert_eq!(
            protector.entries(),
            vec![
                "unprotect_file /vault/docs/a.txt".to_string(),
                "protect_file /vault/docs/a.txt".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_revision_window_spans_until_guard_release() {
        let inner = Arc::new(ScriptedClient::new());
        let protector = Arc::new(JournalingProtector::default());
        let client =
            ProtectingFileClient::new(Arc::clone(&inner) as _, Arc::clone(&protector) as _, root_info());

        let node = make_node(RootId::new(1), "docs/a.txt", 8, NodeKind::File);
        let guard = client.begin_revision(&node).await;

        // Still unprotected while the guard is alive.
        assert_eq!(
            protector.entries(),
            vec!["unprotect_file /vault/docs/a.txt".to_string()]
        );

        guard.release().await;
        assert_eq!(
            protector.entries(),
            vec![
                "unprotect_file /vault/docs/a.txt".to_string(),
                "protect_file /vault/docs/a.txt".to_string(),
            ]
        );
    }
}
