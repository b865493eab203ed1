//! Native placeholder client (lowest-level bridge)
//!
//! Performs the real OS file I/O for one physical volume and forwards
//! placeholder transitions to the [`PlaceholderApi`]. This is the only layer
//! that sees raw `io::Error`s: they are mapped into the [`FsError`] taxonomy
//! here, once, and never re-interpreted by decorators above.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: content replacement goes through a temp file in the
//!   target directory followed by a rename, so a crash never leaves a
//!   half-written target (same strategy for eager hydration staging).
//! - **Object identity**: the 64-bit object ID is the inode number.
//! - **Soft deletes**: nodes move into a per-volume trash directory,
//!   disambiguated by object ID; permanent deletes remove outright.

use std::io::ErrorKind;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::DateTime;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use vaultdrive_core::ports::file_client::{DeleteMode, FileClient, WriteOptions};
use vaultdrive_core::ports::placeholder::{HydrationHandler, PlaceholderApi};
use vaultdrive_core::{
    FsError, NodeAttributes, NodeId, NodeInfo, NodeKind, RelativePath, RootId,
};

/// errno for "too many links" when a directory cannot take another child.
const EMLINK: i32 = 31;

// ============================================================================
// Error mapping
// ============================================================================

/// Map a raw OS error into the adapter taxonomy. The only place this happens.
pub(crate) fn map_io_error(err: &std::io::Error, path: &Path) -> FsError {
    let display = path.display().to_string();
    match err.kind() {
        ErrorKind::NotFound => FsError::ObjectNotFound(display),
        ErrorKind::PermissionDenied => FsError::UnauthorizedAccess(display),
        ErrorKind::AlreadyExists => FsError::DuplicateName(display),
        _ if err.raw_os_error() == Some(EMLINK) => FsError::TooManyChildren(display),
        _ => FsError::Unknown(format!("{display}: {err}")),
    }
}

// ============================================================================
// NativeFileClient
// ============================================================================

/// Bridges [`FileClient`] to the real filesystem of one volume.
///
/// Paths in the `NodeInfo` values this client receives are relative to its
/// anchor; the rooted client above translates per-mapping paths into this
/// coordinate space.
pub struct NativeFileClient {
    anchor: PathBuf,
    trash_dir: PathBuf,
    placeholders: Arc<dyn PlaceholderApi>,
}

impl NativeFileClient {
    /// Create a client anchored at a volume root.
    pub fn new(
        anchor: impl Into<PathBuf>,
        trash_dir: impl Into<PathBuf>,
        placeholders: Arc<dyn PlaceholderApi>,
    ) -> Self {
        Self {
            anchor: anchor.into(),
            trash_dir: trash_dir.into(),
            placeholders: placeholders.into(),
        }
    }

    fn resolve(&self, path: &RelativePath) -> PathBuf {
        path.resolve_under(&self.anchor)
    }

    /// Not-found classification: a missing parent is path-not-found, a
    /// missing final component is object-not-found.
    async fn not_found(&self, path: &RelativePath) -> FsError {
        let display = path.as_str().to_string();
        match path.parent() {
            Some(parent) if !parent.is_root() => {
                let parent_abs = self.resolve(&parent);
                if tokio::fs::metadata(&parent_abs).await.is_err() {
                    return FsError::PathNotFound(display);
                }
                FsError::ObjectNotFound(display)
            }
            _ => FsError::ObjectNotFound(display),
        }
    }

    /// Stat one path into a `NodeInfo`.
    async fn stat_node(&self, root: RootId, path: &RelativePath) -> Result<NodeInfo, FsError> {
        let abs = self.resolve(path);
        let metadata = match tokio::fs::metadata(&abs).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(self.not_found(path).await),
            Err(e) => return Err(map_io_error(&e, &abs)),
        };

        let parent_id = match path.parent() {
            None => NodeId::UNKNOWN,
            Some(parent) => {
                let parent_abs = self.resolve(&parent);
                tokio::fs::metadata(&parent_abs)
                    .await
                    .map(|m| NodeId::new(m.ino()))
                    .unwrap_or(NodeId::UNKNOWN)
            }
        };

        let name = path.file_name().unwrap_or_default().to_string();
        let last_write = metadata.modified().ok().and_then(|st| {
            st.duration_since(std::time::UNIX_EPOCH)
                .ok()
                .and_then(|dur| DateTime::from_timestamp(dur.as_secs() as i64, dur.subsec_nanos()))
        });

        Ok(NodeInfo {
            id: NodeId::new(metadata.ino()),
            parent_id,
            root,
            path: path.clone(),
            name: name.clone(),
            kind: if metadata.is_dir() {
                NodeKind::Directory
            } else {
                NodeKind::File
            },
            size: metadata.len(),
            attributes: NodeAttributes {
                read_only: metadata.permissions().readonly(),
                hidden: name.starts_with('.'),
                directory: metadata.is_dir(),
                archive: false,
            },
            last_write,
            revision: None,
        })
    }

    /// Write content through a temp file in the target directory, then
    /// atomically swap it into place.
    async fn staged_write(&self, abs: &Path, content: &[u8]) -> Result<(), FsError> {
        let tmp_path = {
            let mut p = abs.as_os_str().to_owned();
            p.push(".vaulttmp");
            PathBuf::from(p)
        };

        debug!(tmp = %tmp_path.display(), "staging content write");
        let staged: Result<(), std::io::Error> = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(content).await?;
            file.flush().await?;
            tokio::fs::rename(&tmp_path, abs).await
        }
        .await;

        if let Err(e) = staged {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(map_io_error(&e, abs));
        }
        Ok(())
    }

    fn backup_path(abs: &Path) -> PathBuf {
        let mut p = abs.as_os_str().to_owned();
        p.push(".bak");
        PathBuf::from(p)
    }
}

#[async_trait::async_trait]
impl FileClient for NativeFileClient {
    #[instrument(skip(self), fields(path = %node.path))]
    async fn get_info(&self, node: &NodeInfo) -> Result<NodeInfo, FsError> {
        self.stat_node(node.root, &node.path).await
    }

    #[instrument(skip(self), fields(path = %dir.path))]
    async fn enumerate(&self, dir: &NodeInfo) -> Result<Vec<NodeInfo>, FsError> {
        let abs = self.resolve(&dir.path);
        let mut reader = match tokio::fs::read_dir(&abs).await {
            Ok(r) => r,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(self.not_found(&dir.path).await)
            }
            Err(e) => return Err(map_io_error(&e, &abs)),
        };

        let mut children = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| map_io_error(&e, &abs))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Ok(child_path) = dir.path.join(&name) else {
                continue;
            };
            match self.stat_node(dir.root, &child_path).await {
                Ok(info) => children.push(info),
                // Raced deletion between read_dir and stat.
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        debug!(count = children.len(), "enumerated directory");
        Ok(children)
    }

    #[instrument(skip(self), fields(parent = %parent.path, name = %name))]
    async fn create_directory(&self, parent: &NodeInfo, name: &str) -> Result<NodeInfo, FsError> {
        let path = parent.path.join(name)?;
        let abs = self.resolve(&path);
        match tokio::fs::create_dir(&abs).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(self.not_found(&path).await)
            }
            Err(e) => return Err(map_io_error(&e, &abs)),
        }
        self.stat_node(parent.root, &path).await
    }

    #[instrument(skip(self, content), fields(parent = %parent.path, name = %name, bytes = content.len()))]
    async fn create_file(
        &self,
        parent: &NodeInfo,
        name: &str,
        content: &[u8],
    ) -> Result<NodeInfo, FsError> {
        let path = parent.path.join(name)?;
        let abs = self.resolve(&path);

        let created: Result<(), std::io::Error> = async {
            let mut file = tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&abs)
                .await?;
            file.write_all(content).await?;
            file.flush().await
        }
        .await;

        match created {
            Ok(()) => self.stat_node(parent.root, &path).await,
            Err(e) if e.kind() == ErrorKind::NotFound => Err(self.not_found(&path).await),
            Err(e) => Err(map_io_error(&e, &abs)),
        }
    }

    #[instrument(skip(self), fields(path = %node.path))]
    async fn read_file(&self, node: &NodeInfo) -> Result<Vec<u8>, FsError> {
        let abs = self.resolve(&node.path);
        match tokio::fs::read(&abs).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(self.not_found(&node.path).await),
            Err(e) => Err(map_io_error(&e, &abs)),
        }
    }

    #[instrument(skip(self, content), fields(path = %node.path, bytes = content.len()))]
    async fn write_file(
        &self,
        node: &NodeInfo,
        content: &[u8],
        options: &WriteOptions,
    ) -> Result<NodeInfo, FsError> {
        let current = self.stat_node(node.root, &node.path).await?;
        if let Some(expected) = &options.expected {
            // Optimistic-concurrency guard: divergence is metadata-mismatch,
            // distinct from generic I/O failure.
            expected.verify(&current)?;
        }

        let abs = self.resolve(&node.path);
        if options.archive {
            let backup = Self::backup_path(&abs);
            debug!(backup = %backup.display(), "renaming previous content aside");
            tokio::fs::rename(&abs, &backup)
                .await
                .map_err(|e| map_io_error(&e, &abs))?;
        }

        self.staged_write(&abs, content).await?;
        self.stat_node(node.root, &node.path).await
    }

    #[instrument(skip(self), fields(path = %node.path, new_parent = %new_parent.path, new_name = %new_name))]
    async fn move_node(
        &self,
        node: &NodeInfo,
        new_parent: &NodeInfo,
        new_name: &str,
    ) -> Result<NodeInfo, FsError> {
        let dest_path = new_parent.path.join(new_name)?;
        let src_abs = self.resolve(&node.path);
        let dest_abs = self.resolve(&dest_path);

        // Unix rename replaces an existing destination silently; surface the
        // collision as duplicate-name instead.
        if tokio::fs::metadata(&dest_abs).await.is_ok() {
            return Err(FsError::DuplicateName(dest_path.as_str().to_string()));
        }

        match tokio::fs::rename(&src_abs, &dest_abs).await {
            Ok(()) => self.stat_node(node.root, &dest_path).await,
            Err(e) if e.kind() == ErrorKind::NotFound => Err(self.not_found(&node.path).await),
            Err(e) => Err(map_io_error(&e, &src_abs)),
        }
    }

    #[instrument(skip(self), fields(path = %node.path, mode = ?mode))]
    async fn delete(&self, node: &NodeInfo, mode: DeleteMode) -> Result<(), FsError> {
        let current = self.stat_node(node.root, &node.path).await?;
        let abs = self.resolve(&node.path);

        match mode {
            DeleteMode::Soft => {
                tokio::fs::create_dir_all(&self.trash_dir)
                    .await
                    .map_err(|e| map_io_error(&e, &self.trash_dir))?;
                let entry = self
                    .trash_dir
                    .join(format!("{}-{}", current.id, current.name));
                debug!(trash = %entry.display(), "moving node to trash");
                tokio::fs::rename(&abs, &entry)
                    .await
                    .map_err(|e| map_io_error(&e, &abs))?;
            }
            DeleteMode::Permanent => {
                let removed = if current.kind == NodeKind::Directory {
                    tokio::fs::remove_dir_all(&abs).await
                } else {
                    tokio::fs::remove_file(&abs).await
                };
                removed.map_err(|e| map_io_error(&e, &abs))?;
            }
        }
        Ok(())
    }

    async fn set_pin_state(&self, node: &NodeInfo, pinned: bool) -> Result<(), FsError> {
        let abs = self.resolve(&node.path);
        self.placeholders.set_pinned(&abs, pinned).await
    }

    async fn set_in_sync(&self, node: &NodeInfo) -> Result<(), FsError> {
        let abs = self.resolve(&node.path);
        self.placeholders.set_in_sync(&abs).await
    }

    /// Blocking hydration, actively canceled: cancellation aborts the
    /// in-flight OS call rather than abandoning it.
    #[instrument(skip(self, cancel), fields(path = %node.path))]
    async fn hydrate(&self, node: &NodeInfo, cancel: &CancellationToken) -> Result<(), FsError> {
        if cancel.is_cancelled() {
            return Err(FsError::Aborted(node.path.as_str().to_string()));
        }
        let abs = self.resolve(&node.path);
        tokio::select! {
            result = self.placeholders.hydrate(&abs) => result,
            () = cancel.cancelled() => {
                debug!("hydration canceled, aborting OS call");
                self.placeholders.abort_hydration(&abs).await?;
                Err(FsError::Aborted(node.path.as_str().to_string()))
            }
        }
    }

    async fn connect(&self, _handler: Arc<dyn HydrationHandler>) -> Result<(), FsError> {
        // The demand channel is owned by the on-demand client; a classic
        // volume has nothing to open.
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), FsError> {
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
