//! Raw event canonicalization
//!
//! Translates [`RawEvent`]s 1:1 into [`EventLogEntry`] values carrying
//! old/new path, object and parent ID, attributes and placeholder state, all
//! scoped to one root. History loss is never silent: a watcher failure
//! without a path surfaces as the mandatory `Skipped` marker.

use std::io::ErrorKind;
use std::os::unix::fs::MetadataExt;
use std::path::Path;
use std::sync::Arc;

use chrono::DateTime;
use tracing::debug;

use vaultdrive_core::ports::placeholder::PlaceholderApi;
use vaultdrive_core::{
    ChangeKind, EventLogEntry, NodeAttributes, NodeId, PlaceholderState, RelativePath, RootInfo,
};

use crate::watcher::RawEvent;

/// Per-root translator from raw OS notifications to canonical entries.
pub struct Canonicalizer {
    root: RootInfo,
    placeholders: Arc<dyn PlaceholderApi>,
}

impl Canonicalizer {
    pub fn new(root: RootInfo, placeholders: Arc<dyn PlaceholderApi>) -> Self {
        Self { root, placeholders }
    }

    /// The root this canonicalizer scopes entries to.
    #[must_use]
    pub fn root(&self) -> &RootInfo {
        &self.root
    }

    /// Depth of the root anchor, for most-specific-root selection when roots
    /// share a watcher.
    #[must_use]
    pub fn anchor_depth(&self) -> usize {
        self.root.local_path.components().count()
    }

    fn relative(&self, abs: &Path) -> Option<RelativePath> {
        RelativePath::strip_root(&self.root.local_path, abs).ok()
    }

    /// Translate one raw event; `None` when the path lies outside this root.
    pub async fn canonicalize(&self, raw: &RawEvent) -> Option<EventLogEntry> {
        match raw {
            RawEvent::Created(path) => {
                let rel = self.relative(path)?;
                Some(self.resolved_entry(ChangeKind::CreatedOrMovedTo, rel).await)
            }
            RawEvent::Modified(path) => {
                let rel = self.relative(path)?;
                Some(self.resolved_entry(ChangeKind::Changed, rel).await)
            }
            RawEvent::Removed(path) => {
                let rel = self.relative(path)?;
                Some(self.removed_entry(rel).await)
            }
            RawEvent::Renamed { old, new } => {
                let old_rel = self.relative(old);
                let new_rel = self.relative(new);
                match (old_rel, new_rel) {
                    (Some(old_rel), Some(new_rel)) => Some(
                        self.resolved_entry(ChangeKind::Moved, new_rel)
                            .await
                            .with_old_path(old_rel),
                    ),
                    // Only one endpoint lies in this root: the node entered
                    // or left the watched scope.
                    (Some(old_rel), None) => Some(self.removed_entry(old_rel).await),
                    (None, Some(new_rel)) => {
                        Some(self.resolved_entry(ChangeKind::CreatedOrMovedTo, new_rel).await)
                    }
                    (None, None) => None,
                }
            }
            RawEvent::Failed(Some(path)) => {
                let rel = self.relative(path)?;
                debug!(root = %self.root.root_id, path = %rel, "watcher reported path failure");
                Some(EventLogEntry::error(self.root.root_id, rel))
            }
            // No path to attribute the failure to: history for the whole
            // scope is lost.
            RawEvent::Failed(None) => Some(EventLogEntry::skipped(self.root.root_id)),
        }
    }

    /// Entry for a node that is still on disk; stat failures degrade to an
    /// unresolved entry rather than suppressing the change.
    async fn resolved_entry(&self, change: ChangeKind, rel: RelativePath) -> EventLogEntry {
        let abs = rel.resolve_under(&self.root.local_path);
        let parent_id = self.parent_id_of(&rel).await;
        let name = rel.file_name().unwrap_or_default().to_string();

        let metadata = match tokio::fs::metadata(&abs).await {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // Raced deletion between the notification and the stat.
                return self.unresolved_entry(change, rel, parent_id);
            }
            Err(_) => return self.unresolved_entry(change, rel, parent_id),
        };

        let placeholder = self
            .placeholders
            .state(&abs)
            .await
            .unwrap_or(PlaceholderState::NotPlaceholder);
        let last_write = metadata.modified().ok().and_then(|st| {
            st.duration_since(std::time::UNIX_EPOCH)
                .ok()
                .and_then(|dur| DateTime::from_timestamp(dur.as_secs() as i64, dur.subsec_nanos()))
        });

        EventLogEntry {
            change,
            id: NodeId::new(metadata.ino()),
            parent_id,
            root: self.root.root_id,
            name: name.clone(),
            path: rel,
            old_path: None,
            attributes: NodeAttributes {
                read_only: metadata.permissions().readonly(),
                hidden: name.starts_with('.'),
                directory: metadata.is_dir(),
                archive: false,
            },
            placeholder,
            size: metadata.len(),
            last_write,
        }
    }

    async fn removed_entry(&self, rel: RelativePath) -> EventLogEntry {
        let parent_id = self.parent_id_of(&rel).await;
        self.unresolved_entry(ChangeKind::DeletedOrMovedFrom, rel, parent_id)
    }

    fn unresolved_entry(
        &self,
        change: ChangeKind,
        rel: RelativePath,
        parent_id: NodeId,
    ) -> EventLogEntry {
        let name = rel.file_name().unwrap_or_default().to_string();
        EventLogEntry {
            change,
            id: NodeId::UNKNOWN,
            parent_id,
            root: self.root.root_id,
            name,
            path: rel,
            old_path: None,
            attributes: NodeAttributes::default(),
            placeholder: PlaceholderState::NotPlaceholder,
            size: 0,
            last_write: None,
        }
    }

    /// Parent object ID: the root's own node ID for first-level children,
    /// the parent directory's inode otherwise.
    async fn parent_id_of(&self, rel: &RelativePath) -> NodeId {
        match rel.parent() {
            None => NodeId::UNKNOWN,
            Some(parent) if parent.is_root() => self.root.node_id,
            Some(parent) => {
                let abs = parent.resolve_under(&self.root.local_path);
                tokio::fs::metadata(&abs)
                    .await
                    .map(|m| NodeId::new(m.ino()))
                    .unwrap_or(NodeId::UNKNOWN)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
