//! Virtual single-file root event filter
//!
//! Reduces a merged stream to exactly one (parent, name): a rename-in-place
//! onto the watched name becomes a synthetic create, a rename away from it a
//! synthetic delete. Folder entries and error/skipped entries from the same
//! scope are dropped - the consumer already receives them through the real
//! root.

use vaultdrive_core::{ChangeKind, EventLogEntry, FsError, RelativePath, RootId};

/// Filter/rewriter pairing one [`SingleFileRootClient`] projection.
///
/// [`SingleFileRootClient`]: ../../vaultdrive_vfs/virtual_root/struct.SingleFileRootClient.html
#[derive(Debug, Clone)]
pub struct SingleFileEventFilter {
    /// Root whose merged entries feed this filter.
    source_root: RootId,
    /// Root ID the rewritten entries are scoped to.
    virtual_root: RootId,
    /// Watched file, relative to the source root.
    watched: RelativePath,
    file_name: String,
}

impl SingleFileEventFilter {
    /// Watch `parent_path/file_name` of `source_root`, rewriting matches to
    /// `virtual_root`.
    ///
    /// # Errors
    /// Fails for unassigned root ids or an invalid file name.
    pub fn new(
        source_root: RootId,
        virtual_root: RootId,
        parent_path: RelativePath,
        file_name: impl Into<String>,
    ) -> Result<Self, FsError> {
        if source_root.is_unassigned() || virtual_root.is_unassigned() {
            return Err(FsError::Unknown(
                "single-file event filter requires assigned root ids".to_string(),
            ));
        }
        let file_name = file_name.into();
        let watched = parent_path.join(&file_name)?;
        Ok(Self {
            source_root,
            virtual_root,
            watched,
            file_name,
        })
    }

    /// Root whose entries this filter consumes.
    #[must_use]
    pub fn source_root(&self) -> RootId {
        self.source_root
    }

    /// Root the rewritten entries belong to.
    #[must_use]
    pub fn virtual_root(&self) -> RootId {
        self.virtual_root
    }

    /// Map one merged-stream entry into the virtual root's stream; `None`
    /// drops it.
    #[must_use]
    pub fn map(&self, entry: &EventLogEntry) -> Option<EventLogEntry> {
        if entry.root != self.source_root || entry.is_marker() || entry.attributes.directory {
            return None;
        }

        let matches_new = entry.path == self.watched;
        let matches_old = entry.old_path.as_ref() == Some(&self.watched);

        match entry.change {
            ChangeKind::Moved => {
                if matches_new && matches_old {
                    // Rename onto itself: only the content identity changed.
                    self.rewrite(entry, ChangeKind::Changed)
                } else if matches_new {
                    // Renamed into place: the singleton appeared.
                    self.rewrite(entry, ChangeKind::CreatedOrMovedTo)
                } else if matches_old {
                    // Renamed away: the singleton disappeared.
                    self.rewrite(entry, ChangeKind::DeletedOrMovedFrom)
                } else {
                    None
                }
            }
            ChangeKind::CreatedOrMovedTo | ChangeKind::Changed | ChangeKind::DeletedOrMovedFrom
                if matches_new =>
            {
                self.rewrite(entry, entry.change)
            }
            _ => None,
        }
    }

    fn rewrite(&self, entry: &EventLogEntry, change: ChangeKind) -> Option<EventLogEntry> {
        let mut rewritten = entry.clone();
        rewritten.change = change;
        rewritten.root = self.virtual_root;
        rewritten.path = RelativePath::root().join(&self.file_name).ok()?;
        rewritten.name = self.file_name.clone();
        rewritten.old_path = None;
        Some(rewritten)
    }
}

// ============================================================================
// Tests
// ============================================================================
