//! Canonical change-log entries
//!
//! The event side of the adapter reduces raw OS notifications to this one
//! value. A `Skipped` entry is not an error: it means observation history was
//! lost for the scope and the consumer must rebuild its state for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::node::{NodeAttributes, NodeId, NodeInfo, PlaceholderState, RelativePath};
use super::root::RootId;

/// The kind of change an entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// A node appeared: created in place, or moved into the watched scope.
    CreatedOrMovedTo,
    /// Content or metadata changed in place.
    Changed,
    /// A node disappeared: deleted, or moved out of the watched scope.
    DeletedOrMovedFrom,
    /// Renamed/moved within the watched scope; `old_path` carries the origin.
    Moved,
    /// Observation history was lost for this scope; the consumer must resync.
    Skipped,
    /// The watcher reported a path-scoped failure.
    Error,
}

/// One canonical change-log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub change: ChangeKind,
    pub id: NodeId,
    pub parent_id: NodeId,
    pub root: RootId,
    /// Final path component; empty for scope-level markers.
    pub name: String,
    pub path: RelativePath,
    /// Origin path for `Moved` entries.
    pub old_path: Option<RelativePath>,
    pub attributes: NodeAttributes,
    pub placeholder: PlaceholderState,
    pub size: u64,
    pub last_write: Option<DateTime<Utc>>,
}

impl EventLogEntry {
    /// The mandatory marker emitted whenever observation (re)starts or the
    /// watcher loses history for a scope.
    #[must_use]
    pub fn skipped(root: RootId) -> Self {
        Self {
            change: ChangeKind::Skipped,
            id: NodeId::UNKNOWN,
            parent_id: NodeId::UNKNOWN,
            root,
            name: String::new(),
            path: RelativePath::root(),
            old_path: None,
            attributes: NodeAttributes::default(),
            placeholder: PlaceholderState::NotPlaceholder,
            size: 0,
            last_write: None,
        }
    }

    /// A path-scoped watcher failure.
    #[must_use]
    pub fn error(root: RootId, path: RelativePath) -> Self {
        let name = path.file_name().unwrap_or_default().to_string();
        Self {
            change: ChangeKind::Error,
            id: NodeId::UNKNOWN,
            parent_id: NodeId::UNKNOWN,
            root,
            name,
            path,
            old_path: None,
            attributes: NodeAttributes::default(),
            placeholder: PlaceholderState::NotPlaceholder,
            size: 0,
            last_write: None,
        }
    }

    /// Build an entry from a resolved node.
    #[must_use]
    pub fn from_node(change: ChangeKind, node: &NodeInfo, placeholder: PlaceholderState) -> Self {
        Self {
            change,
            id: node.id,
            parent_id: node.parent_id,
            root: node.root,
            name: node.name.clone(),
            path: node.path.clone(),
            old_path: None,
            attributes: node.attributes,
            placeholder,
            size: node.size,
            last_write: node.last_write,
        }
    }

    /// Copy with the origin path of a move.
    #[must_use]
    pub fn with_old_path(mut self, old_path: RelativePath) -> Self {
        self.old_path = Some(old_path);
        self
    }

    /// True for the markers that do not describe a single object.
    #[must_use]
    pub fn is_marker(&self) -> bool {
        matches!(self.change, ChangeKind::Skipped | ChangeKind::Error)
    }
}
