//! Node identity and metadata newtypes
//!
//! Strongly-typed wrappers for the values that describe one filesystem
//! object. `NodeInfo` is immutable-by-copy: every virtualizing decorator
//! returns a new value, and callers above the rooted client never see an
//! OS-absolute path.

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::FsError;
use super::root::RootId;

// ============================================================================
// NodeId
// ============================================================================

/// 64-bit object identifier assigned by the OS (the inode number on Linux).
///
/// The zero value means "unknown": a `NodeInfo` carrying it together with an
/// empty path addresses the root of its mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// The unknown/root sentinel.
    pub const UNKNOWN: NodeId = NodeId(0);

    /// Wrap a raw OS object identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw identifier value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// True for the unknown/root sentinel.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        self.0 == 0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ============================================================================
// RelativePath
// ============================================================================

/// A validated root-relative path.
///
/// Always uses `/` separators, never starts with one, and contains no `.` or
/// `..` components. The empty path denotes the root of the mapping itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    /// The empty path, addressing the root itself.
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Create a new `RelativePath`, validating every component.
    ///
    /// # Errors
    /// Returns `FsError::PathNotFound` if the path is absolute, contains
    /// empty segments, or contains `.`/`..` components.
    pub fn new(path: impl Into<String>) -> Result<Self, FsError> {
        let path = path.into();
        if path.is_empty() {
            return Ok(Self(path));
        }
        if path.starts_with('/') || path.ends_with('/') {
            return Err(FsError::PathNotFound(format!(
                "not a relative path: {path}"
            )));
        }
        for segment in path.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(FsError::PathNotFound(format!(
                    "invalid path segment in: {path}"
                )));
            }
        }
        Ok(Self(path))
    }

    /// Get the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the empty path addressing the root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Append one component.
    ///
    /// # Errors
    /// Returns an error if the component is empty or contains a separator.
    pub fn join(&self, name: &str) -> Result<Self, FsError> {
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(FsError::PathNotFound(format!(
                "invalid path component: {name}"
            )));
        }
        if self.is_root() {
            Ok(Self(name.to_string()))
        } else {
            Ok(Self(format!("{}/{name}", self.0)))
        }
    }

    /// The parent path; `None` for the root, `root()` for a first-level child.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// The final component; `None` for the root.
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rsplit('/').next()
    }

    /// Append a whole relative path.
    #[must_use]
    pub fn append(&self, other: &RelativePath) -> Self {
        if self.is_root() {
            other.clone()
        } else if other.is_root() {
            self.clone()
        } else {
            Self(format!("{}/{}", self.0, other.0))
        }
    }

    /// Strip a leading prefix, yielding the remainder relative to it.
    ///
    /// # Errors
    /// Returns `FsError::PathNotFound` if `self` does not lie under `prefix`.
    pub fn strip_prefix(&self, prefix: &RelativePath) -> Result<Self, FsError> {
        if prefix.is_root() {
            return Ok(self.clone());
        }
        if self.0 == prefix.0 {
            return Ok(Self::root());
        }
        match self.0.strip_prefix(&format!("{}/", prefix.0)) {
            Some(rest) => Ok(Self(rest.to_string())),
            None => Err(FsError::PathNotFound(format!(
                "{} is not under {}",
                self.0, prefix.0
            ))),
        }
    }

    /// True if `self` equals `other` or lies underneath it.
    #[must_use]
    pub fn starts_with(&self, other: &RelativePath) -> bool {
        if other.is_root() {
            return true;
        }
        self.0 == other.0 || self.0.starts_with(&format!("{}/", other.0))
    }

    /// Resolve this path under an absolute root anchor.
    #[must_use]
    pub fn resolve_under(&self, root: &Path) -> PathBuf {
        if self.is_root() {
            root.to_path_buf()
        } else {
            let mut out = root.to_path_buf();
            for segment in self.0.split('/') {
                out.push(segment);
            }
            out
        }
    }

    /// Build a root-relative path by stripping an absolute root anchor.
    ///
    /// # Errors
    /// Returns `FsError::PathNotFound` if `abs` does not lie under `root`.
    pub fn strip_root(root: &Path, abs: &Path) -> Result<Self, FsError> {
        let stripped = abs.strip_prefix(root).map_err(|_| {
            FsError::PathNotFound(format!(
                "{} is not under root {}",
                abs.display(),
                root.display()
            ))
        })?;
        let mut segments = Vec::new();
        for component in stripped.components() {
            segments.push(component.as_os_str().to_string_lossy().into_owned());
        }
        Self::new(segments.join("/"))
    }
}

impl Display for RelativePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RelativePath {
    type Error = FsError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RelativePath> for String {
    fn from(path: RelativePath) -> Self {
        path.0
    }
}

// ============================================================================
// Kind, attributes, placeholder state, revision
// ============================================================================

/// The kind of a filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    File,
    Directory,
}

/// OS attribute bits the adapter cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeAttributes {
    pub read_only: bool,
    pub hidden: bool,
    pub directory: bool,
    /// Set when the object carries unarchived local changes.
    pub archive: bool,
}

/// OS-owned placeholder lifecycle state.
///
/// The adapter only requests transitions and must tolerate observing any
/// state at any time; the value is always re-read, never cached across a
/// suspension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaceholderState {
    /// A classic file, not managed by the on-demand subsystem.
    NotPlaceholder,
    /// Fully materialized placeholder.
    Placeholder,
    /// Placeholder whose content is only partially on disk.
    Partial,
    /// Placeholder the user pinned against dehydration.
    Pinned,
    /// Dehydration has been requested but not yet performed.
    DehydrationRequested,
    /// Excluded from on-demand management.
    Excluded,
}

impl PlaceholderState {
    /// True when the object is under placeholder management at all.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        !matches!(self, Self::NotPlaceholder | Self::Excluded)
    }

    /// True when content is only partially materialized on disk.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::Partial)
    }
}

/// Opaque revision token attached by the remote side; compared, never parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionToken(String);

impl RevisionToken {
    /// Wrap an opaque revision string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Get the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for RevisionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// NodeInfo
// ============================================================================

/// One filesystem object as seen through the adapter.
///
/// Everything above the rooted client addresses nodes by `(root, path)` with
/// IDs virtualized per root; the OS-absolute anchor never leaves the
/// virtualizing layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    /// OS object ID; `NodeId::UNKNOWN` together with an empty path denotes
    /// the root of the mapping.
    pub id: NodeId,
    /// Object ID of the parent directory.
    pub parent_id: NodeId,
    /// The mapping this node belongs to.
    pub root: RootId,
    /// Root-relative path.
    pub path: RelativePath,
    /// Final path component; empty for the root itself.
    pub name: String,
    pub kind: NodeKind,
    pub size: u64,
    pub attributes: NodeAttributes,
    pub last_write: Option<DateTime<Utc>>,
    pub revision: Option<RevisionToken>,
}

impl NodeInfo {
    /// A reference addressing a path that has not been resolved yet.
    #[must_use]
    pub fn reference(root: RootId, path: RelativePath) -> Self {
        let name = path.file_name().unwrap_or_default().to_string();
        Self {
            id: NodeId::UNKNOWN,
            parent_id: NodeId::UNKNOWN,
            root,
            path,
            name,
            kind: NodeKind::File,
            size: 0,
            attributes: NodeAttributes::default(),
            last_write: None,
            revision: None,
        }
    }

    /// True when this value addresses the root of its mapping (default ID
    /// and empty path).
    #[must_use]
    pub fn is_root_reference(&self) -> bool {
        self.id.is_unknown() && self.path.is_root()
    }

    /// Copy with a different path (name follows the new path).
    #[must_use]
    pub fn with_path(mut self, path: RelativePath) -> Self {
        self.name = path.file_name().unwrap_or_default().to_string();
        self.path = path;
        self
    }

    /// Copy with a different object ID.
    #[must_use]
    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = id;
        self
    }

    /// Copy with a different parent ID.
    #[must_use]
    pub fn with_parent_id(mut self, parent_id: NodeId) -> Self {
        self.parent_id = parent_id;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod node_id_tests {
        use super::*;

        #[test]
        fn test_default_is_unknown() {
            assert!(NodeId::default().is_unknown());
            assert_eq!(NodeId::default(), NodeId::UNKNOWN);
        }

        #[test]
        fn test_roundtrip() {
            let id = NodeId::new(42);
            assert_eq!(id.as_u64(), 42);
            assert!(!id.is_unknown());
        }
    }

    mod relative_path_tests {
        use super::*;

        #[test]
        fn test_root_is_empty() {
            let root = RelativePath::root();
            assert!(root.is_root());
            assert!(root.parent().is_none());
            assert!(root.file_name().is_none());
        }

        #[test]
        fn test_new_rejects_absolute() {
            assert!(RelativePath::new("/etc/passwd").is_err());
        }

        #[test]
        fn test_new_rejects_traversal() {
            assert!(RelativePath::new("a/../b").is_err());
            assert!(RelativePath::new("..").is_err());
            assert!(RelativePath::new("a//b").is_err());
        }

        #[test]
        fn test_join_and_parent() {
            let p = RelativePath::root().join("docs").unwrap();
            let q = p.join("a.txt").unwrap();
            assert_eq!(q.as_str(), "docs/a.txt");
            assert_eq!(q.file_name(), Some("a.txt"));
            assert_eq!(q.parent().unwrap(), p);
            assert_eq!(p.parent().unwrap(), RelativePath::root());
        }

        #[test]
        fn test_join_rejects_separator() {
            let p = RelativePath::root();
            assert!(p.join("a/b").is_err());
            assert!(p.join("").is_err());
        }

        #[test]
        fn test_starts_with() {
            let root = RelativePath::root();
            let docs = RelativePath::new("docs").unwrap();
            let file = RelativePath::new("docs/a.txt").unwrap();
            let sibling = RelativePath::new("docs2/a.txt").unwrap();
            assert!(file.starts_with(&docs));
            assert!(file.starts_with(&root));
            assert!(!sibling.starts_with(&docs));
        }

        #[test]
        fn test_append_strip_prefix_roundtrip() {
            let prefix = RelativePath::new("home/user/Vault").unwrap();
            let rel = RelativePath::new("docs/a.txt").unwrap();
            let joined = prefix.append(&rel);
            assert_eq!(joined.as_str(), "home/user/Vault/docs/a.txt");
            assert_eq!(joined.strip_prefix(&prefix).unwrap(), rel);
            assert!(joined.strip_prefix(&RelativePath::new("home/other").unwrap()).is_err());
            assert!(prefix.strip_prefix(&prefix).unwrap().is_root());
        }

        #[test]
        fn test_resolve_strip_roundtrip() {
            let anchor = Path::new("/home/user/Vault");
            let rel = RelativePath::new("docs/a.txt").unwrap();
            let abs = rel.resolve_under(anchor);
            assert_eq!(abs, PathBuf::from("/home/user/Vault/docs/a.txt"));
            let back = RelativePath::strip_root(anchor, &abs).unwrap();
            assert_eq!(back, rel);
        }

        #[test]
        fn test_strip_root_of_root() {
            let anchor = Path::new("/home/user/Vault");
            let back = RelativePath::strip_root(anchor, anchor).unwrap();
            assert!(back.is_root());
            assert_eq!(RelativePath::root().resolve_under(anchor), anchor);
        }

        #[test]
        fn test_strip_root_outside_fails() {
            let anchor = Path::new("/home/user/Vault");
            let outside = Path::new("/home/user/Other/a.txt");
            assert!(RelativePath::strip_root(anchor, outside).is_err());
        }
    }

    mod placeholder_state_tests {
        use super::*;

        #[test]
        fn test_partial_is_placeholder() {
            assert!(PlaceholderState::Partial.is_placeholder());
            assert!(PlaceholderState::Partial.is_partial());
        }

        #[test]
        fn test_classic_is_not_placeholder() {
            assert!(!PlaceholderState::NotPlaceholder.is_placeholder());
            assert!(!PlaceholderState::Excluded.is_placeholder());
            assert!(!PlaceholderState::Pinned.is_partial());
        }
    }

    mod node_info_tests {
        use super::*;

        #[test]
        fn test_root_reference() {
            let node = NodeInfo::reference(RootId::new(1), RelativePath::root());
            assert!(node.is_root_reference());
        }

        #[test]
        fn test_reference_with_path_is_not_root() {
            let node =
                NodeInfo::reference(RootId::new(1), RelativePath::new("a.txt").unwrap());
            assert!(!node.is_root_reference());
            assert_eq!(node.name, "a.txt");
        }

        #[test]
        fn test_with_path_updates_name() {
            let node = NodeInfo::reference(RootId::new(1), RelativePath::new("a.txt").unwrap());
            let moved = node.with_path(RelativePath::new("docs/b.txt").unwrap());
            assert_eq!(moved.name, "b.txt");
            assert_eq!(moved.path.as_str(), "docs/b.txt");
        }
    }
}
