//! Sync-root identity values
//!
//! One `RootInfo` exists per configured sync root. The set is rebuilt, never
//! mutated, whenever the mapping configuration changes; stacks hold their own
//! copies so generations stay independent.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::node::NodeId;

/// Numeric identifier of one sync root.
///
/// The zero value is the unassigned default; active mappings use 1..N.
/// Virtualizing clients refuse to be constructed over the default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RootId(u64);

impl RootId {
    /// The invalid default value.
    pub const UNASSIGNED: RootId = RootId(0);

    /// Wrap a raw root identifier.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw identifier value.
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// True for the unassigned default.
    #[must_use]
    pub const fn is_unassigned(&self) -> bool {
        self.0 == 0
    }
}

impl Display for RootId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RootId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Identifier of the volume a root lives on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeId(String);

impl VolumeId {
    /// Wrap a volume identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for VolumeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Grouping key partitioning change-log entries and move semantics across
/// independently mounted roots.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeId(String);

impl ScopeId {
    /// Wrap a scope identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ScopeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One sync root as the adapter sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootInfo {
    /// Identifier upper layers address this root by.
    pub root_id: RootId,
    /// Underlying OS object ID of the root directory (path "").
    pub node_id: NodeId,
    /// Volume the root lives on.
    pub volume_id: VolumeId,
    /// Event/move scope this root belongs to.
    pub scope: ScopeId,
    /// Absolute OS anchor of the root directory.
    pub local_path: PathBuf,
    /// Whether this root is registered for on-demand (placeholder) files.
    pub on_demand: bool,
    /// Whether the mapping is currently enabled.
    pub enabled: bool,
}
