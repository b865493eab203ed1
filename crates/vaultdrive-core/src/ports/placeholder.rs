//! OS placeholder API port (consumed surface)
//!
//! The placeholder lifecycle is OS-owned: the adapter only requests
//! transitions and must tolerate observing any state at any time. State is
//! always re-read through [`PlaceholderApi::state`], never cached across a
//! suspension point.

use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::domain::errors::FsError;
use crate::domain::node::{NodeId, PlaceholderState};

/// One hydration demand posted by the OS callback thread.
#[derive(Debug, Clone, PartialEq)]
pub struct HydrationDemand {
    /// Object the OS wants materialized.
    pub id: NodeId,
    /// Absolute path of the placeholder at demand time.
    pub path: PathBuf,
}

/// Engine callback invoked for each hydration demand drained from the
/// bounded demand channel.
#[async_trait::async_trait]
pub trait HydrationHandler: Send + Sync {
    async fn on_hydration_demand(&self, demand: HydrationDemand);
}

/// Port trait over the native placeholder/on-demand file API.
#[async_trait::async_trait]
pub trait PlaceholderApi: Send + Sync {
    /// Whether the running platform supports on-demand files at all.
    fn platform_supported(&self) -> bool;

    /// Re-read the current placeholder state of a path.
    async fn state(&self, path: &Path) -> Result<PlaceholderState, FsError>;

    /// Convert a classic file into a placeholder.
    async fn convert(&self, path: &Path) -> Result<(), FsError>;

    /// Revert a placeholder back to a classic file.
    async fn revert(&self, path: &Path) -> Result<(), FsError>;

    /// Pin or unpin a placeholder against automatic dehydration.
    async fn set_pinned(&self, path: &Path, pinned: bool) -> Result<(), FsError>;

    /// Materialize a placeholder's content. Blocks until done or aborted.
    async fn hydrate(&self, path: &Path) -> Result<(), FsError>;

    /// Abort an in-flight hydration of the path.
    async fn abort_hydration(&self, path: &Path) -> Result<(), FsError>;

    /// Drop local content while keeping metadata.
    async fn dehydrate(&self, path: &Path) -> Result<(), FsError>;

    /// Mark the object reconciled with the provider.
    async fn set_in_sync(&self, path: &Path) -> Result<(), FsError>;

    /// Open the OS hydration-demand callback channel. The OS side posts one
    /// [`HydrationDemand`] per callback into `tx`.
    async fn open_demand_channel(&self, tx: mpsc::Sender<HydrationDemand>)
        -> Result<(), FsError>;

    /// Close the demand channel; pending callbacks complete, new ones stop.
    async fn close_demand_channel(&self) -> Result<(), FsError>;
}
