//! On-demand hydration client
//!
//! Wraps the native client of an on-demand volume with the placeholder write
//! state machine and the reference-counted OS demand channel.
//!
//! ## Write state machine
//!
//! - classic file or non-partial placeholder: eager materialization through
//!   the inner client's temp-file staging and atomic replace
//! - partial, unpinned placeholder: metadata-only write, content stays
//!   dehydrated, no staging, no hydration
//! - archive-flagged request: the existing file is renamed aside first, but
//!   only when it is not partial - a partial placeholder has no local
//!   content worth backing up and is simply deleted and replaced
//!
//! ## Demand channel
//!
//! OS hydration callbacks post into a bounded channel; a dedicated consumer
//! task drains it and calls back into the engine handler. Connect/disconnect
//! are reference-counted: only the first connect opens the OS channel, only
//! the last disconnect closes it, and closing lets in-flight callbacks
//! finish instead of aborting mid-callback.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use vaultdrive_core::ports::file_client::{DeleteMode, FileClient, WriteOptions};
use vaultdrive_core::ports::placeholder::{HydrationDemand, HydrationHandler, PlaceholderApi};
use vaultdrive_core::{FsError, NodeInfo, NodeKind, PlaceholderState};

#[derive(Default)]
struct ConnectState {
    count: usize,
    consumer: Option<JoinHandle<()>>,
}

/// Placeholder-aware client for one on-demand volume.
pub struct OnDemandClient {
    inner: Arc<dyn FileClient>,
    placeholders: Arc<dyn PlaceholderApi>,
    anchor: PathBuf,
    demand_capacity: usize,
    connect_state: Mutex<ConnectState>,
}

impl OnDemandClient {
    pub fn new(
        inner: Arc<dyn FileClient>,
        placeholders: Arc<dyn PlaceholderApi>,
        anchor: impl Into<PathBuf>,
        demand_capacity: usize,
    ) -> Self {
        Self {
            inner,
            placeholders,
            anchor: anchor.into(),
            demand_capacity,
            connect_state: Mutex::new(ConnectState::default()),
        }
    }

    fn abs(&self, node: &NodeInfo) -> PathBuf {
        node.path.resolve_under(&self.anchor)
    }

    /// Replace a partial placeholder outright: delete it, then create the
    /// full content fresh. Conflicts with the archive flag are resolved
    /// locally this way, never escalated.
    async fn replace_partial(
        &self,
        node: &NodeInfo,
        content: &[u8],
    ) -> Result<NodeInfo, FsError> {
        let parent_path = node
            .path
            .parent()
            .ok_or_else(|| FsError::PathNotFound(node.path.as_str().to_string()))?;
        let name = node
            .path
            .file_name()
            .ok_or_else(|| FsError::PathNotFound(node.path.as_str().to_string()))?
            .to_string();

        debug!(path = %node.path, "deleting partial placeholder before replacement");
        self.inner.delete(node, DeleteMode::Permanent).await?;
        let parent = NodeInfo::reference(node.root, parent_path);
        self.inner.create_file(&parent, &name, content).await
    }

    async fn consume_demands(
        mut rx: mpsc::Receiver<HydrationDemand>,
        handler: Arc<dyn HydrationHandler>,
    ) {
        while let Some(demand) = rx.recv().await {
            debug!(path = %demand.path.display(), "dispatching hydration demand");
            handler.on_hydration_demand(demand).await;
        }
        debug!("demand channel drained and closed");
    }
}

#[async_trait::async_trait]
impl FileClient for OnDemandClient {
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

    #[instrument(skip(self, content), fields(path = %node.path, bytes = content.len()))]
    async fn write_file(
        &self,
        node: &NodeInfo,
        content: &[u8],
        options: &WriteOptions,
    ) -> Result<NodeInfo, FsError> {
        // The placeholder state is OS-owned: re-read at the decision point,
        // never carried across a suspension.
        let abs = self.abs(node);
        let state = self.placeholders.state(&abs).await?;

        if state == PlaceholderState::Partial {
            let current = self.inner.get_info(node).await?;
            if let Some(expected) = &options.expected {
                expected.verify(&current)?;
            }

            if options.archive {
                return self.replace_partial(node, content).await;
            }

            // Unpinned partial: metadata-only write. Content stays
            // dehydrated; no staging, no hydration.
            debug!(path = %node.path, "metadata-only write on partial placeholder");
            return Ok(current);
        }

        // Classic file or non-partial placeholder: eager materialization via
        // the inner client's staged atomic replace; the archive flag renames
        // the existing content aside first.
        self.inner.write_file(node, content, options).await
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

    /// Mark reconciled; a fully materialized file placeholder is handed back
    /// to the OS for dehydration.
    #[instrument(skip(self), fields(path = %node.path))]
    async fn set_in_sync(&self, node: &NodeInfo) -> Result<(), FsError> {
        self.inner.set_in_sync(node).await?;

        if node.kind == NodeKind::File {
            let abs = self.abs(node);
            let state = self.placeholders.state(&abs).await?;
            if state.is_placeholder() && !state.is_partial() {
                debug!(path = %node.path, "requesting dehydration of reconciled file");
                self.placeholders.dehydrate(&abs).await?;
            }
        }
        Ok(())
    }

    async fn hydrate(&self, node: &NodeInfo, cancel: &CancellationToken) -> Result<(), FsError> {
        self.inner.hydrate(node, cancel).await
    }

    async fn connect(&self, handler: Arc<dyn HydrationHandler>) -> Result<(), FsError> {
        let mut state = self.connect_state.lock().await;
        if state.count == 0 {
            debug!("first connect: opening OS demand channel");
            let (tx, rx) = mpsc::channel(self.demand_capacity);
            self.placeholders.open_demand_channel(tx).await?;
            state.consumer = Some(tokio::spawn(Self::consume_demands(rx, handler)));
        }
        state.count += 1;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), FsError> {
        let mut state = self.connect_state.lock().await;
        match state.count {
            0 => {
                warn!("disconnect without matching connect");
                Ok(())
            }
            1 => {
                debug!("last disconnect: closing OS demand channel");
                self.placeholders.close_demand_channel().await?;
                // The consumer drains what was already posted and exits on
                // its own; callbacks are never aborted midway.
                state.consumer.take();
                state.count = 0;
                Ok(())
            }
            _ => {
                state.count -= 1;
                Ok(())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
