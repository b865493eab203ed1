//! In-flight-transfer abortion decorator

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::info;

use vaultdrive_core::ports::file_client::{DeleteMode, FileClient, WriteOptions};
use vaultdrive_core::ports::placeholder::HydrationHandler;
use vaultdrive_core::{FsError, NodeInfo};

/// Tracks in-flight transfers under a cancellation token.
///
/// [`abort_all`](Self::abort_all) actively cancels every running transfer
/// and arms a fresh token for subsequent operations. Operations check the
/// signal at entry and race it against the abortable OS calls.
pub struct AbortingClient {
    inner: Arc<dyn FileClient>,
    current: Mutex<CancellationToken>,
}

impl AbortingClient {
    pub fn new(inner: Arc<dyn FileClient>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            current: Mutex::new(CancellationToken::new()),
        })
    }

    /// Cancel every in-flight transfer. New operations run under a fresh
    /// token.
    pub fn abort_all(&self) {
        let mut current = self.current.lock().expect("token lock poisoned");
        info!("aborting in-flight transfers");
        current.cancel();
        *current = CancellationToken::new();
    }

    fn token(&self) -> CancellationToken {
        self.current.lock().expect("token lock poisoned").clone()
    }

    fn guard(&self, node: &NodeInfo) -> Result<CancellationToken, FsError> {
        let token = self.token();
        if token.is_cancelled() {
            return Err(FsError::Aborted(node.path.as_str().to_string()));
        }
        Ok(token)
    }
}

#[async_trait::async_trait]
impl FileClient for AbortingClient {
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
        let token = self.guard(parent)?;
        tokio::select! {
            result = self.inner.create_file(parent, name, content) => result,
            () = token.cancelled() => Err(FsError::Aborted(parent.path.as_str().to_string())),
        }
    }

    async fn read_file(&self, node: &NodeInfo) -> Result<Vec<u8>, FsError> {
        let token = self.guard(node)?;
        tokio::select! {
            result = self.inner.read_file(node) => result,
            () = token.cancelled() => Err(FsError::Aborted(node.path.as_str().to_string())),
        }
    }

    async fn write_file(
        &self,
        node: &NodeInfo,
        content: &[u8],
        options: &WriteOptions,
    ) -> Result<NodeInfo, FsError> {
        let token = self.guard(node)?;
        tokio::select! {
            result = self.inner.write_file(node, content, options) => result,
            () = token.cancelled() => Err(FsError::Aborted(node.path.as_str().to_string())),
        }
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

    /// Hydration honors both the caller's token and the abort-all signal.
    async fn hydrate(&self, node: &NodeInfo, cancel: &CancellationToken) -> Result<(), FsError> {
        let token = self.guard(node)?;
        tokio::select! {
            result = self.inner.hydrate(node, cancel) => result,
            () = token.cancelled() => Err(FsError::Aborted(node.path.as_str().to_string())),
        }
    }

    async fn connect(&self, handler: Arc<dyn HydrationHandler>) -> Result<(), FsError> {
        self.inner.connect(handler).await
    }

    async fn disconnect(&self) -> Result<(), FsError> {
        self.inner.disconnect().await
    }
}
