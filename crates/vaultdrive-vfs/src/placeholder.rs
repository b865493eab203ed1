//! Placeholder API backends
//!
//! The placeholder lifecycle is an OS-owned surface consumed through
//! [`PlaceholderApi`]. Two backends live here:
//!
//! - [`DisabledPlaceholders`] for classic roots and platforms without
//!   on-demand support: every object reads as a classic file and every
//!   transition request is a tolerated no-op.
//! - [`InMemoryPlaceholders`] for tests and development: full state
//!   bookkeeping, a demand-channel sender, and a hydration gate so
//!   cancellation paths can be exercised deterministically.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio::sync::{mpsc, Mutex, Notify};

use vaultdrive_core::ports::placeholder::{HydrationDemand, PlaceholderApi};
use vaultdrive_core::{FsError, NodeId, PlaceholderState};

// ============================================================================
// DisabledPlaceholders
// ============================================================================

/// Backend for roots without on-demand files.
///
/// The adapter must tolerate observing any placeholder state at any time, so
/// the disabled backend answers `NotPlaceholder` everywhere and accepts
/// transition requests as no-ops.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPlaceholders;

#[async_trait::async_trait]
impl PlaceholderApi for DisabledPlaceholders {
    fn platform_supported(&self) -> bool {
        false
    }

    async fn state(&self, _path: &Path) -> Result<PlaceholderState, FsError> {
        Ok(PlaceholderState::NotPlaceholder)
    }

    async fn convert(&self, _path: &Path) -> Result<(), FsError> {
        Ok(())
    }

    async fn revert(&self, _path: &Path) -> Result<(), FsError> {
        Ok(())
    }

    async fn set_pinned(&self, _path: &Path, _pinned: bool) -> Result<(), FsError> {
        Ok(())
    }

    async fn hydrate(&self, _path: &Path) -> Result<(), FsError> {
        Ok(())
    }

    async fn abort_hydration(&self, _path: &Path) -> Result<(), FsError> {
        Ok(())
    }

    async fn dehydrate(&self, _path: &Path) -> Result<(), FsError> {
        Ok(())
    }

    async fn set_in_sync(&self, _path: &Path) -> Result<(), FsError> {
        Ok(())
    }

    async fn open_demand_channel(
        &self,
        _tx: mpsc::Sender<HydrationDemand>,
    ) -> Result<(), FsError> {
        Ok(())
    }

    async fn close_demand_channel(&self) -> Result<(), FsError> {
        Ok(())
    }
}

// ============================================================================
// InMemoryPlaceholders
// ============================================================================

/// In-memory placeholder bookkeeping for tests and development.
///
/// Paths without an entry read as `NotPlaceholder`. The hydration gate lets a
/// test hold a hydration open until it is released or aborted, so the
/// active-cancellation contract of [`PlaceholderApi::hydrate`] is observable.
#[derive(Debug, Default)]
pub struct InMemoryPlaceholders {
    states: DashMap<PathBuf, PlaceholderState>,
    demand_tx: Mutex<Option<mpsc::Sender<HydrationDemand>>>,
    gate_hydration: AtomicBool,
    gate: Notify,
    aborted: DashMap<PathBuf, ()>,
}

impl InMemoryPlaceholders {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the state of a path.
    pub fn set_state(&self, path: impl Into<PathBuf>, state: PlaceholderState) {
        self.states.insert(path.into(), state);
    }

    /// Hold future hydrations open until [`release_hydrations`](Self::release_hydrations)
    /// or an abort.
    pub fn hold_hydrations(&self) {
        self.gate_hydration.store(true, Ordering::SeqCst);
    }

    /// Release held hydrations.
    pub fn release_hydrations(&self) {
        self.gate_hydration.store(false, Ordering::SeqCst);
        self.gate.notify_waiters();
    }

    /// Post one hydration demand into the open channel, as the OS callback
    /// thread would. Returns false if no channel is open.
    pub async fn post_demand(&self, id: NodeId, path: impl Into<PathBuf>) -> bool {
        let guard = self.demand_tx.lock().await;
        match guard.as_ref() {
            Some(tx) => tx
                .send(HydrationDemand {
                    id,
                    path: path.into(),
                })
                .await
                .is_ok(),
            None => false,
        }
    }

    /// Whether a demand channel is currently open.
    pub async fn demand_channel_open(&self) -> bool {
        self.demand_tx.lock().await.is_some()
    }
}

#[async_trait::async_trait]
impl PlaceholderApi for InMemoryPlaceholders {
    fn platform_supported(&self) -> bool {
        true
    }

    async fn state(&self, path: &Path) -> Result<PlaceholderState, FsError> {
        Ok(self
            .states
            .get(path)
            .map(|entry| *entry.value())
            .unwrap_or(PlaceholderState::NotPlaceholder))
    }

    async fn convert(&self, path: &Path) -> Result<(), FsError> {
        self.states
            .insert(path.to_path_buf(), PlaceholderState::Placeholder);
        Ok(())
    }

    async fn revert(&self, path: &Path) -> Result<(), FsError> {
        self.states
            .insert(path.to_path_buf(), PlaceholderState::NotPlaceholder);
        Ok(())
    }

    async fn set_pinned(&self, path: &Path, pinned: bool) -> Result<(), FsError> {
        let state = if pinned {
            PlaceholderState::Pinned
        } else {
            PlaceholderState::Placeholder
        };
        self.states.insert(path.to_path_buf(), state);
        Ok(())
    }

    async fn hydrate(&self, path: &Path) -> Result<(), FsError> {
        loop {
            if self.aborted.remove(path).is_some() {
                return Err(FsError::Aborted(path.display().to_string()));
            }
            if !self.gate_hydration.load(Ordering::SeqCst) {
                break;
            }
            // Arm the waiter before re-checking, so an abort or release that
            // lands in between is never missed.
            let notified = self.gate.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.aborted.contains_key(path) || !self.gate_hydration.load(Ordering::SeqCst) {
                continue;
            }
            notified.await;
        }
        self.states
            .insert(path.to_path_buf(), PlaceholderState::Placeholder);
        Ok(())
    }

    async fn abort_hydration(&self, path: &Path) -> Result<(), FsError> {
        self.aborted.insert(path.to_path_buf(), ());
        self.gate.notify_waiters();
        Ok(())
    }

    async fn dehydrate(&self, path: &Path) -> Result<(), FsError> {
        self.states
            .insert(path.to_path_buf(), PlaceholderState::Partial);
        Ok(())
    }

    async fn set_in_sync(&self, _path: &Path) -> Result<(), FsError> {
        Ok(())
    }

    async fn open_demand_channel(&self, tx: mpsc::Sender<HydrationDemand>) -> Result<(), FsError> {
        let mut guard = self.demand_tx.lock().await;
        *guard = Some(tx);
        Ok(())
    }

    async fn close_demand_channel(&self) -> Result<(), FsError> {
        let mut guard = self.demand_tx.lock().await;
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_reads_not_placeholder() {
        let api = DisabledPlaceholders;
        let state = api.state(Path::new("/x")).await.unwrap();
        assert_eq!(state, PlaceholderState::NotPlaceholder);
        assert!(!api.platform_supported());
    }

    #[tokio::test]
    async fn test_in_memory_state_roundtrip() {
        let api = InMemoryPlaceholders::new();
        api.set_state("/a", PlaceholderState::Partial);
        assert_eq!(
            api.state(Path::new("/a")).await.unwrap(),
            PlaceholderState::Partial
        );
        assert_eq!(
            api.state(Path::new("/unknown")).await.unwrap(),
            PlaceholderState::NotPlaceholder
        );
    }

    #[tokio::test]
    async fn test_hydrate_completes_when_ungated() {
        let api = InMemoryPlaceholders::new();
        api.set_state("/a", PlaceholderState::Partial);
        api.hydrate(Path::new("/a")).await.unwrap();
        assert_eq!(
            api.state(Path::new("/a")).await.unwrap(),
            PlaceholderState::Placeholder
        );
    }

    #[tokio::test]
    async fn test_abort_unblocks_held_hydration() {
        let api = std::sync::Arc::new(InMemoryPlaceholders::new());
        api.hold_hydrations();
        let worker = {
            let api = std::sync::Arc::clone(&api);
            tokio::spawn(async move { api.hydrate(Path::new("/a")).await })
        };
        tokio::task::yield_now().await;
        api.abort_hydration(Path::new("/a")).await.unwrap();
        let result = worker.await.unwrap();
        assert!(matches!(result, Err(FsError::Aborted(_))));
    }

    #[tokio::test]
    async fn test_demand_channel_lifecycle() {
        let api = InMemoryPlaceholders::new();
        let (tx, mut rx) = mpsc::channel(4);
        api.open_demand_channel(tx).await.unwrap();
        assert!(api.demand_channel_open().await);
        assert!(api.post_demand(NodeId::new(7), "/a").await);
        let demand = rx.recv().await.unwrap();
        assert_eq!(demand.id, NodeId::new(7));
        api.close_demand_channel().await.unwrap();
        assert!(!api.post_demand(NodeId::new(8), "/b").await);
    }
}
