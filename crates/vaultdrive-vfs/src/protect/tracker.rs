//! Concurrent protection tracker
//!
//! Reference-counts temporary "unprotect" leases per folder so concurrent
//! operations on the same folder do not race to re-protect it. A folder is
//! unprotected iff its refcount > 0; only the 0→1 and 1→0 transitions touch
//! the OS ACL. The lease map is guarded by one process-wide exclusive
//! asynchronous lock: every acquire/release serializes through it, so
//! contention is bounded by OS-call latency for only the first/last tenant
//! of each key.
//!
//! Release always executes, even after the owning operation failed or was
//! canceled: [`UnprotectLease::release`] takes no cancellation signal, and a
//! lease dropped without an explicit release routes through a background
//! drain task that performs the same decrement.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

use vaultdrive_core::ports::protector::{FolderProtector, ProtectionType};
use vaultdrive_core::NodeId;

// ============================================================================
// LeaseKey
// ============================================================================

/// Tenant key of one unprotect lease.
///
/// Derives from a stable node ID, not the mutable path: distinct keys for
/// the same physical folder are distinct tenants and are never coalesced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LeaseKey(NodeId);

impl LeaseKey {
    #[must_use]
    pub const fn new(id: NodeId) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn node_id(&self) -> NodeId {
        self.0
    }
}

impl Display for LeaseKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<NodeId> for LeaseKey {
    fn from(id: NodeId) -> Self {
        Self(id)
    }
}

// ============================================================================
// ProtectionTracker
// ============================================================================

struct LeaseState {
    count: usize,
    path: PathBuf,
    restore: ProtectionType,
}

type LeaseMap = Arc<Mutex<HashMap<LeaseKey, LeaseState>>>;

/// Process-wide tracker of unprotect leases.
pub struct ProtectionTracker {
    protector: Arc<dyn FolderProtector>,
    leases: LeaseMap,
    drain_tx: mpsc::UnboundedSender<LeaseKey>,
}

impl ProtectionTracker {
    /// Create a tracker and spawn its drop-drain task.
    pub fn new(protector: Arc<dyn FolderProtector>) -> Arc<Self> {
        let leases: LeaseMap = Arc::new(Mutex::new(HashMap::new()));
        let (drain_tx, mut drain_rx) = mpsc::unbounded_channel::<LeaseKey>();

        {
            let protector = Arc::clone(&protector);
            let leases = Arc::clone(&leases);
            tokio::spawn(async move {
                while let Some(key) = drain_rx.recv().await {
                    debug!(%key, "releasing leaked lease");
                    Self::release_inner(&protector, &leases, key).await;
                }
            });
        }

        Arc::new(Self {
            protector,
            leases,
            drain_tx,
        })
    }

    /// Acquire an unprotect lease for `key`.
    ///
    /// The first tenant physically removes the deny-ACL; later concurrent
    /// tenants only increment the counter. `restore` is the protection
    /// re-applied when the last tenant releases.
    pub async fn unprotect_folder(
        self: &Arc<Self>,
        key: LeaseKey,
        path: &Path,
        restore: ProtectionType,
    ) -> UnprotectLease {
        let mut leases = self.leases.lock().await;
        match leases.get_mut(&key) {
            Some(state) => {
                state.count += 1;
                debug!(%key, count = state.count, "joined existing unprotect lease");
            }
            None => {
                // 0 -> 1: the only transition that touches the OS ACL.
                if !self.protector.unprotect_folder(path).await {
                    warn!(%key, path = %path.display(), "unprotect call failed; lease continues");
                }
                leases.insert(
                    key,
                    LeaseState {
                        count: 1,
                        path: path.to_path_buf(),
                        restore,
                    },
                );
                debug!(%key, "opened unprotect lease");
            }
        }
        drop(leases);

        UnprotectLease {
            key,
            tracker: Arc::clone(self),
            released: false,
        }
    }

    /// Number of keys currently holding an open lease.
    pub async fn active_leases(&self) -> usize {
        self.leases.lock().await.len()
    }

    async fn release_inner(
        protector: &Arc<dyn FolderProtector>,
        leases: &LeaseMap,
        key: LeaseKey,
    ) {
        let mut leases = leases.lock().await;
        let Some(state) = leases.get_mut(&key) else {
            warn!(%key, "release for unknown lease key");
            return;
        };
        state.count -= 1;
        if state.count > 0 {
            debug!(%key, count = state.count, "lease still held by other tenants");
            return;
        }

        // 1 -> 0: re-apply the deny-ACL while still holding the map lock so
        // a racing acquire cannot observe a protected folder with count > 0.
        let state = leases.remove(&key).expect("entry present");
        if !protector.protect_folder(&state.path, state.restore).await {
            warn!(%key, path = %state.path.display(), "re-protect call failed");
        }
        debug!(%key, "closed unprotect lease");
    }
}

impl fmt::Debug for ProtectionTracker {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectionTracker").finish_non_exhaustive()
    }
}

// ============================================================================
// UnprotectLease
// ============================================================================

/// Scoped lease keeping a folder unprotected.
///
/// Prefer [`release`](Self::release) so restoration completes before the
/// owning operation returns; a plain drop still re-protects, through the
/// tracker's drain task.
pub struct UnprotectLease {
    key: LeaseKey,
    tracker: Arc<ProtectionTracker>,
    released: bool,
}

impl UnprotectLease {
    /// The key this lease holds.
    #[must_use]
    pub fn key(&self) -> LeaseKey {
        self.key
    }

    /// Release the lease. Not cancellable: runs to completion once called.
    pub async fn release(mut self) {
        self.released = true;
        ProtectionTracker::release_inner(&self.tracker.protector, &self.tracker.leases, self.key)
            .await;
    }
}

impl Drop for UnprotectLease {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.tracker.drain_tx.send(self.key);
        }
    }
}

impl fmt::Debug for UnprotectLease {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnprotectLease")
            .field("key", &self.key)
            .field("released", &self.released)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Protector double that counts ACL transitions.
    #[derive(Debug, Default)]
    struct CountingProtector {
        unprotect_calls: AtomicUsize,
        protect_calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl FolderProtector for CountingProtector {
        async fn protect_folder(&self, _path: &Path, _protection: ProtectionType) -> bool {
            self.protect_calls.fetch_add(1, Ordering::SeqCst);
            true
        }

        async fn unprotect_folder(&self, _path: &Path) -> bool {
            self.unprotect_calls.fetch_add(1, Ordering::SeqCst);
            true
        }

        async fn protect_file(&self, _path: &Path, _protection: ProtectionType) -> bool {
            true
        }

        async fn unprotect_file(&self, _path: &Path) -> bool {
            true
        }

        async fn unprotect_branch(&self, _path: &Path) -> bool {
            true
        }

        async fn protect_branch(&self, _path: &Path, _protection: ProtectionType) -> bool {
            true
        }
    }

    fn key(id: u64) -> LeaseKey {
        LeaseKey::new(NodeId::new(id))
    }

    #[tokio::test]
    async fn test_single_lease_roundtrip() {
        let protector = Arc::new(CountingProtector::default());
        let tracker = ProtectionTracker::new(Arc::clone(&protector) as _);

        let lease = tracker
            .unprotect_folder(key(1), Path::new("/vault/docs"), ProtectionType::Ancestor)
            .await;
        assert_eq!(protector.unprotect_calls.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.active_leases().await, 1);

        lease.release().await;
        assert_eq!(protector.protect_calls.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.active_leases().await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_tenants_share_one_acl_transition() {
        let protector = Arc::new(CountingProtector::default());
        let tracker = ProtectionTracker::new(Arc::clone(&protector) as _);

        let mut leases = Vec::new();
        for _ in 0..8 {
            leases.push(
                tracker
                    .unprotect_folder(key(1), Path::new("/vault/docs"), ProtectionType::Ancestor)
                    .await,
            );
        }
        assert_eq!(protector.unprotect_calls.load(Ordering::SeqCst), 1);

        // Release in arbitrary order: protect only after the Nth release.
        leases.swap(0, 5);
        while let Some(lease) = leases.pop() {
            let remaining = !leases.is_empty();
            lease.release().await;
            if remaining {
                assert_eq!(protector.protect_calls.load(Ordering::SeqCst), 0);
            }
        }
        assert_eq!(protector.protect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_two_tenants_release_once_keeps_unprotected() {
        let protector = Arc::new(CountingProtector::default());
        let tracker = ProtectionTracker::new(Arc::clone(&protector) as _);

        let first = tracker
            .unprotect_folder(key(9), Path::new("/vault/f"), ProtectionType::Ancestor)
            .await;
        let second = tracker
            .unprotect_folder(key(9), Path::new("/vault/f"), ProtectionType::Ancestor)
            .await;

        first.release().await;
        assert_eq!(protector.protect_calls.load(Ordering::SeqCst), 0);
        assert_eq!(tracker.active_leases().await, 1);

        second.release().await;
        assert_eq!(protector.protect_calls.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.active_leases().await, 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_are_distinct_tenants() {
        let protector = Arc::new(CountingProtector::default());
        let tracker = ProtectionTracker::new(Arc::clone(&protector) as _);

        // Same physical path, different stable node ids: never coalesced.
        let a = tracker
            .unprotect_folder(key(1), Path::new("/vault/f"), ProtectionType::Ancestor)
            .await;
        let b = tracker
            .unprotect_folder(key(2), Path::new("/vault/f"), ProtectionType::Ancestor)
            .await;
        assert_eq!(protector.unprotect_calls.load(Ordering::SeqCst), 2);

        a.release().await;
        assert_eq!(protector.protect_calls.load(Ordering::SeqCst), 1);
        b.release().await;
        assert_eq!(protector.protect_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_dropped_lease_reprotects_via_drain() {
        let protector = Arc::new(CountingProtector::default());
        let tracker = ProtectionTracker::new(Arc::clone(&protector) as _);

        let lease = tracker
            .unprotect_folder(key(3), Path::new("/vault/f"), ProtectionType::Ancestor)
            .await;
        drop(lease);

        // The drain task runs asynchronously; poll until it lands.
        for _ in 0..100 {
            if tracker.active_leases().await == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(tracker.active_leases().await, 0);
        assert_eq!(protector.protect_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_parallel_acquires_serialize_through_lock() {
        let protector = Arc::new(CountingProtector::default());
        let tracker = ProtectionTracker::new(Arc::clone(&protector) as _);

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let tracker = Arc::clone(&tracker);
            tasks.push(tokio::spawn(async move {
                let lease = tracker
                    .unprotect_folder(key(7), Path::new("/vault/f"), ProtectionType::Ancestor)
                    .await;
                tokio::task::yield_now().await;
                lease.release().await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        // However the tasks interleaved, transitions stayed paired and the
        // map drained.
        assert_eq!(tracker.active_leases().await, 0);
        assert_eq!(
            protector.unprotect_calls.load(Ordering::SeqCst),
            protector.protect_calls.load(Ordering::SeqCst)
        );
    }
}
