//! Multi-root stream aggregation
//!
//! Merges the per-root raw streams, keyed by (scope, volume), into one
//! fan-out stream: roots sharing a scope share one OS watcher, so a consumer
//! sees one callback per physical change no matter how many roots cover it.
//! Every subscription starts with one `Skipped` entry per root - history
//! before (or between) observation windows is unknown by definition - and a
//! consumer that falls behind the fan-out buffer is handed fresh `Skipped`
//! markers instead of silently losing entries.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use vaultdrive_core::ports::event_client::{EventClient, EventSubscription};
use vaultdrive_core::ports::placeholder::PlaceholderApi;
use vaultdrive_core::{EventLogEntry, FsError, RootId, RootInfo};

use crate::canonical::Canonicalizer;
use crate::root_watch::RootPresenceDetector;
use crate::watcher::{RawEvent, RawWatcher};

// ============================================================================
// ScopeGroup
// ============================================================================

struct GroupRuntime {
    broadcast_tx: broadcast::Sender<EventLogEntry>,
    subscribers: usize,
    pumps: Vec<JoinHandle<()>>,
    /// Kept alive to keep the OS watches registered.
    _watchers: Vec<RawWatcher>,
}

/// One (scope, volume) group of roots sharing a watcher set.
struct ScopeGroup {
    roots: Vec<RootInfo>,
    placeholders: Arc<dyn PlaceholderApi>,
    detector: Arc<RootPresenceDetector>,
    capacity: usize,
    runtime: StdMutex<Option<GroupRuntime>>,
}

impl ScopeGroup {
    /// Join the group's fan-out, starting observation for the first
    /// subscriber.
    fn acquire(&self) -> Result<broadcast::Sender<EventLogEntry>, FsError> {
        let mut runtime = self.runtime.lock().expect("group lock poisoned");

        if runtime.is_none() {
            let (broadcast_tx, _) = broadcast::channel(self.capacity);

            // Most specific root first, so a raw path maps to the root that
            // actually owns it when anchors nest.
            let mut canonicalizers: Vec<Arc<Canonicalizer>> = self
                .roots
                .iter()
                .map(|root| {
                    Arc::new(Canonicalizer::new(root.clone(), Arc::clone(&self.placeholders)))
                })
                .collect();
            canonicalizers.sort_by_key(|c| std::cmp::Reverse(c.anchor_depth()));
            let canonicalizers = Arc::new(canonicalizers);

            let mut watchers = Vec::new();
            let mut pumps = Vec::new();
            let mut watched: Vec<PathBuf> = Vec::new();

            for root in &self.roots {
                // A root nested under an already-watched anchor rides that
                // watcher; a second OS watch would double every callback.
                if watched.iter().any(|w| root.local_path.starts_with(w)) {
                    debug!(root = %root.root_id, "sharing existing watcher for nested anchor");
                    continue;
                }
                let (watcher, raw_rx) = RawWatcher::start(&root.local_path, self.capacity)
                    .map_err(|e| FsError::Unknown(e.to_string()))?;
                watched.push(root.local_path.clone());
                watchers.push(watcher);
                pumps.push(self.spawn_pump(
                    raw_rx,
                    Arc::clone(&canonicalizers),
                    broadcast_tx.clone(),
                ));
            }

            info!(
                roots = self.roots.len(),
                watchers = watchers.len(),
                "scope group observation started"
            );
            *runtime = Some(GroupRuntime {
                broadcast_tx,
                subscribers: 0,
                pumps,
                _watchers: watchers,
            });
        }

        let runtime = runtime.as_mut().expect("runtime just ensured");
        runtime.subscribers += 1;
        Ok(runtime.broadcast_tx.clone())
    }

    fn spawn_pump(
        &self,
        mut raw_rx: mpsc::Receiver<RawEvent>,
        canonicalizers: Arc<Vec<Arc<Canonicalizer>>>,
        broadcast_tx: broadcast::Sender<EventLogEntry>,
    ) -> JoinHandle<()> {
        let detector = Arc::clone(&self.detector);
        let root_ids: Vec<RootId> = self.roots.iter().map(|r| r.root_id).collect();

        tokio::spawn(async move {
            while let Some(raw) = raw_rx.recv().await {
                if matches!(raw, RawEvent::Failed(None)) {
                    // History is gone for the whole scope.
                    warn!("watcher failed without a path; marking every root skipped");
                    for root in &root_ids {
                        let _ = broadcast_tx.send(EventLogEntry::skipped(*root));
                    }
                    continue;
                }

                // First (most specific) root owning the path wins: one
                // canonical entry per physical change.
                for canonicalizer in canonicalizers.iter() {
                    if let Some(entry) = canonicalizer.canonicalize(&raw).await {
                        detector.observe(&entry);
                        let _ = broadcast_tx.send(entry);
                        break;
                    }
                }
            }
            debug!("raw stream ended");
        })
    }

    /// Leave the fan-out; the last subscriber stops observation.
    fn release(&self) {
        let mut runtime = self.runtime.lock().expect("group lock poisoned");
        if let Some(state) = runtime.as_mut() {
            state.subscribers -= 1;
            if state.subscribers == 0 {
                let state = runtime.take().expect("state present");
                for pump in state.pumps {
                    pump.abort();
                }
                info!("scope group observation stopped");
            }
        }
    }
}

// ============================================================================
// AggregatingEventClient
// ============================================================================

/// Composite event source over every configured root.
pub struct AggregatingEventClient {
    groups: Vec<Arc<ScopeGroup>>,
    detector: Arc<RootPresenceDetector>,
    capacity: usize,
}

impl AggregatingEventClient {
    /// Group the roots by (scope, volume) and prepare (but do not start)
    /// their watchers.
    pub fn new(
        roots: Vec<RootInfo>,
        placeholders: Arc<dyn PlaceholderApi>,
        capacity: usize,
    ) -> Arc<Self> {
        let detector = Arc::new(RootPresenceDetector::new(&roots));

        let mut grouped: BTreeMap<(String, String), Vec<RootInfo>> = BTreeMap::new();
        for root in roots {
            grouped
                .entry((root.scope.as_str().to_string(), root.volume_id.as_str().to_string()))
                .or_default()
                .push(root);
        }

        let groups = grouped
            .into_values()
            .map(|roots| {
                Arc::new(ScopeGroup {
                    roots,
                    placeholders: Arc::clone(&placeholders),
                    detector: Arc::clone(&detector),
                    capacity,
                    runtime: StdMutex::new(None),
                })
            })
            .collect();

        Arc::new(Self {
            groups,
            detector,
            capacity,
        })
    }

    /// Root presence signals fed from the merged stream.
    #[must_use]
    pub fn presence(&self) -> Arc<RootPresenceDetector> {
        Arc::clone(&self.detector)
    }
}

#[async_trait::async_trait]
impl EventClient for AggregatingEventClient {
    async fn subscribe(&self) -> Result<EventSubscription, FsError> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let mut forwarders: Vec<JoinHandle<()>> = Vec::new();
        let mut acquired: Vec<Arc<ScopeGroup>> = Vec::new();

        for group in &self.groups {
            let broadcast_tx = match group.acquire() {
                Ok(btx) => btx,
                Err(e) => {
                    for forwarder in forwarders {
                        forwarder.abort();
                    }
                    for joined in acquired {
                        joined.release();
                    }
                    return Err(e);
                }
            };
            acquired.push(Arc::clone(group));

            // The mandatory marker, before any real entry of this window.
            for root in &group.roots {
                let _ = tx.try_send(EventLogEntry::skipped(root.root_id));
            }

            let mut broadcast_rx = broadcast_tx.subscribe();
            let forward_tx = tx.clone();
            let root_ids: Vec<RootId> = group.roots.iter().map(|r| r.root_id).collect();
            forwarders.push(tokio::spawn(async move {
                loop {
                    match broadcast_rx.recv().await {
                        Ok(entry) => {
                            if forward_tx.send(entry).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "subscriber lagged; history lost for the scope");
                            for root in &root_ids {
                                if forward_tx
                                    .send(EventLogEntry::skipped(*root))
                                    .await
                                    .is_err()
                                {
                                    return;
                                }
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }));
        }

        Ok(EventSubscription::new(rx, move || {
            for forwarder in forwarders {
                forwarder.abort();
            }
            for group in acquired {
                group.release();
            }
        }))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::os::unix::fs::MetadataExt;

    use tempfile::TempDir;

    use vaultdrive_core::{ChangeKind, NodeId, ScopeId, VolumeId};
    use vaultdrive_vfs::placeholder::DisabledPlaceholders;

    use super::*;

    fn root_info(id: u64, dir: &TempDir, scope: &str) -> RootInfo {
        RootInfo {
            root_id: RootId::new(id),
            node_id: NodeId::new(std::fs::metadata(dir.path()).unwrap().ino()),
            volume_id: VolumeId::new("vol-1"),
            scope: ScopeId::new(scope),
            local_path: dir.path().to_path_buf(),
            on_demand: false,
            enabled: true,
        }
    }

    #[tokio::test]
    async fn test_every_subscription_starts_with_skipped_per_root() {
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();
        let roots = vec![root_info(1, &dir_a, "scope-a"), root_info(2, &dir_b, "scope-b")];
        let client = AggregatingEventClient::new(roots, Arc::new(DisabledPlaceholders), 64);

        let mut sub = client.subscribe().await.unwrap();
        let mut skipped_roots = Vec::new();
        for _ in 0..2 {
            let entry = sub.recv().await.unwrap();
            assert_eq!(entry.change, ChangeKind::Skipped);
            skipped_roots.push(entry.root);
        }
        skipped_roots.sort();
        assert_eq!(skipped_roots, vec![RootId::new(1), RootId::new(2)]);
    }

    #[tokio::test]
    async fn test_resubscription_emits_skipped_again() {
        let dir = TempDir::new().unwrap();
        let roots = vec![root_info(1, &dir, "scope-a")];
        let client = AggregatingEventClient::new(roots, Arc::new(DisabledPlaceholders), 64);

        let mut first = client.subscribe().await.unwrap();
        assert_eq!(first.recv().await.unwrap().change, ChangeKind::Skipped);
        drop(first);

        // Disabling then re-enabling observation re-emits the marker before
        // any real entry.
        let mut second = client.subscribe().await.unwrap();
        assert_eq!(second.recv().await.unwrap().change, ChangeKind::Skipped);
    }

    #[tokio::test]
    async fn test_detector_is_exposed() {
        let dir = TempDir::new().unwrap();
        let roots = vec![root_info(1, &dir, "scope-a")];
        let client = AggregatingEventClient::new(roots, Arc::new(DisabledPlaceholders), 64);
        assert_eq!(client.presence().is_present(RootId::new(1)), Some(true));
    }
}
