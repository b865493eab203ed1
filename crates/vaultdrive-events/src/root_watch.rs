//! Root-deletion detection
//!
//! Watches the canonical stream for the disappearance of a known root node.
//! Consumers subscribe per root and treat a flip to `false`, together with
//! the accompanying `Skipped` marker, as "rebuild this scope".

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::warn;

use vaultdrive_core::{ChangeKind, EventLogEntry, RootId, RootInfo};

/// Flags when a known root node disappears entirely from the stream.
pub struct RootPresenceDetector {
    states: DashMap<RootId, watch::Sender<bool>>,
}

impl RootPresenceDetector {
    /// Track presence for the given roots, all initially present.
    pub fn new(roots: &[RootInfo]) -> Self {
        let states = DashMap::new();
        for root in roots {
            let (tx, _rx) = watch::channel(true);
            states.insert(root.root_id, tx);
        }
        Self { states }
    }

    /// Subscribe to one root's presence; `None` for unknown roots.
    pub fn subscribe(&self, root: RootId) -> Option<watch::Receiver<bool>> {
        self.states.get(&root).map(|tx| tx.subscribe())
    }

    /// Current presence; `None` for unknown roots.
    pub fn is_present(&self, root: RootId) -> Option<bool> {
        self.states.get(&root).map(|tx| *tx.borrow())
    }

    /// Inspect one canonical entry before it is fanned out.
    pub fn observe(&self, entry: &EventLogEntry) {
        let gone = match entry.change {
            ChangeKind::DeletedOrMovedFrom => entry.path.is_root(),
            ChangeKind::Moved => entry
                .old_path
                .as_ref()
                .map(|p| p.is_root())
                .unwrap_or(false),
            _ => false,
        };
        let back = entry.change == ChangeKind::CreatedOrMovedTo && entry.path.is_root();

        if gone {
            if let Some(tx) = self.states.get(&entry.root) {
                warn!(root = %entry.root, "root node disappeared from the stream");
                let _ = tx.send(false);
            }
        } else if back {
            if let Some(tx) = self.states.get(&entry.root) {
                let _ = tx.send(true);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use vaultdrive_core::{NodeId, RelativePath, ScopeId, VolumeId};

    use super::*;

    fn roots() -> Vec<RootInfo> {
        vec![RootInfo {
            root_id: RootId::new(1),
            node_id: NodeId::new(500),
            volume_id: VolumeId::new("vol-1"),
            scope: ScopeId::new("scope-a"),
            local_path: "/vault".into(),
            on_demand: false,
            enabled: true,
        }]
    }

    #[test]
    fn test_initially_present() {
        let detector = RootPresenceDetector::new(&roots());
        assert_eq!(detector.is_present(RootId::new(1)), Some(true));
        assert_eq!(detector.is_present(RootId::new(9)), None);
    }

    #[test]
    fn test_root_deletion_flips_presence() {
        let detector = RootPresenceDetector::new(&roots());
        let mut rx = detector.subscribe(RootId::new(1)).unwrap();

        let mut entry = EventLogEntry::skipped(RootId::new(1));
        entry.change = ChangeKind::DeletedOrMovedFrom;
        detector.observe(&entry);

        assert_eq!(detector.is_present(RootId::new(1)), Some(false));
        assert!(rx.has_changed().unwrap());
    }

    #[test]
    fn test_child_deletion_keeps_presence() {
        let detector = RootPresenceDetector::new(&roots());

        let mut entry = EventLogEntry::skipped(RootId::new(1));
        entry.change = ChangeKind::DeletedOrMovedFrom;
        entry.path = RelativePath::new("docs/a.txt").unwrap();
        detector.observe(&entry);

        assert_eq!(detector.is_present(RootId::new(1)), Some(true));
    }

    #[test]
    fn test_move_away_from_root_flips_presence() {
        let detector = RootPresenceDetector::new(&roots());

        let mut entry = EventLogEntry::skipped(RootId::new(1));
        entry.change = ChangeKind::Moved;
        entry.old_path = Some(RelativePath::root());
        detector.observe(&entry);

        assert_eq!(detector.is_present(RootId::new(1)), Some(false));
    }

    #[test]
    fn test_recreation_restores_presence() {
        let detector = RootPresenceDetector::new(&roots());

        let mut gone = EventLogEntry::skipped(RootId::new(1));
        gone.change = ChangeKind::DeletedOrMovedFrom;
        detector.observe(&gone);
        assert_eq!(detector.is_present(RootId::new(1)), Some(false));

        let mut back = EventLogEntry::skipped(RootId::new(1));
        back.change = ChangeKind::CreatedOrMovedTo;
        detector.observe(&back);
        assert_eq!(detector.is_present(RootId::new(1)), Some(true));
    }
}
