//! Raw filesystem watcher
//!
//! Wraps the `notify` crate to monitor one root recursively, converting raw
//! OS notifications into [`RawEvent`] values pushed through an mpsc channel.
//! Canonicalization into [`EventLogEntry`](vaultdrive_core::EventLogEntry)
//! happens downstream; this layer stays 1:1 with what the OS reported.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// One raw OS notification, decoupled from the `notify` event types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawEvent {
    /// A file or directory appeared at the path.
    Created(PathBuf),
    /// Content or metadata changed at the path.
    Modified(PathBuf),
    /// A file or directory disappeared from the path.
    Removed(PathBuf),
    /// A rename observed with both endpoints.
    Renamed {
        old: PathBuf,
        new: PathBuf,
    },
    /// The watcher itself failed; history from here on is unreliable.
    Failed(Option<PathBuf>),
}

/// RAII wrapper around one recursive OS watch.
///
/// Dropping the watcher stops observation; the receiver then drains and
/// closes.
pub struct RawWatcher {
    _watcher: RecommendedWatcher,
    path: PathBuf,
}

impl RawWatcher {
    /// Start watching `path` recursively.
    ///
    /// # Errors
    /// Fails if the OS watcher cannot be created or the path cannot be
    /// watched.
    pub fn start(path: &Path, capacity: usize) -> Result<(Self, mpsc::Receiver<RawEvent>)> {
        let (tx, rx) = mpsc::channel::<RawEvent>(capacity);

        info!(path = %path.display(), "starting recursive watch");

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    if let Some(raw) = map_notify_event(&event) {
                        if let Err(e) = tx.blocking_send(raw) {
                            warn!(error = %e, "raw event dropped (receiver gone)");
                        }
                    }
                }
                Err(err) => {
                    warn!(error = %err, "watcher error");
                    let path = err.paths.first().cloned();
                    let _ = tx.blocking_send(RawEvent::Failed(path));
                }
            },
            notify::Config::default(),
        )
        .context("failed to create watcher")?;

        watcher
            .watch(path, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", path.display()))?;

        Ok((
            Self {
                _watcher: watcher,
                path: path.to_path_buf(),
            },
            rx,
        ))
    }

    /// The root path under observation.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// 1:1 mapping of notify event kinds into [`RawEvent`].
///
/// - `Create(*)` -> `Created`
/// - `Modify(Data(*))` and other `Modify(*)` -> `Modified`
/// - `Modify(Name(Both))` with both paths -> `Renamed`
/// - `Remove(*)` -> `Removed`
/// - access events and path-less events are ignored
fn map_notify_event(event: &notify::Event) -> Option<RawEvent> {
    let paths = &event.paths;

    match &event.kind {
        EventKind::Create(_) => {
            let path = paths.first()?;
            debug!(path = %path.display(), "raw create");
            Some(RawEvent::Created(path.clone()))
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if paths.len() >= 2 {
                Some(RawEvent::Renamed {
                    old: paths[0].clone(),
                    new: paths[1].clone(),
                })
            } else {
                // Rename with one endpoint observed: treat as a change at
                // that path.
                let path = paths.first()?;
                Some(RawEvent::Modified(path.clone()))
            }
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            let path = paths.first()?;
            Some(RawEvent::Removed(path.clone()))
        }

        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            let path = paths.first()?;
            Some(RawEvent::Created(path.clone()))
        }

        EventKind::Modify(_) => {
            let path = paths.first()?;
            debug!(path = %path.display(), kind = ?event.kind, "raw modify");
            Some(RawEvent::Modified(path.clone()))
        }

        EventKind::Remove(_) => {
            let path = paths.first()?;
            debug!(path = %path.display(), "raw remove");
            Some(RawEvent::Removed(path.clone()))
        }

        _ => {
            debug!(kind = ?event.kind, "ignoring event kind");
            None
        }
    }
}
