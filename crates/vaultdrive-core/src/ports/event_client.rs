//! Event client port
//!
//! The sync engine subscribes to canonical change-log entries through this
//! trait. A subscription is an RAII value: dropping it stops observation for
//! this consumer. Every (re)start of observation delivers one `Skipped`
//! entry before any real entry, because history during the gap is unknown.

use tokio::sync::mpsc;

use crate::domain::errors::FsError;
use crate::domain::event::EventLogEntry;

/// RAII handle for one active event subscription.
///
/// Dropping the subscription releases the consumer slot; the watcher itself
/// keeps running for other subscribers.
pub struct EventSubscription {
    receiver: mpsc::Receiver<EventLogEntry>,
    stop_fn: Option<Box<dyn FnOnce() + Send>>,
}

impl EventSubscription {
    /// Create a subscription over a receiver and a stop callback invoked
    /// exactly once on drop.
    pub fn new(
        receiver: mpsc::Receiver<EventLogEntry>,
        stop_fn: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            receiver,
            stop_fn: Some(Box::new(stop_fn)),
        }
    }

    /// Receive the next canonical entry; `None` when observation ended.
    pub async fn recv(&mut self) -> Option<EventLogEntry> {
        self.receiver.recv().await
    }

    /// Non-blocking receive for draining in tests and shutdown paths.
    pub fn try_recv(&mut self) -> Option<EventLogEntry> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Some(stop_fn) = self.stop_fn.take() {
            stop_fn();
        }
    }
}

impl std::fmt::Debug for EventSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSubscription")
            .field("active", &self.stop_fn.is_some())
            .finish()
    }
}

/// Port trait for change observation.
#[async_trait::async_trait]
pub trait EventClient: Send + Sync {
    /// Start (or join) observation and return a subscription delivering
    /// canonical entries, beginning with a `Skipped` marker per scope.
    async fn subscribe(&self) -> Result<EventSubscription, FsError>;
}
