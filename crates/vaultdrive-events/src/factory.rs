//! Event client factory
//!
//! Builds one composite event client per mapping-set generation: the
//! aggregator over every enabled root, with single-file-root filters layered
//! on top for virtual mappings. Like the file-side stacks, the composite is
//! rebuilt (never mutated) when the mapping set changes.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use vaultdrive_core::config::AdapterConfig;
use vaultdrive_core::ports::event_client::{EventClient, EventSubscription};
use vaultdrive_core::ports::placeholder::PlaceholderApi;
use vaultdrive_core::{EventLogEntry, FsError, RelativePath, RootInfo};

use crate::aggregate::AggregatingEventClient;
use crate::root_watch::RootPresenceDetector;
use crate::virtual_root::SingleFileEventFilter;

/// Composite event client: aggregated roots plus virtual-root projections.
pub struct CompositeEventClient {
    inner: Arc<dyn EventClient>,
    filters: Vec<SingleFileEventFilter>,
    presence: Arc<RootPresenceDetector>,
    capacity: usize,
}

impl CompositeEventClient {
    pub fn new(
        inner: Arc<dyn EventClient>,
        filters: Vec<SingleFileEventFilter>,
        presence: Arc<RootPresenceDetector>,
        capacity: usize,
    ) -> Self {
        Self {
            inner,
            filters,
            presence,
            capacity,
        }
    }

    /// Root presence signals fed from the merged stream.
    #[must_use]
    pub fn presence(&self) -> Arc<RootPresenceDetector> {
        Arc::clone(&self.presence)
    }
}

#[async_trait::async_trait]
impl EventClient for CompositeEventClient {
    async fn subscribe(&self) -> Result<EventSubscription, FsError> {
        let mut inner_sub = self.inner.subscribe().await?;
        let (tx, rx) = mpsc::channel(self.capacity);

        // The aggregator's markers for virtual source roots are dropped by
        // the filters below; the virtual scopes get their own.
        for filter in &self.filters {
            let _ = tx.try_send(EventLogEntry::skipped(filter.virtual_root()));
        }

        let filters = self.filters.clone();
        let pump: JoinHandle<()> = tokio::spawn(async move {
            while let Some(entry) = inner_sub.recv().await {
                let mapped = match filters.iter().find(|f| f.source_root() == entry.root) {
                    Some(filter) => filter.map(&entry),
                    None => Some(entry),
                };
                if let Some(entry) = mapped {
                    if tx.send(entry).await.is_err() {
                        break;
                    }
                }
            }
        });

        Ok(EventSubscription::new(rx, move || pump.abort()))
    }
}

/// Build the composite event client for the given mapping set.
///
/// `roots` is the rebuilt root set the file-side factory produced for the
/// same generation.
///
/// # Errors
/// Fails for malformed virtual-file projections.
pub fn build_event_client(
    config: &AdapterConfig,
    roots: &[RootInfo],
    placeholders: Arc<dyn PlaceholderApi>,
) -> Result<Arc<CompositeEventClient>, FsError> {
    let aggregator = AggregatingEventClient::new(
        roots.to_vec(),
        placeholders,
        config.tuning.event_channel_capacity,
    );
    let presence = aggregator.presence();

    let mut filters = Vec::new();
    for mapping in config.enabled_mappings() {
        if let Some(virtual_file) = &mapping.virtual_file {
            let parent_path = if virtual_file.parent_path.is_empty() {
                RelativePath::root()
            } else {
                RelativePath::new(virtual_file.parent_path.clone())?
            };
            filters.push(SingleFileEventFilter::new(
                mapping.root_id,
                mapping.root_id,
                parent_path,
                virtual_file.file_name.clone(),
            )?);
        }
    }

    info!(
        roots = roots.len(),
        virtual_roots = filters.len(),
        "event client built"
    );
    Ok(Arc::new(CompositeEventClient::new(
        aggregator,
        filters,
        presence,
        config.tuning.event_channel_capacity,
    )))
}
