//! VaultDrive Events - the change-notification side of the adapter
//!
//! Reconciles raw OS change events from multiple physical roots into one
//! canonical, root-deletion-aware stream:
//!
//! - [`watcher`] - notify wrapper emitting raw per-root events
//! - [`canonical`] - raw event → [`EventLogEntry`] translation, with the
//!   mandatory `Skipped` marker whenever observation history is lost
//! - [`aggregate`] - merges per-root streams keyed by (scope, volume) into
//!   one fan-out stream
//! - [`virtual_root`] - reduces the merged stream to a single-file root's
//!   (parent, name) with synthetic create/delete on renames
//! - [`root_watch`] - flags when a known root node disappears
//! - [`factory`] - builds the composite event client per mapping generation
//!
//! [`EventLogEntry`]: vaultdrive_core::EventLogEntry

pub mod aggregate;
pub mod canonical;
pub mod factory;
pub mod root_watch;
pub mod virtual_root;
pub mod watcher;

pub use aggregate::AggregatingEventClient;
pub use canonical::Canonicalizer;
pub use factory::{build_event_client, CompositeEventClient};
pub use root_watch::RootPresenceDetector;
pub use virtual_root::SingleFileEventFilter;
pub use watcher::{RawEvent, RawWatcher};
