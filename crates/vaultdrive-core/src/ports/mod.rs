//! Port definitions (trait seams between the sync engine, the adapter
//! stacks, and the OS surfaces they consume).

pub mod event_client;
pub mod file_client;
pub mod placeholder;
pub mod protector;

pub use event_client::{EventClient, EventSubscription};
pub use file_client::{DeleteMode, ExpectedMetadata, FileClient, WriteOptions};
pub use placeholder::{HydrationDemand, HydrationHandler, PlaceholderApi};
pub use protector::{FolderProtector, ProtectionType};
