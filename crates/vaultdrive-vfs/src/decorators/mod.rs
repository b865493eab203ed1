//! Cross-cutting decorators
//!
//! Thin wrappers stacked by the factory per mapping type: read-only
//! enforcement, backup-before-overwrite, permanent-deletion fallback for
//! failed trash moves, and in-flight-transfer abortion. Each forwards what it
//! does not alter; none re-interprets errors coming from below.

pub mod abort;
pub mod backup;
pub mod read_only;
pub mod trash;

pub use abort::AbortingClient;
pub use backup::BackupClient;
pub use read_only::ReadOnlyClient;
pub use trash::TrashFallbackClient;
