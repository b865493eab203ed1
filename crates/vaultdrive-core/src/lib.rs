//! VaultDrive Core - Domain model and port definitions
//!
//! This crate contains the shared vocabulary of the local filesystem adapter:
//! - **Domain values** - `NodeInfo`, `RootInfo`, `EventLogEntry`, placeholder states
//! - **Port definitions** - Traits the adapter stacks implement and consume:
//!   `FileClient`, `EventClient`, `FolderProtector`, `PlaceholderApi`
//! - **Error taxonomy** - `FsError`, the single error type crossing the port boundary
//! - **Mapping configuration** - The mapping set the stack factories consume
//!
//! # Architecture
//!
//! The adapter follows the ports & adapters pattern. This crate is pure
//! vocabulary: no OS calls live here. The `vaultdrive-vfs` crate implements
//! the file-client side, `vaultdrive-events` the change-notification side.
//! Both are composed per mapping-set generation by their factories and
//! addressed solely by root ID and root-relative paths - no native path or
//! handle crosses the port boundary.

pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;

pub use domain::errors::FsError;
pub use domain::event::{ChangeKind, EventLogEntry};
pub use domain::node::{
    NodeAttributes, NodeId, NodeInfo, NodeKind, PlaceholderState, RelativePath, RevisionToken,
};
pub use domain::root::{RootId, RootInfo, ScopeId, VolumeId};
