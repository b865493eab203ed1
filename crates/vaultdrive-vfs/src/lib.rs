//! VaultDrive VFS - the file-client side of the local filesystem adapter
//!
//! Turns abstract `FileClient` operations into real OS calls across many
//! independently configured local roots while enforcing platform safety and
//! virtualization rules:
//!
//! - [`native`] - lowest-level bridge: real file I/O plus the placeholder API,
//!   mapping OS errors into the adapter taxonomy exactly once
//! - [`hydration`] - on-demand write state machine, refcounted demand channel
//! - [`protect`] - deny-ACL application and refcounted unprotect leases
//! - [`rooted`] - root-relative path / virtual-ID translation per mapping
//! - [`protecting`] - lease-around-mutation decorators
//! - [`decorators`] - read-only, backup, trash-fallback, abort wrappers
//! - [`virtual_root`] - one-file pseudo-root projection
//! - [`dispatch`] - per-root routing over the decorated stacks
//! - [`factory`] - folds the decorator pipeline per mapping-set generation
//!
//! The stacks are data, not inheritance: the factory composes each root's
//! client by folding an ordered list of decorator constructors over a base
//! client and hands back one composite per mapping-set generation.

pub mod decorators;
pub mod dispatch;
pub mod factory;
pub mod hydration;
pub mod native;
pub mod placeholder;
pub mod protect;
pub mod protecting;
pub mod rooted;
pub mod virtual_root;

pub use decorators::{AbortingClient, BackupClient, ReadOnlyClient, TrashFallbackClient};
pub use dispatch::DispatchingClient;
pub use factory::{build_file_stacks, FileStacks};
pub use hydration::OnDemandClient;
pub use native::NativeFileClient;
pub use placeholder::{DisabledPlaceholders, InMemoryPlaceholders};
pub use protect::acl::ModeBitProtector;
pub use protect::tracker::{LeaseKey, ProtectionTracker, UnprotectLease};
pub use protecting::{ProtectingFileClient, ProtectingFolderClient, RevisionGuard};
pub use rooted::RootedClient;
pub use virtual_root::SingleFileRootClient;

#[cfg(test)]
pub(crate) mod test_support;
