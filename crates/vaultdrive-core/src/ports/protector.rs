//! Folder structure protector port
//!
//! Applies and removes deny-ACL entries so non-adapter processes cannot
//! mutate a managed tree. The API is boolean and non-throwing: failures are
//! logged by implementations and reported as `false`. Callers re-throw only
//! unauthorized-access, with context, past this boundary.

use std::path::Path;

/// Which rights a protection entry denies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtectionType {
    /// An ancestor directory: deny delete/rename of the directory itself.
    Ancestor,
    /// An ancestor directory including its direct files.
    AncestorWithFiles,
    /// A leaf node: deny any mutation of the node.
    Leaf,
    /// Deny writes only; reads stay allowed.
    ReadOnly,
}

/// Port trait for protective-ACL application.
#[async_trait::async_trait]
pub trait FolderProtector: Send + Sync {
    /// Apply a deny entry to a folder. Returns `false` on failure.
    async fn protect_folder(&self, path: &Path, protection: ProtectionType) -> bool;

    /// Remove the deny entry from a folder. Returns `false` on failure.
    async fn unprotect_folder(&self, path: &Path) -> bool;

    /// Apply a deny entry to a file. Returns `false` on failure.
    async fn protect_file(&self, path: &Path, protection: ProtectionType) -> bool;

    /// Remove the deny entry from a file. Returns `false` on failure.
    async fn unprotect_file(&self, path: &Path) -> bool;

    /// Recursively remove deny entries from a whole branch.
    async fn unprotect_branch(&self, path: &Path) -> bool;

    /// Recursively re-apply deny entries to a whole branch.
    async fn protect_branch(&self, path: &Path, protection: ProtectionType) -> bool;
}
