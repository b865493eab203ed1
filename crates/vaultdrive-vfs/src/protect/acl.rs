//! Deny-ACL application via permission bits
//!
//! On Unix the deny entries are expressed as mode-bit masks: protected
//! directories lose their write bits (children cannot be created, renamed or
//! removed), protected files lose theirs. The API is boolean and
//! non-throwing; failures are logged and reported as `false`, never raised
//! past this boundary.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use vaultdrive_core::ports::protector::{FolderProtector, ProtectionType};

/// Directory mode with write denied (traverse/read stay allowed).
const DIR_PROTECTED: u32 = 0o555;
/// Directory mode with write restored for the owner.
const DIR_OPEN: u32 = 0o755;
/// File mode with write denied.
const FILE_PROTECTED: u32 = 0o444;
/// File mode with write restored for the owner.
const FILE_OPEN: u32 = 0o644;

/// Mode-bit based implementation of [`FolderProtector`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeBitProtector;

impl ModeBitProtector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn set_mode(path: &Path, mode: u32) -> bool {
        let path = path.to_path_buf();
        let result = tokio::task::spawn_blocking(move || {
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(mode))
                .map(|()| path)
        })
        .await;

        match result {
            Ok(Ok(path)) => {
                debug!(path = %path.display(), mode = format!("{mode:o}"), "mode applied");
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, "failed to apply protection mode");
                false
            }
            Err(e) => {
                warn!(error = %e, "protection task panicked");
                false
            }
        }
    }

    /// Apply a mode to every entry of a branch: parents before children when
    /// opening a branch up, children before parents when locking it down.
    async fn walk_modes(path: &Path, dir_mode: u32, file_mode: u32, top_down: bool) -> bool {
        let root = path.to_path_buf();
        let entries = tokio::task::spawn_blocking(move || collect_branch(&root)).await;
        let mut entries = match entries {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "branch walk task panicked");
                return false;
            }
        };
        if !top_down {
            entries.reverse();
        }

        let mut ok = true;
        for (entry, is_dir) in entries {
            let mode = if is_dir { dir_mode } else { file_mode };
            ok &= Self::set_mode(&entry, mode).await;
        }
        ok
    }
}

/// Collect a branch top-down (parents before children). Unreadable entries
/// are skipped; protection stays best-effort.
fn collect_branch(root: &Path) -> Vec<(PathBuf, bool)> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(current) = stack.pop() {
        let Ok(metadata) = std::fs::symlink_metadata(&current) else {
            continue;
        };
        let is_dir = metadata.is_dir();
        out.push((current.clone(), is_dir));
        if is_dir {
            if let Ok(reader) = std::fs::read_dir(&current) {
                for entry in reader.flatten() {
                    stack.push(entry.path());
                }
            }
        }
    }
    out
}

#[async_trait::async_trait]
impl FolderProtector for ModeBitProtector {
    async fn protect_folder(&self, path: &Path, protection: ProtectionType) -> bool {
        let ok = Self::set_mode(path, DIR_PROTECTED).await;
        if protection == ProtectionType::AncestorWithFiles {
            return ok && Self::protect_direct_files(path).await;
        }
        ok
    }

    async fn unprotect_folder(&self, path: &Path) -> bool {
        Self::set_mode(path, DIR_OPEN).await
    }

    async fn protect_file(&self, path: &Path, _protection: ProtectionType) -> bool {
        Self::set_mode(path, FILE_PROTECTED).await
    }

    async fn unprotect_file(&self, path: &Path) -> bool {
        Self::set_mode(path, FILE_OPEN).await
    }

    async fn unprotect_branch(&self, path: &Path) -> bool {
        Self::walk_modes(path, DIR_OPEN, FILE_OPEN, true).await
    }

    async fn protect_branch(&self, path: &Path, _protection: ProtectionType) -> bool {
        Self::walk_modes(path, DIR_PROTECTED, FILE_PROTECTED, false).await
    }
}

impl ModeBitProtector {
    async fn protect_direct_files(path: &Path) -> bool {
        let dir = path.to_path_buf();
        let files = tokio::task::spawn_blocking(move || {
            let mut files = Vec::new();
            if let Ok(reader) = std::fs::read_dir(&dir) {
                for entry in reader.flatten() {
                    if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                        files.push(entry.path());
                    }
                }
            }
            files
        })
        .await
        .unwrap_or_default();

        let mut ok = true;
        for file in files {
            ok &= Self::set_mode(&file, FILE_PROTECTED).await;
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn mode_of(path: &Path) -> u32 {
        std::fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[tokio::test]
    async fn test_protect_unprotect_folder() {
        let dir = TempDir::new().unwrap();
        let protector = ModeBitProtector::new();

        assert!(protector.protect_folder(dir.path(), ProtectionType::Ancestor).await);
        assert_eq!(mode_of(dir.path()), DIR_PROTECTED);

        assert!(protector.unprotect_folder(dir.path()).await);
        assert_eq!(mode_of(dir.path()), DIR_OPEN);
    }

    #[tokio::test]
    async fn test_protect_file_denies_writes() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();
        let protector = ModeBitProtector::new();

        assert!(protector.protect_file(&file, ProtectionType::Leaf).await);
        assert_eq!(mode_of(&file), FILE_PROTECTED);
        assert!(std::fs::write(&file, b"y").is_err());

        assert!(protector.unprotect_file(&file).await);
        assert!(std::fs::write(&file, b"y").is_ok());
    }

    #[tokio::test]
    async fn test_missing_path_reports_false() {
        let protector = ModeBitProtector::new();
        assert!(!protector.unprotect_folder(Path::new("/nonexistent/vault")).await);
    }

    #[tokio::test]
    async fn test_branch_roundtrip() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        let file = sub.join("a.txt");
        std::fs::write(&file, b"x").unwrap();
        let protector = ModeBitProtector::new();

        assert!(protector.protect_branch(dir.path(), ProtectionType::Ancestor).await);
        assert_eq!(mode_of(dir.path()), DIR_PROTECTED);
        assert_eq!(mode_of(&sub), DIR_PROTECTED);
        assert_eq!(mode_of(&file), FILE_PROTECTED);

        assert!(protector.unprotect_branch(dir.path()).await);
        assert_eq!(mode_of(&sub), DIR_OPEN);
        assert_eq!(mode_of(&file), FILE_OPEN);
    }

    #[tokio::test]
    async fn test_ancestor_with_files_covers_direct_children() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();
        let protector = ModeBitProtector::new();

        assert!(
            protector
                .protect_folder(dir.path(), ProtectionType::AncestorWithFiles)
                .await
        );
        assert_eq!(mode_of(&file), FILE_PROTECTED);

        // Restore so TempDir cleanup can remove everything.
        assert!(protector.unprotect_branch(dir.path()).await);
    }
}
