//! Directory staging and file removal.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Whether a failed removal stops the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Missing or locked files are logged and skipped.
    AllowFailure,
    /// The first failure is returned.
    Strict,
}

/// Clobber `root` and recreate it with the given subdirectories.
///
/// Returns subdirectory name -> full path.
pub fn setup(root: &Path, subdirs: &[&str]) -> Result<BTreeMap<String, PathBuf>> {
    if root.exists() {
        info!("Clobbering destination directory: {}", root.display());
        std::fs::remove_dir_all(root)
            .with_context(|| format!("Failed to remove {}", root.display()))?;
    }
    std::fs::create_dir_all(root).with_context(|| format!("Failed to create {}", root.display()))?;

    let mut folders = BTreeMap::new();
    for name in subdirs {
        let path = root.join(name);
        debug!("  creating ==> {}", path.display());
        std::fs::create_dir(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        folders.insert((*name).to_string(), path);
    }
    Ok(folders)
}

/// Remove `files` (names relative to `dir`).
///
/// Returns how many files were actually removed.
pub fn delete_files<S: AsRef<str>>(files: &[S], dir: &Path, policy: DeletePolicy) -> Result<usize> {
    let mut removed = 0;
    for file in files {
        let path = dir.join(file.as_ref());
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!("removed {}", path.display());
                removed += 1;
            }
            Err(e) if policy == DeletePolicy::AllowFailure => {
                warn!("could not remove {}: {e}", path.display());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to remove {}", path.display()));
            }
        }
    }
    Ok(removed)
}

/// Remove every regular file directly inside `dir`.
pub fn clear_files(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_file() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SUBDIRS: &[&str] = &["bin", "doc", "make"];

    fn tree(root: &Path) -> Vec<String> {
        let mut names: Vec<String> = walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(Result::ok)
            .map(|e| e.path().strip_prefix(root).unwrap().display().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_setup_creates_subdirs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("mf6.1.0");

        let folders = setup(&root, SUBDIRS).unwrap();

        assert_eq!(folders.len(), 3);
        assert_eq!(folders["bin"], root.join("bin"));
        assert!(root.join("doc").is_dir());
    }

    #[test]
    fn test_setup_twice_clobbers() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("mf6.1.0");

        setup(&root, SUBDIRS).unwrap();
        let first = tree(&root);
        std::fs::write(root.join("bin/mf6.exe"), "stale").unwrap();
        std::fs::create_dir(root.join("leftover")).unwrap();

        setup(&root, SUBDIRS).unwrap();

        assert_eq!(tree(&root), first);
    }

    #[test]
    fn test_delete_files_policies() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("mf6io.aux"), "").unwrap();

        let files = ["mf6io.pdf", "mf6io.aux"];
        let removed = delete_files(&files, tmp.path(), DeletePolicy::AllowFailure).unwrap();
        assert_eq!(removed, 1);
        assert!(!tmp.path().join("mf6io.aux").exists());

        assert!(delete_files(&files, tmp.path(), DeletePolicy::Strict).is_err());
    }

    #[test]
    fn test_clear_files_keeps_directories() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("a-desc.tex"), "").unwrap();
        std::fs::write(tmp.path().join("b-desc.tex"), "").unwrap();
        std::fs::create_dir(tmp.path().join("keep")).unwrap();

        assert_eq!(clear_files(tmp.path()).unwrap(), 2);
        assert!(tmp.path().join("keep").is_dir());
    }
}
