//! Copying source trees and loose files into the distribution.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// True when the entry's file name is one of the excluded names.
pub fn is_excluded(path: &Path, exclude: &[&str]) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| exclude.iter().any(|pattern| name.contains(pattern)))
}

/// Mirror the contents of `src` under `dst`.
///
/// Existing files in `dst` are overwritten. Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path, exclude: &[&str]) -> Result<usize> {
    debug!("copying {} ===> {}", src.display(), dst.display());
    std::fs::create_dir_all(dst).with_context(|| format!("Failed to create {}", dst.display()))?;

    let keep = |e: &DirEntry| e.depth() == 0 || !is_excluded(e.path(), exclude);
    let mut copied = 0;
    for entry in WalkDir::new(src).into_iter().filter_entry(keep) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let rel = entry.path().strip_prefix(src)?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target).with_context(|| {
                format!("Failed to copy {} to {}", entry.path().display(), target.display())
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Copy individual files into `dir`, keeping their names.
pub fn copy_files(files: &[PathBuf], dir: &Path) -> Result<()> {
    for file in files {
        let name = file
            .file_name()
            .with_context(|| format!("Invalid path: {}", file.display()))?;
        let dest = dir.join(name);
        debug!("  {} ===> {}", file.display(), dir.display());
        std::fs::copy(file, &dest)
            .with_context(|| format!("Failed to copy {} to {}", file.display(), dest.display()))?;
    }
    Ok(())
}

/// Copy one file to an explicit destination path.
pub fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    debug!("  copying {} ===> {}", src.display(), dest.display());
    std::fs::copy(src, dest)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dest.display()))?;
    Ok(())
}
