//! Scoped change of the process working directory.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Switches the process into a directory and switches back when dropped,
/// whether the scope ends normally, with `?`, or by unwinding.
#[must_use = "the previous directory is restored as soon as the guard is dropped"]
pub struct CurrentDirGuard {
    previous: PathBuf,
}

impl CurrentDirGuard {
    pub fn enter(dir: &Path) -> Result<Self> {
        let previous = std::env::current_dir().context("Failed to read current directory")?;
        std::env::set_current_dir(dir)
            .with_context(|| format!("Failed to enter {}", dir.display()))?;
        debug!(from = %previous.display(), to = %dir.display(), "entered directory");
        Ok(Self { previous })
    }

    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

impl Drop for CurrentDirGuard {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            error!(dir = %self.previous.display(), "could not restore working directory: {e}");
        }
    }
}

/// Run `action` with `dir` as the working directory.
pub fn with_current_dir<T>(dir: &Path, action: impl FnOnce() -> Result<T>) -> Result<T> {
    let _guard = CurrentDirGuard::enter(dir)?;
    action()
}
