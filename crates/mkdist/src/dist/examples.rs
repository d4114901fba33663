//! Example models shipped with the distribution.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use super::config::TargetPlatform;
use super::copy;

/// File name and contents of the run script for `platform`.
pub fn run_script(platform: TargetPlatform) -> (&'static str, &'static str) {
    if platform.is_windows() {
        ("run.bat", "@echo off\r\n..\\..\\bin\\mf6.exe\r\npause\r\n")
    } else {
        ("run.sh", "#!/bin/sh\n../../bin/mf6\n")
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)
        .with_context(|| format!("Failed to set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Copy every `<prefix>*` model directory from `source` into `dest` and
/// drop a run script into each. Returns the example names, sorted.
pub fn stage(
    source: &Path,
    dest: &Path,
    prefix: &str,
    platform: TargetPlatform,
    exclude: &[&str],
) -> Result<Vec<String>> {
    info!("Setting up examples from {}", source.display());
    let mut names = Vec::new();
    let entries =
        std::fs::read_dir(source).with_context(|| format!("Failed to read {}", source.display()))?;
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str().filter(|n| n.starts_with(prefix)) {
            names.push(name.to_string());
        }
    }
    names.sort();

    let (script, body) = run_script(platform);
    for name in &names {
        let target = dest.join(name);
        copy::copy_tree(&source.join(name), &target, exclude)?;
        let script_path = target.join(script);
        std::fs::write(&script_path, body)
            .with_context(|| format!("Failed to write {}", script_path.display()))?;
        if !platform.is_windows() {
            make_executable(&script_path)?;
        }
        debug!("  staged example {name}");
    }
    info!("  {} example(s) staged", names.len());
    Ok(names)
}
