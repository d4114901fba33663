//! Line-ending normalization of the assembled distribution tree.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::config::{LineEndingMode, TargetPlatform};
use super::process::{run_checked, CommandLine, CommandRunner};

/// Files handed to one converter invocation.
const BATCH: usize = 200;

/// Converter program for `platform`.
pub fn converter(platform: TargetPlatform) -> &'static str {
    if platform.is_windows() {
        "unix2dos"
    } else {
        "dos2unix"
    }
}

/// Rewrite `bytes` with CRLF (`crlf`) or LF terminators.
///
/// Returns `None` for binary content (any NUL byte) and for text that is
/// already in the requested form.
pub fn convert(bytes: &[u8], crlf: bool) -> Option<Vec<u8>> {
    if bytes.contains(&0) {
        return None;
    }
    let mut out = Vec::with_capacity(bytes.len() + bytes.len() / 32);
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                if crlf {
                    out.push(b'\r');
                }
                out.push(b'\n');
                i += 2;
                continue;
            }
            b'\n' => {
                if crlf {
                    out.push(b'\r');
                }
                out.push(b'\n');
            }
            b => out.push(b),
        }
        i += 1;
    }
    (out != bytes).then_some(out)
}

fn files_under(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Convert in-process. Returns how many files were rewritten.
pub fn normalize_native(root: &Path, platform: TargetPlatform) -> Result<usize> {
    let crlf = platform.is_windows();
    let mut rewritten = 0;
    for path in files_under(root)? {
        let bytes =
            std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        if let Some(converted) = convert(&bytes, crlf) {
            std::fs::write(&path, converted)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            debug!("  converted {}", path.display());
            rewritten += 1;
        }
    }
    Ok(rewritten)
}

/// Convert with `program`, passing the file list in batches.
pub fn normalize_external(
    root: &Path,
    program: &str,
    runner: &dyn CommandRunner,
    timeout: Duration,
) -> Result<usize> {
    let files = files_under(root)?;
    for batch in files.chunks(BATCH) {
        let cmd = CommandLine::new(program)
            .arg("-q")
            .args(batch.iter().map(|p| p.display().to_string()));
        run_checked(runner, &cmd, root, timeout)?;
    }
    Ok(files.len())
}

/// Normalize every file under `root` for `platform`.
pub fn normalize(
    root: &Path,
    platform: TargetPlatform,
    mode: LineEndingMode,
    runner: &dyn CommandRunner,
    timeout: Duration,
) -> Result<usize> {
    info!("Converting line endings...");
    let program = converter(platform);
    match mode {
        LineEndingMode::Native => normalize_native(root, platform),
        LineEndingMode::External => normalize_external(root, program, runner, timeout),
        LineEndingMode::Auto => match which::which(program) {
            Ok(path) => {
                debug!("using {}", path.display());
                normalize_external(root, program, runner, timeout)
            }
            Err(_) => {
                warn!("{program} not found on PATH, converting in-process");
                normalize_native(root, platform)
            }
        },
    }
}
