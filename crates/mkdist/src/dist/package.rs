//! Zip archive of the finished distribution.

use anyhow::{anyhow, Context, Result};
use chrono::{Datelike, NaiveDate};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::copy::is_excluded;

/// Entry timestamp for a release date such as `January 2020`: the first
/// day of that month. `None` when the date does not parse.
pub fn release_timestamp(release_date: &str) -> Option<zip::DateTime> {
    let date = NaiveDate::parse_from_str(&format!("01 {}", release_date.trim()), "%d %B %Y").ok()?;
    let year = u16::try_from(date.year()).ok()?;
    let month = u8::try_from(date.month()).ok()?;
    zip::DateTime::from_date_and_time(year, month, 1, 0, 0, 0).ok()
}

/// Archive entry name of `path` relative to `base`, `/`-separated.
///
/// Names that are not UTF-8 are rejected rather than mangled, since lossy
/// conversion can map two files onto one entry.
fn entry_name(path: &Path, base: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(base)
        .with_context(|| format!("{} is not under {}", path.display(), base.display()))?;
    let parts = rel
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<&str>>>()
        .ok_or_else(|| anyhow!("File name is not valid UTF-8: {}", path.display()))?;
    Ok(parts.join("/"))
}

/// Files under `tree`, sorted, without excluded names.
fn collect(tree: &Path, exclude: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(tree).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", tree.display()))?;
        if entry.file_type().is_file() && !is_excluded(entry.path(), exclude) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Sibling of `archive` that is written first and renamed into place.
fn partial_path(archive: &Path) -> PathBuf {
    let mut name = archive.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}

/// Write every file under `tree` into `archive`, naming entries relative
/// to `base` so they keep the tree's own directory as prefix.
///
/// An existing archive is replaced. The archive only appears under its
/// final name once it is complete; on failure nothing is left behind.
pub fn archive(
    tree: &Path,
    base: &Path,
    archive: &Path,
    release_date: &str,
    exclude: &[&str],
) -> Result<PathBuf> {
    if archive.exists() {
        info!("Removing existing file: {}", archive.display());
        fs::remove_file(archive)
            .with_context(|| format!("Failed to remove {}", archive.display()))?;
    }

    let mut files = Vec::new();
    for path in collect(tree, exclude)? {
        files.push((entry_name(&path, base)?, path));
    }

    info!("Creating zipped file: {}", archive.display());
    let partial = partial_path(archive);
    if let Err(e) = write_zip(&partial, &files, release_date) {
        if partial.exists() {
            let _ = fs::remove_file(&partial);
        }
        return Err(e);
    }
    fs::rename(&partial, archive)
        .with_context(|| format!("Failed to move archive into {}", archive.display()))?;
    Ok(archive.to_path_buf())
}

fn write_zip(dest: &Path, files: &[(String, PathBuf)], release_date: &str) -> Result<()> {
    let mut options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    match release_timestamp(release_date) {
        Some(stamp) => options = options.last_modified_time(stamp),
        None => {
            warn!("release date '{release_date}' does not parse, using default entry timestamps");
        }
    }

    let file = File::create(dest).with_context(|| format!("Failed to create {}", dest.display()))?;
    let mut zip = ZipWriter::new(file);
    for (name, path) in files {
        debug!("  Adding to zip: ==> {name}");
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("Failed to add {name}"))?;
        let mut src =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        io::copy(&mut src, &mut zip)
            .with_context(|| format!("Failed to compress {}", path.display()))?;
    }
    zip.finish().context("Failed to finish archive")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries(path: &Path) -> Vec<(String, Option<zip::DateTime>)> {
        let mut zip = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..zip.len())
            .map(|i| {
                let entry = zip.by_index(i).unwrap();
                (entry.name().to_string(), entry.last_modified())
            })
            .collect()
    }

    fn tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("mf6beta0.9.00");
        std::fs::create_dir_all(root.join("bin")).unwrap();
        std::fs::create_dir_all(root.join("doc")).unwrap();
        std::fs::write(root.join("bin/mf6.exe"), "MZ").unwrap();
        std::fs::write(root.join("doc/mf6io.pdf"), "%PDF").unwrap();
        std::fs::write(root.join("doc/.DS_Store"), "junk").unwrap();
        tmp
    }

    #[test]
    fn test_release_timestamp() {
        let stamp = release_timestamp("January 2020").unwrap();
        assert_eq!((stamp.year(), stamp.month(), stamp.day()), (2020, 1, 1));
        assert!(release_timestamp("sometime soon").is_none());
    }

    #[test]
    fn test_archive_skips_metadata_and_keeps_prefix() {
        let tmp = tree();
        let root = tmp.path().join("mf6beta0.9.00");
        let zip_path = tmp.path().join("mf6beta0.9.00.zip");

        archive(&root, tmp.path(), &zip_path, "January 2020", &[".DS_Store"]).unwrap();

        let names: Vec<String> = entries(&zip_path).into_iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            ["mf6beta0.9.00/bin/mf6.exe", "mf6beta0.9.00/doc/mf6io.pdf"]
        );
        assert!(!partial_path(&zip_path).exists());
    }

    #[test]
    fn test_rerun_replaces_archive_with_identical_entries() {
        let tmp = tree();
        let root = tmp.path().join("mf6beta0.9.00");
        let zip_path = tmp.path().join("mf6beta0.9.00.zip");

        archive(&root, tmp.path(), &zip_path, "January 2020", &[".DS_Store"]).unwrap();
        let first = entries(&zip_path);
        archive(&root, tmp.path(), &zip_path, "January 2020", &[".DS_Store"]).unwrap();

        assert_eq!(entries(&zip_path), first);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_name_fails_without_leaving_archive() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = tree();
        let root = tmp.path().join("mf6beta0.9.00");
        for raw in [&b"b\xfe"[..], &b"b\xff"[..]] {
            std::fs::write(root.join(OsStr::from_bytes(raw)), "x").unwrap();
        }
        let zip_path = tmp.path().join("mf6beta0.9.00.zip");
        std::fs::write(&zip_path, "previous run").unwrap();

        let err = archive(&root, tmp.path(), &zip_path, "January 2020", &[]).unwrap_err();

        assert!(err.to_string().contains("not valid UTF-8"), "{err:#}");
        assert!(!zip_path.exists());
        assert!(!partial_path(&zip_path).exists());
    }
}
