//! Published reports downloaded into the distribution.

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use super::error::DistError;

/// Retrieves one URL into a directory and returns the local file.
pub trait AssetFetcher {
    fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf>;
}

impl<F> AssetFetcher for F
where
    F: Fn(&str, &Path) -> Result<PathBuf>,
{
    fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        self(url, dest_dir)
    }
}

/// Last path segment of `url`, without query or fragment.
pub fn remote_file_name(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next()?;
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Unpack `archive` next to itself. The archive is kept.
pub fn extract_zip(archive: &Path, dest_dir: &Path) -> Result<usize> {
    let file =
        File::open(archive).with_context(|| format!("Failed to open {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read {}", archive.display()))?;
    let entries = zip.len();
    zip.extract(dest_dir)
        .with_context(|| format!("Failed to extract {}", archive.display()))?;
    Ok(entries)
}

/// Blocking HTTP downloads.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, verify_certificates: bool) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_certificates)
            .user_agent(concat!("mkdist/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client })
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        let download = |reason: String| DistError::Download {
            url: url.to_string(),
            reason,
        };
        let name =
            remote_file_name(url).ok_or_else(|| download("no file name in URL".to_string()))?;

        let request = self.client.get(url);
        let response = request.send().map_err(|e| download(e.to_string()))?;
        if !response.status().is_success() {
            return Err(download(format!("HTTP {}", response.status())).into());
        }
        let body = response.bytes().map_err(|e| download(e.to_string()))?;

        let dest = dest_dir.join(name);
        let mut file =
            File::create(&dest).with_context(|| format!("Failed to create {}", dest.display()))?;
        file.write_all(&body)
            .with_context(|| format!("Failed to write {}", dest.display()))?;
        Ok(dest)
    }
}

/// Fetch every URL into `dest_dir`, unpacking zip downloads in place.
pub fn fetch_all(
    fetcher: &dyn AssetFetcher,
    urls: &[&str],
    dest_dir: &Path,
) -> Result<Vec<PathBuf>> {
    info!("Downloading published reports for inclusion in distribution");
    let mut fetched = Vec::with_capacity(urls.len());
    for url in urls {
        info!("  downloading {url}");
        let path = fetcher.fetch(url, dest_dir)?;
        let ext = path.extension().unwrap_or_default();
        if ext.eq_ignore_ascii_case("zip") {
            let entries = extract_zip(&path, dest_dir)?;
            info!("  extracted {entries} file(s) from {}", path.display());
        }
        fetched.push(path);
    }
    Ok(fetched)
}
