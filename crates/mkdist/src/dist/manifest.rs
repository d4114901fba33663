//! The versioned distribution tree every stage writes into.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::config::TargetPlatform;
use super::error::DistError;

/// Built once after the version is resolved; read-only afterwards.
#[derive(Clone, Debug, Serialize)]
pub struct DistributionManifest {
    pub version: String,
    pub release_date: String,
    pub platform: TargetPlatform,
    pub root: PathBuf,
    subdirs: BTreeMap<String, PathBuf>,
}

impl DistributionManifest {
    pub fn new(
        version: String,
        release_date: String,
        platform: TargetPlatform,
        root: PathBuf,
        subdirs: BTreeMap<String, PathBuf>,
    ) -> Self {
        Self {
            version,
            release_date,
            platform,
            root,
            subdirs,
        }
    }

    /// Lay out the subdirectory map for `root` without touching disk.
    pub fn planned(
        version: String,
        release_date: String,
        platform: TargetPlatform,
        root: PathBuf,
        names: &[&str],
    ) -> Self {
        let subdirs = names
            .iter()
            .map(|name| ((*name).to_string(), root.join(name)))
            .collect();
        Self::new(version, release_date, platform, root, subdirs)
    }

    /// Full path of a named subdirectory.
    pub fn dir(&self, name: &str) -> Result<&Path, DistError> {
        self.subdirs
            .get(name)
            .map(PathBuf::as_path)
            .ok_or_else(|| DistError::UnknownSubdir(name.to_string()))
    }

    pub fn subdirs(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.subdirs.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    /// `<version><suffix>.zip`
    pub fn archive_name(&self) -> String {
        format!("{}{}.zip", self.version, self.platform.archive_suffix())
    }
}
