//! Release version lookup and source stamping.
//!
//! The version lives in `doc/version.tex`:
//!
//! ```text
//! \newcommand{\modflowversion}{mf6beta0.9.00}
//! \newcommand{\modflowdate}{January 2020}
//! ```

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use super::error::DistError;

pub const VERSION_MARKER: &str = "modflowversion";
pub const DATE_MARKER: &str = "modflowdate";

const VERSION_LINE: &str = "character(len=40), parameter :: VERSION";
const DEVELOP_LINE: &str = "integer(I4B), parameter :: IDEVELOPMODE";

/// Version and release date, either of which may be absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DistributionInfo {
    pub version: Option<String>,
    pub date: Option<String>,
}

impl DistributionInfo {
    /// Both values, or the marker that is missing.
    pub fn require(self, path: &Path) -> Result<(String, String), DistError> {
        let version = self.version.ok_or_else(|| DistError::VersionNotFound {
            marker: VERSION_MARKER,
            path: path.to_path_buf(),
        })?;
        let date = self.date.ok_or_else(|| DistError::VersionNotFound {
            marker: DATE_MARKER,
            path: path.to_path_buf(),
        })?;
        Ok((version, date))
    }
}

/// Text between the last `{` and the last `}` of a line.
///
/// Positional only: an unrelated brace pair later on the line wins.
fn last_braced(line: &str) -> Option<&str> {
    let start = line.rfind('{')? + 1;
    let stop = line.rfind('}')?;
    (start < stop).then(|| &line[start..stop])
}

/// Scan `text` for the version and date markers.
pub fn parse(text: &str) -> DistributionInfo {
    let mut info = DistributionInfo::default();
    for line in text.lines() {
        if line.contains(VERSION_MARKER) {
            if let Some(value) = last_braced(line) {
                info.version = Some(value.to_string());
            }
        }
        if line.contains(DATE_MARKER) {
            if let Some(value) = last_braced(line) {
                info.date = Some(value.to_string());
            }
        }
        if info.version.is_some() && info.date.is_some() {
            break;
        }
    }
    info
}

/// Read version and release date from a version document.
pub fn resolve(path: &Path) -> Result<(String, String)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let (version, date) = parse(&text).require(path)?;
    info!(%version, %date, "resolved distribution version");
    Ok((version, date))
}

/// Rewrite the Fortran version module for a release build: set the
/// version string and switch develop mode off.
pub fn stamp(module: &Path, version: &str) -> Result<()> {
    let text = std::fs::read_to_string(module)
        .with_context(|| format!("Failed to read {}", module.display()))?;

    let mut found_version = false;
    let mut found_develop = false;
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let line = if line.contains(VERSION_LINE) {
            found_version = true;
            format!("{VERSION_LINE} = '{version}'")
        } else if line.contains(DEVELOP_LINE) {
            found_develop = true;
            format!("{DEVELOP_LINE} = 0")
        } else {
            line.to_string()
        };
        out.push_str(line.trim());
        out.push('\n');
    }

    if !found_version {
        return Err(DistError::StampFailed {
            what: "VERSION",
            path: module.to_path_buf(),
        }
        .into());
    }
    if !found_develop {
        return Err(DistError::StampFailed {
            what: "IDEVELOPMODE",
            path: module.to_path_buf(),
        }
        .into());
    }

    std::fs::write(module, out).with_context(|| format!("Failed to write {}", module.display()))?;
    info!("stamped {} with {version}", module.display());
    Ok(())
}
