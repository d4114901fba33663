//! Pipeline failure taxonomy.
//!
//! Everything here is fatal for the run. Tolerated failures (stale file
//! deletion) never become a `DistError`; they are logged and skipped.

use std::path::PathBuf;
use thiserror::Error;

use super::process::{CommandLine, ExitClass};

#[derive(Debug, Error)]
pub enum DistError {
    #[error("version marker '{marker}' not found in {}", path.display())]
    VersionNotFound { marker: &'static str, path: PathBuf },

    #[error("distribution has no '{0}' subdirectory")]
    UnknownSubdir(String),

    #[error("did not build target {target}: {} does not exist", path.display())]
    BuildFailed { target: String, path: PathBuf },

    #[error("build descriptor for {target} was not generated in {}", dir.display())]
    DescriptorMissing { target: String, dir: PathBuf },

    #[error("{}\nERROR: could not run `{command}` ({})", output.trim_end(), class.describe())]
    CommandFailed {
        command: CommandLine,
        class: ExitClass,
        output: String,
    },

    #[error("{} TeX file(s) are missing. Missing files:\n{}", missing.len(), numbered(missing))]
    MissingDescriptions { missing: Vec<String> },

    #[error("could not find {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("stage '{stage}' requires {}, which does not exist", path.display())]
    Precondition { stage: String, path: PathBuf },

    #[error("stage '{stage}' did not produce {}", path.display())]
    Postcondition { stage: String, path: PathBuf },

    #[error("could not replace {what} in {}", path.display())]
    StampFailed { what: &'static str, path: PathBuf },

    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },
}

fn numbered(names: &[String]) -> String {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| format!("  {:3} {name}.tex\n", i + 1))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_descriptions_lists_every_name() {
        let err = DistError::MissingDescriptions {
            missing: vec!["gwf-dis-desc".to_string(), "gwf-npf-desc".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 TeX file(s) are missing."));
        assert!(msg.contains("  1 gwf-dis-desc.tex"));
        assert!(msg.contains("  2 gwf-npf-desc.tex"));
    }

    #[test]
    fn test_command_failed_names_command_and_class() {
        let err = DistError::CommandFailed {
            command: CommandLine::new("bibtex").arg("mf6io.aux"),
            class: ExitClass::TimedOut,
            output: "partial\n".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("`bibtex mf6io.aux`"));
        assert!(msg.contains("timed out"));
        assert!(msg.starts_with("partial"));
    }
}
