//! Regenerate the input/output description files from the `.dfn` definitions.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::dist::error::DistError;
use crate::dist::process::{run_checked, CommandLine, CommandRunner};
use crate::dist::stage;

/// Definitions shared between packages; they have no description of their own.
const SHARED_MARKER: &str = "common";

/// File stems in `dir` whose extension contains `ext`.
fn stems(dir: &Path, ext: &str) -> Result<BTreeSet<String>> {
    let mut found = BTreeSet::new();
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.contains(ext));
        if let (true, Some(stem)) = (matches, path.file_stem().and_then(|s| s.to_str())) {
            found.insert(stem.to_string());
        }
    }
    Ok(found)
}

/// `<name>-desc` for every definition without a generated description.
pub fn missing_descriptions(dfn_dir: &Path, tex_dir: &Path) -> Result<Vec<String>> {
    let definitions = stems(dfn_dir, "dfn")?;
    let generated = stems(tex_dir, "tex")?;
    Ok(definitions
        .iter()
        .filter(|name| !name.contains(SHARED_MARKER))
        .map(|name| format!("{name}-desc"))
        .filter(|desc| !generated.contains(desc))
        .collect())
}

/// Clear `tex/`, run the generator in `workdir`, and check every definition
/// got its description.
pub fn rebuild(
    workdir: &Path,
    generator: &CommandLine,
    runner: &dyn CommandRunner,
    timeout: Duration,
) -> Result<()> {
    info!("Rebuilding TeX files from definition files");
    let tex_dir = workdir.join("tex");
    let cleared = stage::clear_files(&tex_dir)?;
    info!("  removed {cleared} generated file(s)");

    run_checked(runner, generator, workdir, timeout)?;

    let missing = missing_descriptions(&workdir.join("dfn"), &tex_dir)?;
    if !missing.is_empty() {
        return Err(DistError::MissingDescriptions { missing }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dist::process::ProcessResult;
    use tempfile::TempDir;

    const DEFINITIONS: &[&str] = &["gwf-dis", "gwf-npf", "gwf-chd", "sim-nam", "utl-common"];

    fn definitions_dir() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("dfn")).unwrap();
        std::fs::create_dir_all(tmp.path().join("tex")).unwrap();
        for name in DEFINITIONS {
            std::fs::write(tmp.path().join(format!("dfn/{name}.dfn")), "block options").unwrap();
        }
        std::fs::write(tmp.path().join("tex/stale-desc.tex"), "old").unwrap();
        tmp
    }

    /// Writes a description for every definition except `skip`.
    fn generator_skipping(
        skip: &'static str,
    ) -> impl Fn(&CommandLine, &Path, Duration) -> ProcessResult {
        move |_: &CommandLine, cwd: &Path, t: Duration| {
            for name in DEFINITIONS.iter().filter(|n| **n != skip) {
                std::fs::write(cwd.join(format!("tex/{name}-desc.tex")), "").unwrap();
            }
            ProcessResult::success("", t)
        }
    }

    #[test]
    fn test_reports_exactly_the_missing_description() {
        let tmp = definitions_dir();
        let generator = CommandLine::new("python").arg("mf6ivar.py");
        let runner = generator_skipping("gwf-npf");

        let err = rebuild(tmp.path(), &generator, &runner, Duration::from_secs(1)).unwrap_err();

        match err.downcast_ref::<DistError>() {
            Some(DistError::MissingDescriptions { missing }) => {
                assert_eq!(missing, &vec!["gwf-npf-desc".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!tmp.path().join("tex/stale-desc.tex").exists());
    }

    #[test]
    fn test_shared_definitions_need_no_description() {
        let tmp = definitions_dir();
        let generator = CommandLine::new("python").arg("mf6ivar.py");
        let runner = generator_skipping("utl-common");

        rebuild(tmp.path(), &generator, &runner, Duration::from_secs(1)).unwrap();
        assert!(tmp.path().join("tex/gwf-dis-desc.tex").is_file());
    }

    #[test]
    fn test_generator_crash_is_fatal() {
        let tmp = definitions_dir();
        let generator = CommandLine::new("python").arg("mf6ivar.py");
        let runner =
            |_: &CommandLine, _: &Path, t: Duration| ProcessResult::errored("Traceback", t);

        let err = rebuild(tmp.path(), &generator, &runner, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DistError>(),
            Some(DistError::CommandFailed { .. })
        ));
    }
}
