//! Generated release-notes fragments: the staged example list and the
//! distribution folder structure.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::dist::error::DistError;
use crate::dist::process::{run_checked, CommandLine, CommandRunner};
use crate::dist::stage::{self, DeletePolicy};

pub const EXAMPLE_ITEMS: &str = "example_items.tex";
pub const EXAMPLE_TABLE: &str = "example_table.tex";
pub const FOLDER_STRUCT: &str = "folder_struct.tex";
/// Every file [`update`] writes.
pub const FRAGMENTS: [&str; 3] = [EXAMPLE_ITEMS, EXAMPLE_TABLE, FOLDER_STRUCT];

fn escape(name: &str) -> String {
    name.replace('_', "\\_")
}

/// One `\item` per example.
pub fn example_items(examples: &[String]) -> String {
    examples
        .iter()
        .map(|name| format!("\\item \\texttt{{{}}}\n", escape(name)))
        .collect()
}

/// Numbered table rows, one per example.
pub fn example_table(examples: &[String]) -> String {
    let mut tex = String::new();
    for (i, name) in examples.iter().enumerate() {
        tex.push_str(&format!("{} & \\texttt{{{}}} \\\\\n", i + 1, escape(name)));
        tex.push_str("\\hline\n");
    }
    tex
}

/// Rewrite the three fragments in the release notes directory.
pub fn update(
    notes_dir: &Path,
    examples: &[String],
    folder_struct: &CommandLine,
    runner: &dyn CommandRunner,
    timeout: Duration,
) -> Result<Vec<PathBuf>> {
    info!("Updating release notes fragments");
    stage::delete_files(&FRAGMENTS, notes_dir, DeletePolicy::AllowFailure)?;

    for (name, body) in [
        (EXAMPLE_ITEMS, example_items(examples)),
        (EXAMPLE_TABLE, example_table(examples)),
    ] {
        let path = notes_dir.join(name);
        std::fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    run_checked(runner, folder_struct, notes_dir, timeout)?;

    let paths: Vec<PathBuf> = FRAGMENTS.iter().map(|f| notes_dir.join(f)).collect();
    if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
        return Err(DistError::MissingArtifact(missing.clone()).into());
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dist::process::ProcessResult;
    use tempfile::TempDir;

    fn names() -> Vec<String> {
        vec!["ex01-twri".to_string(), "ex02_tidal".to_string()]
    }

    #[test]
    fn test_fragments() {
        assert_eq!(
            example_items(&names()),
            "\\item \\texttt{ex01-twri}\n\\item \\texttt{ex02\\_tidal}\n"
        );
        assert!(example_table(&names()).starts_with("1 & \\texttt{ex01-twri} \\\\\n\\hline\n2 & "));
    }

    #[test]
    fn test_update_requires_folder_structure() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(EXAMPLE_ITEMS), "stale").unwrap();
        let cmd = CommandLine::new("python").arg("mk_folder_struct.py");
        let silent = |_: &CommandLine, _: &Path, t: Duration| ProcessResult::success("", t);

        let err = update(tmp.path(), &names(), &cmd, &silent, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DistError>(),
            Some(DistError::MissingArtifact(path)) if path.ends_with(FOLDER_STRUCT)
        ));

        let writer = |_: &CommandLine, cwd: &Path, t: Duration| {
            std::fs::write(cwd.join(FOLDER_STRUCT), "\\dirtree{}").unwrap();
            ProcessResult::success("", t)
        };
        let written = update(tmp.path(), &names(), &cmd, &writer, Duration::from_secs(1)).unwrap();
        assert_eq!(written.len(), 3);
        let items = std::fs::read_to_string(tmp.path().join(EXAMPLE_ITEMS)).unwrap();
        assert!(items.contains("ex01-twri"));
    }
}
