//! Preflight check for the external tools a release run drives.

use anyhow::{bail, Result};

use super::config::{DistConfig, LineEndingMode};
use super::lineend;

/// Programs that must be on PATH for `config`.
pub fn required_tools(config: &DistConfig) -> Vec<String> {
    let mut tools = vec![
        config.pymake.program.clone(),
        config.generator.program.clone(),
        "pdflatex".to_string(),
        "bibtex".to_string(),
    ];
    if config.line_endings == LineEndingMode::External {
        tools.push(lineend::converter(config.platform).to_string());
    }
    tools.dedup();
    tools
}

/// Names from `tools` that `which` cannot find.
pub fn missing_tools(tools: &[String]) -> Vec<&str> {
    tools
        .iter()
        .filter(|tool| which::which(tool.as_str()).is_err())
        .map(String::as_str)
        .collect()
}

pub fn run(config: &DistConfig) -> Result<()> {
    let tools = required_tools(config);
    let missing = missing_tools(&tools);
    let mut ok = missing.is_empty();
    for tool in &tools {
        if missing.contains(&tool.as_str()) {
            eprintln!("[FAIL] missing `{tool}` in PATH");
        } else {
            eprintln!("[OK] {tool}");
        }
    }

    if config.line_endings == LineEndingMode::Auto {
        let converter = lineend::converter(config.platform);
        if which::which(converter).is_ok() {
            eprintln!("[OK] {converter}");
        } else {
            eprintln!("[OK] {converter} not found, line endings converted in-process");
        }
    }

    for (label, dir) in [
        ("test models", &config.examples_source),
        ("docs checkout", &config.docs_checkout),
    ] {
        if dir.is_dir() {
            eprintln!("[OK] {label}: {}", dir.display());
        } else {
            eprintln!("[FAIL] missing {label}: {}", dir.display());
            ok = false;
        }
    }

    if !ok {
        bail!("doctor checks failed");
    }
    Ok(())
}
