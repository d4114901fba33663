//! Typesetting: pdflatex, bibtex, pdflatex, pdflatex.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::dist::config::DocSpec;
use crate::dist::copy;
use crate::dist::error::DistError;
use crate::dist::process::{run_checked, CommandLine, CommandRunner};

/// One document and the passes that render it.
#[derive(Clone, Debug)]
pub struct DocumentJob {
    pub source: String,
    pub workdir: PathBuf,
    pub passes: Vec<CommandLine>,
}

impl DocumentJob {
    pub fn new(doc: &DocSpec) -> Self {
        let latex = CommandLine::new("pdflatex").arg(doc.tex);
        Self {
            source: doc.tex.to_string(),
            workdir: doc.dir.clone(),
            passes: vec![
                latex.clone(),
                CommandLine::new("bibtex").arg(format!("{}.aux", doc.stem())),
                latex.clone(),
                latex,
            ],
        }
    }

    /// The rendered output: the source's base name with `.pdf`.
    pub fn output(&self) -> PathBuf {
        let pdf = Path::new(&self.source).with_extension("pdf");
        self.workdir.join(pdf)
    }

    /// Run every pass in order; the first failing pass stops the job.
    pub fn run(&self, runner: &dyn CommandRunner, timeout: Duration) -> Result<PathBuf> {
        info!("Typesetting {}", self.source);
        for pass in &self.passes {
            run_checked(runner, pass, &self.workdir, timeout)?;
        }
        let pdf = self.output();
        if !pdf.is_file() {
            return Err(DistError::MissingArtifact(pdf).into());
        }
        Ok(pdf)
    }
}

/// Share `version.tex` with the docs checkout, then typeset every document.
pub fn build_all(
    documents: &[DocSpec],
    version_tex: &Path,
    docs_checkout: &Path,
    runner: &dyn CommandRunner,
    timeout: Duration,
) -> Result<Vec<PathBuf>> {
    info!("Building latex files");
    let name = version_tex
        .file_name()
        .with_context(|| format!("Invalid path: {}", version_tex.display()))?;
    copy::copy_file(version_tex, &docs_checkout.join(name))?;

    documents
        .iter()
        .map(|doc| DocumentJob::new(doc).run(runner, timeout))
        .collect()
}
