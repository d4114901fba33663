//! Documentation pipeline.
//!
//! Structure:
//! - `regenerate` - rebuild the `-desc.tex` files from the definition files
//! - `transcripts` - capture mf6 console output as listings
//! - `release_info` - example lists and folder structure for the release notes
//! - `compile` - the pdflatex/bibtex pass sequence per document
//!
//! Stale outputs are removed first and the rendered PDFs are collected
//! into the distribution `doc/` folder last.

pub mod compile;
pub mod regenerate;
pub mod release_info;
pub mod transcripts;

use anyhow::Result;
use std::path::PathBuf;
use tracing::info;

use super::config::DistConfig;
use super::copy;
use super::manifest::DistributionManifest;
use super::stage::{self, DeletePolicy};

/// Typeset outputs removed before a rebuild.
pub const STALE_EXTENSIONS: &[&str] = &["pdf", "aux", "bbl", "idx", "lof", "out", "toc"];

/// Remove stale typeset outputs of every document. Failures are logged only.
pub fn clean(config: &DistConfig) -> Result<()> {
    info!("Cleaning latex files");
    for doc in &config.documents {
        let files: Vec<String> = STALE_EXTENSIONS
            .iter()
            .map(|ext| format!("{}.{ext}", doc.stem()))
            .collect();
        stage::delete_files(&files, &doc.dir, DeletePolicy::AllowFailure)?;
    }
    Ok(())
}

/// Copy each rendered PDF into `doc/` under its published name.
pub fn collect(config: &DistConfig, manifest: &DistributionManifest) -> Result<Vec<PathBuf>> {
    info!("Copying documentation");
    let doc_dir = manifest.dir("doc")?;
    let mut published = Vec::with_capacity(config.documents.len());
    for doc in &config.documents {
        let dest = doc_dir.join(doc.published);
        copy::copy_file(&doc.pdf(), &dest)?;
        published.push(dest);
    }
    Ok(published)
}
