//! Release distribution builder for MODFLOW 6.
//!
//! Structure:
//! - `config` - fixed release constants and repository layout
//! - `version` - version lookup in `doc/version.tex`, version module stamping
//! - `stage`, `copy` - distribution tree layout and file copying
//! - `build` - makefile generation and compilation through pymake
//! - `examples` - example models and their run scripts
//! - `docs/` - LaTeX regeneration, transcripts and typesetting
//! - `fetch` - published reports downloaded into `doc/`
//! - `lineend`, `package` - final normalization and the zip archive
//! - `pipeline` - stage order and pre/postcondition checks
//!
//! All external tools are driven through `process::CommandRunner`.

pub mod build;
pub mod config;
pub mod copy;
pub mod docs;
pub mod doctor;
pub mod error;
pub mod examples;
pub mod fetch;
pub mod lineend;
pub mod manifest;
pub mod package;
pub mod pipeline;
pub mod process;
pub mod stage;
pub mod toolchain;
pub mod version;
pub mod workdir;

use anyhow::Result;
use clap::Subcommand;

use config::DistConfig;
use fetch::HttpFetcher;
use process::SystemRunner;

/// Distribution commands for the CLI.
#[derive(Subcommand, Clone, Debug, PartialEq, Eq)]
pub enum DistCommands {
    /// Build the complete distribution and its archive
    All,
    /// Print the release version and date
    Version,
    /// Print the distribution layout and stage list as JSON
    Plan,
    /// Check that the required tools and checkouts are present
    Doctor,
    /// Write the release version into the Fortran version module
    Stamp {
        /// Version to stamp (defaults to the one in version.tex)
        version: Option<String>,
    },
}

/// Build everything with real processes and HTTP downloads.
pub fn build_all(config: &DistConfig) -> Result<()> {
    let fetcher = HttpFetcher::new(config.timeouts.download, config.verify_certificates)?;
    let archive = pipeline::Pipeline::new(config, &SystemRunner, &fetcher).run()?;
    println!("\n=== Distribution complete ===");
    println!("Archive: {}", archive.display());
    Ok(())
}

pub fn print_version(config: &DistConfig) -> Result<()> {
    let (version, date) = version::resolve(&config.version_tex)?;
    println!("{version}");
    println!("{date}");
    Ok(())
}

pub fn print_plan(config: &DistConfig) -> Result<()> {
    let report = pipeline::report(config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn stamp(config: &DistConfig, version: Option<String>) -> Result<()> {
    let version = match version {
        Some(v) => v,
        None => version::resolve(&config.version_tex)?.0,
    };
    version::stamp(&config.version_module, &version)
}

/// Dispatch one command.
pub fn run(command: &DistCommands, config: &DistConfig) -> Result<()> {
    match command {
        DistCommands::All => build_all(config),
        DistCommands::Version => print_version(config),
        DistCommands::Plan => print_plan(config),
        DistCommands::Doctor => doctor::run(config),
        DistCommands::Stamp { version } => stamp(config, version.clone()),
    }
}
