//! # mkdist
//!
//! Assemble a MODFLOW 6 release distribution.
//!
//! ## Usage
//!
//! ```bash
//! mkdist                 # Full pipeline (same as `mkdist all`)
//! mkdist version         # Print release version and date
//! mkdist plan            # Print the layout and stage list as JSON
//! mkdist doctor          # Check required tools and checkouts
//! mkdist stamp [6.1.1]   # Stamp src/Utilities/version.f90
//! ```
//!
//! Run from (or point `--repo` at) the `distribution/` directory of a
//! MODFLOW 6 checkout.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use mkdist::dist::{self, config::DistConfig, workdir};

#[derive(Parser)]
#[command(name = "mkdist", about = "MODFLOW 6 release distribution builder")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<dist::DistCommands>,

    /// The `distribution/` directory of the MODFLOW 6 checkout
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_target(false)
        .init();

    let command = cli.command.unwrap_or(dist::DistCommands::All);
    workdir::with_current_dir(&cli.repo, || {
        let config = DistConfig::for_work_dir(&std::env::current_dir()?);
        dist::run(&command, &config)
    })
}

/// `RUST_LOG` when set, otherwise `info` (`debug` with `--verbose`).
fn log_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose))
}

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::new(if verbose { "debug" } else { "info" })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_follows_verbosity() {
        assert_eq!(default_filter(false).to_string(), "info");
        assert_eq!(default_filter(true).to_string(), "debug");
    }

    #[test]
    fn test_rust_log_wins_over_verbosity() {
        std::env::set_var("RUST_LOG", "trace");
        let filter = log_filter(false);
        std::env::remove_var("RUST_LOG");
        assert_eq!(filter.to_string(), "trace");
    }
}
