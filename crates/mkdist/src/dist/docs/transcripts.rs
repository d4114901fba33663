//! Console transcripts of the freshly built engine, included in the
//! input/output guide as listings.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::dist::copy;
use crate::dist::error::DistError;
use crate::dist::process::{run_checked, CommandLine, CommandRunner};

pub const MODEL_OUTPUT: &str = "mf6output.tex";
pub const NO_NAMEFILE: &str = "mf6noname.tex";
pub const SWITCHES: &str = "mf6switches.tex";
pub const LISTINGS: [&str; 3] = [MODEL_OUTPUT, NO_NAMEFILE, SWITCHES];

/// Wrap a console transcript in a `modeloutput` listing.
pub fn listing(transcript: &str) -> String {
    let mut tex = String::from("{\\small\n\\begin{lstlisting}[style=modeloutput]\n");
    for line in transcript.replace("\r\n", "\n").trim_end().lines() {
        tex.push_str(line.trim_end());
        tex.push('\n');
    }
    tex.push_str("\\end{lstlisting}\n}\n");
    tex
}

fn reset(scratch: &Path) -> Result<()> {
    if scratch.exists() {
        std::fs::remove_dir_all(scratch)
            .with_context(|| format!("Failed to remove {}", scratch.display()))?;
    }
    Ok(())
}

fn record(
    runner: &dyn CommandRunner,
    cmd: &CommandLine,
    cwd: &Path,
    timeout: Duration,
    dest: PathBuf,
) -> Result<PathBuf> {
    let output = run_checked(runner, cmd, cwd, timeout)?;
    std::fs::write(&dest, listing(&output))
        .with_context(|| format!("Failed to write {}", dest.display()))?;
    info!("  wrote {}", dest.display());
    Ok(dest)
}

/// Run `mf6` on a copy of `example`, in an empty directory and with `-h`,
/// writing the three listings into `tex_dir`.
///
/// `scratch` is recreated for each run and removed afterwards, also when a
/// run fails.
pub fn capture(
    mf6: &Path,
    example: &Path,
    scratch: &Path,
    tex_dir: &Path,
    runner: &dyn CommandRunner,
    timeout: Duration,
) -> Result<Vec<PathBuf>> {
    info!("Updating mf6io transcripts");
    if !mf6.is_file() {
        return Err(DistError::MissingArtifact(mf6.to_path_buf()).into());
    }
    if !example.is_dir() {
        return Err(DistError::MissingArtifact(example.to_path_buf()).into());
    }
    let engine = CommandLine::new(mf6.display().to_string());

    let written = run_engine(&engine, example, scratch, tex_dir, runner, timeout);
    match (written, reset(scratch)) {
        (Ok(written), cleanup) => cleanup.map(|()| written),
        (Err(e), cleanup) => {
            if let Err(cleanup) = cleanup {
                warn!("{cleanup:#}");
            }
            Err(e)
        }
    }
}

fn run_engine(
    engine: &CommandLine,
    example: &Path,
    scratch: &Path,
    tex_dir: &Path,
    runner: &dyn CommandRunner,
    timeout: Duration,
) -> Result<Vec<PathBuf>> {
    let run = |cmd: &CommandLine, name: &str| {
        record(runner, cmd, scratch, timeout, tex_dir.join(name))
    };
    let mut written = Vec::with_capacity(LISTINGS.len());

    reset(scratch)?;
    copy::copy_tree(example, scratch, &[])?;
    written.push(run(engine, MODEL_OUTPUT)?);

    reset(scratch)?;
    std::fs::create_dir_all(scratch)
        .with_context(|| format!("Failed to create {}", scratch.display()))?;
    written.push(run(engine, NO_NAMEFILE)?);

    written.push(run(&engine.clone().arg("-h"), SWITCHES)?);
    Ok(written)
}
