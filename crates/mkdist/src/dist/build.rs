//! Executable targets: makefile generation and compilation through pymake.
//!
//! Each target is handled in two phases. The dry run writes a `makefile`
//! that ships with the distribution (always generated for gfortran/gcc so
//! users on any platform can rebuild). The real build then compiles the
//! distribution's copy of the sources with the platform toolchain.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::config::{DistConfig, TargetPlatform, UtilitySpec};
use super::copy;
use super::error::DistError;
use super::manifest::DistributionManifest;
use super::process::{run_checked, CommandLine, CommandRunner, ExitClass};
use super::stage::{self, DeletePolicy};
use super::toolchain::Toolchain;

const MAKEFILE: &str = "makefile";

/// Where the dry-run makefile is generated and where copies of it go.
#[derive(Clone, Debug)]
pub struct DescriptorSpec {
    /// pymake runs here and writes `makefile` into it.
    pub workdir: PathBuf,
    /// Source directory as written into the makefile, relative to `workdir`.
    pub source: PathBuf,
    /// Extra-files list as seen from `workdir`.
    pub extra_files: Option<PathBuf>,
    /// Repository copy kept next to the sources, when `workdir` is scratch.
    pub persistent: Option<PathBuf>,
    /// Copy inside the distribution tree.
    pub dist_copy: PathBuf,
}

/// One deliverable executable.
#[derive(Clone, Debug)]
pub struct BuildTarget {
    pub name: String,
    /// Target name handed to pymake for the makefile.
    pub program: String,
    pub source_root: PathBuf,
    /// Binary path without the platform suffix.
    pub output_path: PathBuf,
    pub extra_files: Option<PathBuf>,
    pub include_subdirs: bool,
    /// Working directory of the real build.
    pub build_dir: PathBuf,
    pub descriptor: DescriptorSpec,
}

impl BuildTarget {
    /// The engine: sources in `src/`, makefile kept in the repository `make/`.
    pub fn engine(config: &DistConfig, manifest: &DistributionManifest) -> Result<Self> {
        Ok(Self {
            name: config.exe_name.to_string(),
            program: config.exe_name.to_string(),
            source_root: manifest.dir("src")?.to_path_buf(),
            output_path: manifest.dir("bin")?.join(config.exe_name),
            extra_files: None,
            include_subdirs: true,
            build_dir: config.dest_root.clone(),
            descriptor: DescriptorSpec {
                workdir: config.make_dir.clone(),
                source: PathBuf::from("../src"),
                extra_files: None,
                persistent: None,
                dist_copy: manifest.dir("make")?.join(MAKEFILE),
            },
        })
    }

    /// An auxiliary tool whose sources were staged into `utils/<name>`.
    pub fn utility(
        spec: &UtilitySpec,
        config: &DistConfig,
        manifest: &DistributionManifest,
        staged: &BTreeMap<String, PathBuf>,
    ) -> Result<Self> {
        let staged_dir = |name: &str| {
            staged
                .get(name)
                .cloned()
                .ok_or_else(|| DistError::UnknownSubdir(format!("utils/{}/{name}", spec.name)))
        };
        Ok(Self {
            name: spec.name.to_string(),
            program: spec.exe.to_string(),
            source_root: staged_dir("src")?,
            output_path: manifest.dir("bin")?.join(spec.exe),
            extra_files: Some(spec.extra_files()),
            include_subdirs: true,
            build_dir: config.dest_root.clone(),
            descriptor: DescriptorSpec {
                workdir: spec.pymake_dir(),
                source: PathBuf::from("../src"),
                extra_files: Some(PathBuf::from("extrafiles.txt")),
                persistent: Some(spec.repo_dir.join("make").join(MAKEFILE)),
                dist_copy: staged_dir("make")?.join(MAKEFILE),
            },
        })
    }

    /// Path the binary must exist at after building for `platform`.
    pub fn binary_path(&self, platform: TargetPlatform) -> PathBuf {
        let suffix = Toolchain::for_platform(platform).exe_suffix;
        let mut name = self.output_path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    }
}

fn pymake_command(
    pymake: &CommandLine,
    source: &Path,
    target: &str,
    toolchain: Toolchain,
    include_subdirs: bool,
    extra_files: Option<&Path>,
) -> CommandLine {
    let mut cmd = pymake
        .clone()
        .arg(source.display().to_string())
        .arg(target)
        .args(["-fc", toolchain.fc, "-cc", toolchain.cc, "--makeclean"]);
    if include_subdirs {
        cmd = cmd.arg("--subdirs");
    }
    if let Some(extra) = extra_files {
        cmd = cmd.arg("--extrafiles").arg(extra.display().to_string());
    }
    cmd
}

/// Dry run: write the makefile and spread copies of it.
pub fn generate_descriptor(
    target: &BuildTarget,
    pymake: &CommandLine,
    runner: &dyn CommandRunner,
    timeout: Duration,
) -> Result<PathBuf> {
    let spec = &target.descriptor;
    info!("Creating {} makefile", target.name);

    stage::delete_files(&[MAKEFILE], &spec.workdir, DeletePolicy::AllowFailure)?;

    let cmd = pymake_command(
        pymake,
        &spec.source,
        &target.program,
        Toolchain::GNU,
        target.include_subdirs,
        spec.extra_files.as_deref(),
    )
    .args(["--dryrun", "--makefile"]);
    run_checked(runner, &cmd, &spec.workdir, timeout)
        .with_context(|| format!("Failed to generate makefile for {}", target.name))?;

    let generated = spec.workdir.join(MAKEFILE);
    if !generated.is_file() {
        return Err(DistError::DescriptorMissing {
            target: target.name.clone(),
            dir: spec.workdir.clone(),
        }
        .into());
    }

    if let Some(persistent) = &spec.persistent {
        copy::copy_file(&generated, persistent)?;
    }
    copy::copy_file(&generated, &spec.dist_copy)?;
    if spec.persistent.is_some() {
        stage::delete_files(&[MAKEFILE], &spec.workdir, DeletePolicy::Strict)?;
    }

    Ok(spec.dist_copy.clone())
}

/// Real build with the platform toolchain; returns the verified binary.
pub fn compile(
    target: &BuildTarget,
    platform: TargetPlatform,
    pymake: &CommandLine,
    runner: &dyn CommandRunner,
    timeout: Duration,
) -> Result<PathBuf> {
    let toolchain = Toolchain::for_platform(platform);
    info!(deliverable = %target.name, fc = toolchain.fc, cc = toolchain.cc, "building");

    let cmd = pymake_command(
        pymake,
        &target.source_root,
        &target.output_path.display().to_string(),
        toolchain,
        target.include_subdirs,
        target.extra_files.as_deref(),
    );
    let result = runner.run(&cmd, &target.build_dir, timeout);
    if result.class != ExitClass::Success {
        warn!(deliverable = %target.name, "build {}", result.class.describe());
        return Err(anyhow::Error::from(DistError::CommandFailed {
            command: cmd,
            class: result.class,
            output: result.output,
        }))
        .with_context(|| format!("Did not build target: {}", target.name));
    }

    let binary = target.binary_path(platform);
    if !binary.is_file() {
        return Err(DistError::BuildFailed {
            target: target.name.clone(),
            path: binary,
        }
        .into());
    }
    info!("  Built: {}", binary.display());
    Ok(binary)
}

/// Both phases for one target.
pub fn build(
    target: &BuildTarget,
    platform: TargetPlatform,
    config: &DistConfig,
    runner: &dyn CommandRunner,
) -> Result<PathBuf> {
    info!("=== Building {} ===", target.name);
    generate_descriptor(target, &config.pymake, runner, config.timeouts.generator)?;
    compile(
        target,
        platform,
        &config.pymake,
        runner,
        config.timeouts.build,
    )
}

/// Lay out `utils/<name>/{src,make,msvs}` and copy the tool's sources and
/// project files into it.
pub fn stage_utility(
    spec: &UtilitySpec,
    manifest: &DistributionManifest,
    exclude: &[&str],
) -> Result<BTreeMap<String, PathBuf>> {
    info!("Setting up {} distribution", spec.name);
    let root = manifest.dir("utils")?.join(spec.name);
    let staged = stage::setup(&root, &["src", "make", "msvs"])?;

    copy::copy_tree(&spec.repo_dir.join("src"), &root.join("src"), exclude)?;
    let msvs: Vec<PathBuf> = spec
        .msvs_files
        .iter()
        .map(|f| spec.repo_dir.join("msvs").join(f))
        .collect();
    copy::copy_files(&msvs, &root.join("msvs"))?;

    Ok(staged)
}
