//! The release run: an ordered list of stages over one manifest.
//!
//! Each stage declares the paths it needs and the paths it leaves behind.
//! Both are checked around the stage, so a broken checkout fails at the
//! first stage that touches it and a tool that "succeeds" without output
//! never lets the run continue.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use super::build::{self, BuildTarget};
use super::config::DistConfig;
use super::copy;
use super::docs::{self, compile, regenerate, release_info, transcripts};
use super::error::DistError;
use super::examples;
use super::fetch::{self, AssetFetcher};
use super::lineend;
use super::manifest::DistributionManifest;
use super::package;
use super::process::CommandRunner;
use super::stage;
use super::version;

/// What a stage does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Step {
    StageDirs,
    CopyMsvs,
    CopySources,
    BuildEngine,
    /// Stage and build `config.utilities[index]`.
    BuildUtility { index: usize },
    Examples,
    CleanDocs,
    RegenerateDescriptions,
    Transcripts,
    ReleaseInfo,
    CompileDocs,
    CollectDocs,
    Fetch,
    LineEndings,
    Package,
}

#[derive(Clone, Debug, Serialize)]
pub struct Stage {
    pub name: String,
    pub step: Step,
    /// Must exist before the stage runs.
    pub requires: Vec<PathBuf>,
    /// Must exist after the stage ran.
    pub produces: Vec<PathBuf>,
}

impl Stage {
    fn new(name: impl Into<String>, step: Step) -> Self {
        Self {
            name: name.into(),
            step,
            requires: Vec::new(),
            produces: Vec::new(),
        }
    }

    fn requires(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.requires.extend(paths);
        self
    }

    fn produces(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.produces.extend(paths);
        self
    }

    fn check_requires(&self) -> Result<(), DistError> {
        match self.requires.iter().find(|p| !p.exists()) {
            Some(path) => Err(DistError::Precondition {
                stage: self.name.clone(),
                path: path.clone(),
            }),
            None => Ok(()),
        }
    }

    fn check_produces(&self) -> Result<(), DistError> {
        match self.produces.iter().find(|p| !p.exists()) {
            Some(path) => Err(DistError::Postcondition {
                stage: self.name.clone(),
                path: path.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Resolve the version and lay out (without creating) the distribution tree.
pub fn manifest(config: &DistConfig) -> Result<DistributionManifest> {
    let (version, date) = version::resolve(&config.version_tex)?;
    let root = config.dest_root.join(&version);
    Ok(DistributionManifest::planned(
        version,
        date,
        config.platform,
        root,
        &config.subdirs,
    ))
}

/// Full path of the archive for `manifest`.
pub fn archive_path(config: &DistConfig, manifest: &DistributionManifest) -> PathBuf {
    config.dest_root.join(manifest.archive_name())
}

/// The ordered stage list.
pub fn plan(config: &DistConfig, manifest: &DistributionManifest) -> Result<Vec<Stage>> {
    let dir = |name: &str| manifest.dir(name).map(PathBuf::from);
    let exe = |base: &str| -> Result<PathBuf> { Ok(dir("bin")?.join(config.exe_file_name(base))) };
    let mut stages = Vec::new();

    stages.push(
        Stage::new("stage-dirs", Step::StageDirs)
            .produces(manifest.subdirs().map(|(_, path)| path.to_path_buf())),
    );

    let msvs = dir("msvs")?;
    let msvs_copies: Vec<PathBuf> = config
        .msvs_files
        .iter()
        .filter_map(|f| f.file_name().map(|name| msvs.join(name)))
        .collect();
    stages.push(
        Stage::new("copy-msvs", Step::CopyMsvs)
            .requires(config.msvs_files.iter().cloned())
            .produces(msvs_copies),
    );

    let mut source_dests = Vec::new();
    for tree in &config.sources {
        source_dests.push(dir(tree.into)?);
    }
    stages.push(
        Stage::new("copy-sources", Step::CopySources)
            .requires(config.sources.iter().map(|t| t.from.clone()))
            .produces(source_dests),
    );

    stages.push(
        Stage::new(format!("build-{}", config.exe_name), Step::BuildEngine)
            .requires([dir("src")?, config.make_dir.clone()])
            .produces([exe(config.exe_name)?, dir("make")?.join("makefile")]),
    );

    let utils = dir("utils")?;
    for (index, spec) in config.utilities.iter().enumerate() {
        let makefile = utils.join(spec.name).join("make/makefile");
        stages.push(
            Stage::new(format!("build-{}", spec.name), Step::BuildUtility { index })
                .requires([spec.repo_dir.join("src"), spec.pymake_dir()])
                .produces([exe(spec.exe)?, makefile]),
        );
    }

    let transcript_example = dir("examples")?.join(config.transcript_example);
    stages.push(
        Stage::new("examples", Step::Examples)
            .requires([config.examples_source.clone()])
            .produces([transcript_example.clone()]),
    );

    stages.push(Stage::new("clean-docs", Step::CleanDocs));

    stages.push(
        Stage::new("regenerate-descriptions", Step::RegenerateDescriptions)
            .requires([config.dfn_dir.join("dfn"), config.mf6ivar_tex_dir()]),
    );

    let mf6io = config.mf6io_dir();
    stages.push(
        Stage::new("transcripts", Step::Transcripts)
            .requires([exe(config.exe_name)?, transcript_example])
            .produces(transcripts::LISTINGS.map(|f| mf6io.join(f))),
    );

    let notes = &config.release_notes_dir;
    stages.push(
        Stage::new("release-info", Step::ReleaseInfo)
            .requires([notes.clone()])
            .produces(release_info::FRAGMENTS.map(|f| notes.join(f))),
    );

    stages.push(
        Stage::new("compile-docs", Step::CompileDocs)
            .requires([config.version_tex.clone(), config.docs_checkout.clone()])
            .requires(config.documents.iter().map(|d| d.dir.join(d.tex)))
            .produces(config.documents.iter().map(|d| d.pdf())),
    );

    let doc = dir("doc")?;
    stages.push(
        Stage::new("collect-docs", Step::CollectDocs)
            .requires(config.documents.iter().map(|d| d.pdf()))
            .produces(config.documents.iter().map(|d| doc.join(d.published))),
    );

    stages.push(
        Stage::new("fetch", Step::Fetch)
            .requires([doc.clone()])
            .produces(
                config
                    .urls
                    .iter()
                    .filter_map(|url| fetch::remote_file_name(url))
                    .map(|name| doc.join(name))
                    .collect::<Vec<_>>(),
            ),
    );

    stages.push(Stage::new("line-endings", Step::LineEndings).requires([manifest.root.clone()]));

    stages.push(
        Stage::new("package", Step::Package)
            .requires([manifest.root.clone()])
            .produces([archive_path(config, manifest)]),
    );

    Ok(stages)
}

/// Values one stage hands to a later one.
#[derive(Default)]
struct RunState {
    examples: Vec<String>,
}

/// Drives the stages against real collaborators.
pub struct Pipeline<'a> {
    config: &'a DistConfig,
    runner: &'a dyn CommandRunner,
    fetcher: &'a dyn AssetFetcher,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a DistConfig,
        runner: &'a dyn CommandRunner,
        fetcher: &'a dyn AssetFetcher,
    ) -> Self {
        Self {
            config,
            runner,
            fetcher,
        }
    }

    /// Run every stage in order and return the archive.
    pub fn run(&self) -> Result<PathBuf> {
        let manifest = manifest(self.config)?;
        info!(
            "Setting up {} distribution: {}",
            self.config.name, manifest.version
        );
        let stages = plan(self.config, &manifest)?;
        let mut state = RunState::default();

        for stage in &stages {
            stage.check_requires()?;
            info!("=== {} ===", stage.name);
            let started = Instant::now();
            self.execute(stage.step, &manifest, &mut state)
                .with_context(|| format!("stage '{}' failed", stage.name))?;
            stage.check_produces()?;
            info!(elapsed = ?started.elapsed(), "{} done", stage.name);
        }

        let archive = archive_path(self.config, &manifest);
        info!("Done: {}", archive.display());
        Ok(archive)
    }

    fn execute(
        &self,
        step: Step,
        manifest: &DistributionManifest,
        state: &mut RunState,
    ) -> Result<()> {
        let config = self.config;
        let runner = self.runner;
        match step {
            Step::StageDirs => {
                let stale = archive_path(config, manifest);
                if stale.exists() {
                    info!("Removing previous archive: {}", stale.display());
                    std::fs::remove_file(&stale)
                        .with_context(|| format!("Failed to remove {}", stale.display()))?;
                }
                stage::setup(&manifest.root, &config.subdirs)?;
            }
            Step::CopyMsvs => {
                info!("Copying msvs files");
                copy::copy_files(&config.msvs_files, manifest.dir("msvs")?)?;
            }
            Step::CopySources => {
                for tree in &config.sources {
                    let dest = manifest.dir(tree.into)?;
                    let copied = copy::copy_tree(&tree.from, dest, &config.exclude)?;
                    info!("  {copied} file(s) copied into {}", tree.into);
                }
            }
            Step::BuildEngine => {
                let target = BuildTarget::engine(config, manifest)?;
                build::build(&target, config.platform, config, runner)?;
            }
            Step::BuildUtility { index } => {
                let spec = config
                    .utilities
                    .get(index)
                    .with_context(|| format!("no utility at position {index}"))?;
                let staged = build::stage_utility(spec, manifest, &config.exclude)?;
                let target = BuildTarget::utility(spec, config, manifest, &staged)?;
                build::build(&target, config.platform, config, runner)?;
            }
            Step::Examples => {
                state.examples = examples::stage(
                    &config.examples_source,
                    manifest.dir("examples")?,
                    config.example_prefix,
                    config.platform,
                    &config.exclude,
                )?;
            }
            Step::CleanDocs => docs::clean(config)?,
            Step::RegenerateDescriptions => {
                regenerate::rebuild(
                    &config.dfn_dir,
                    &config.generator,
                    runner,
                    config.timeouts.generator,
                )?;
            }
            Step::Transcripts => {
                let engine = BuildTarget::engine(config, manifest)?.binary_path(config.platform);
                transcripts::capture(
                    &engine,
                    &manifest.dir("examples")?.join(config.transcript_example),
                    &config.dest_root.join("temp"),
                    &config.mf6io_dir(),
                    runner,
                    config.timeouts.model_run,
                )?;
            }
            Step::ReleaseInfo => {
                release_info::update(
                    &config.release_notes_dir,
                    &state.examples,
                    &config.folder_struct,
                    runner,
                    config.timeouts.generator,
                )?;
            }
            Step::CompileDocs => {
                compile::build_all(
                    &config.documents,
                    &config.version_tex,
                    &config.docs_checkout,
                    runner,
                    config.timeouts.typeset,
                )?;
            }
            Step::CollectDocs => {
                docs::collect(config, manifest)?;
            }
            Step::Fetch => {
                fetch::fetch_all(self.fetcher, &config.urls, manifest.dir("doc")?)?;
            }
            Step::LineEndings => {
                lineend::normalize(
                    &manifest.root,
                    config.platform,
                    config.line_endings,
                    runner,
                    config.timeouts.convert,
                )?;
            }
            Step::Package => {
                package::archive(
                    &manifest.root,
                    &config.dest_root,
                    &archive_path(config, manifest),
                    &manifest.release_date,
                    &config.exclude,
                )?;
            }
        }
        Ok(())
    }
}

/// Manifest and stage list, as printed by `mkdist plan`.
#[derive(Serialize)]
pub struct PlanReport {
    pub manifest: DistributionManifest,
    pub archive: PathBuf,
    pub stages: Vec<Stage>,
}

pub fn report(config: &DistConfig) -> Result<PlanReport> {
    let manifest = manifest(config)?;
    let stages = plan(config, &manifest)?;
    Ok(PlanReport {
        archive: archive_path(config, &manifest),
        manifest,
        stages,
    })
}
