//! Fixed release configuration.
//!
//! There is no configuration file: a release is cut with the constants
//! below. Every repository path is relative to the `distribution/`
//! directory of a MODFLOW 6 checkout, with the test-models and docs
//! repositories checked out next to it.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::process::CommandLine;
use super::toolchain::Toolchain;

/// Platform the distribution is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetPlatform {
    /// Unix-like host building for itself.
    Native,
    /// Windows release (Intel compilers, `.exe` binaries, CRLF text).
    CrossTarget,
}

impl TargetPlatform {
    /// Suffix between the version and `.zip` in the archive name.
    pub fn archive_suffix(self) -> &'static str {
        match self {
            Self::CrossTarget => "",
            Self::Native => "u",
        }
    }

    pub fn is_windows(self) -> bool {
        self == Self::CrossTarget
    }
}

/// How line endings are rewritten before packaging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineEndingMode {
    /// External converter when it is on PATH, in-process otherwise.
    Auto,
    External,
    Native,
}

/// A source tree copied verbatim into a distribution subdirectory.
#[derive(Clone, Debug, Serialize)]
pub struct SourceTree {
    pub from: PathBuf,
    pub into: &'static str,
}

/// An auxiliary tool shipped under `utils/<name>`.
#[derive(Clone, Debug, Serialize)]
pub struct UtilitySpec {
    pub name: &'static str,
    pub exe: &'static str,
    /// `utils/<name>` in the repository: holds `src/`, `pymake/`, `make/`, `msvs/`.
    pub repo_dir: PathBuf,
    pub msvs_files: Vec<&'static str>,
}

impl UtilitySpec {
    pub fn pymake_dir(&self) -> PathBuf {
        self.repo_dir.join("pymake")
    }

    pub fn extra_files(&self) -> PathBuf {
        self.pymake_dir().join("extrafiles.txt")
    }
}

/// One LaTeX document rendered for the release.
#[derive(Clone, Debug, Serialize)]
pub struct DocSpec {
    pub dir: PathBuf,
    pub tex: &'static str,
    /// File name of the PDF inside the distribution `doc/` folder.
    pub published: &'static str,
}

impl DocSpec {
    pub fn stem(&self) -> &str {
        self.tex.strip_suffix(".tex").unwrap_or(self.tex)
    }

    pub fn pdf(&self) -> PathBuf {
        self.dir.join(format!("{}.pdf", self.stem()))
    }
}

/// Per-kind bounds handed to the process runner.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Timeouts {
    pub build: Duration,
    pub generator: Duration,
    pub typeset: Duration,
    pub model_run: Duration,
    pub convert: Duration,
    pub download: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            build: Duration::from_secs(3600),
            generator: Duration::from_secs(120),
            typeset: Duration::from_secs(600),
            model_run: Duration::from_secs(60),
            convert: Duration::from_secs(120),
            download: Duration::from_secs(300),
        }
    }
}

/// Everything a release run needs to know.
#[derive(Clone, Debug, Serialize)]
pub struct DistConfig {
    pub name: &'static str,
    pub platform: TargetPlatform,
    pub exe_name: &'static str,
    /// The directory the versioned tree and the archive are written to.
    pub dest_root: PathBuf,
    pub version_tex: PathBuf,
    pub version_module: PathBuf,
    pub subdirs: Vec<&'static str>,
    pub msvs_files: Vec<PathBuf>,
    pub sources: Vec<SourceTree>,
    /// Persistent home of the engine makefile in the repository.
    pub make_dir: PathBuf,
    pub utilities: Vec<UtilitySpec>,
    pub examples_source: PathBuf,
    pub example_prefix: &'static str,
    pub transcript_example: &'static str,
    pub doc_root: PathBuf,
    pub docs_checkout: PathBuf,
    pub dfn_dir: PathBuf,
    pub generator: CommandLine,
    pub release_notes_dir: PathBuf,
    pub folder_struct: CommandLine,
    pub documents: Vec<DocSpec>,
    pub urls: Vec<&'static str>,
    pub exclude: Vec<&'static str>,
    pub verify_certificates: bool,
    pub line_endings: LineEndingMode,
    /// Invocation of the pymake build driver.
    pub pymake: CommandLine,
    pub timeouts: Timeouts,
}

impl Default for DistConfig {
    fn default() -> Self {
        Self::for_work_dir(Path::new("."))
    }
}

impl DistConfig {
    /// Release configuration for a `distribution/` directory at `work`.
    pub fn for_work_dir(work: &Path) -> Self {
        let repo = work.join("..");
        let doc = repo.join("doc");
        let docs_checkout = work.join("../../modflow6-docs.git");
        let msvs = repo.join("msvs");

        Self {
            name: "MODFLOW 6",
            platform: TargetPlatform::CrossTarget,
            exe_name: "mf6",
            dest_root: work.to_path_buf(),
            version_tex: doc.join("version.tex"),
            version_module: repo.join("src/Utilities/version.f90"),
            subdirs: vec![
                "bin", "doc", "examples", "src", "srcbmi", "msvs", "make", "utils",
            ],
            msvs_files: [
                "mf6.sln",
                "mf6.vfproj",
                "mf6core.vfproj",
                "mf6bmi.sln",
                "mf6bmi.vfproj",
            ]
            .iter()
            .map(|f| msvs.join(f))
            .collect(),
            sources: vec![
                SourceTree {
                    from: repo.join("src"),
                    into: "src",
                },
                SourceTree {
                    from: repo.join("srcbmi"),
                    into: "srcbmi",
                },
            ],
            make_dir: repo.join("make"),
            utilities: vec![
                UtilitySpec {
                    name: "zonebudget",
                    exe: "zbud6",
                    repo_dir: repo.join("utils/zonebudget"),
                    msvs_files: vec!["zonebudget.vfproj"],
                },
                UtilitySpec {
                    name: "mf5to6",
                    exe: "mf5to6",
                    repo_dir: repo.join("utils/mf5to6"),
                    msvs_files: vec!["mf5to6.vfproj"],
                },
            ],
            examples_source: work.join("../../modflow6-testmodels.git/mf6"),
            example_prefix: "ex",
            transcript_example: "ex01-twri",
            dfn_dir: doc.join("mf6io/mf6ivar"),
            generator: CommandLine::new("python").arg("mf6ivar.py"),
            release_notes_dir: doc.join("ReleaseNotes"),
            folder_struct: CommandLine::new("python").arg("mk_folder_struct.py"),
            documents: vec![
                DocSpec {
                    dir: doc.join("mf6io"),
                    tex: "mf6io.tex",
                    published: "mf6io.pdf",
                },
                DocSpec {
                    dir: doc.join("ReleaseNotes"),
                    tex: "ReleaseNotes.tex",
                    published: "release.pdf",
                },
                DocSpec {
                    dir: doc.join("zonebudget"),
                    tex: "zonebudget.tex",
                    published: "zonebudget.pdf",
                },
                DocSpec {
                    dir: doc.join("ConverterGuide"),
                    tex: "converter_mf5to6.tex",
                    published: "mf5to6.pdf",
                },
                DocSpec {
                    dir: docs_checkout.join("mf6suptechinfo"),
                    tex: "mf6suptechinfo.tex",
                    published: "mf6suptechinfo.pdf",
                },
            ],
            doc_root: doc,
            docs_checkout,
            urls: vec![
                "https://pubs.usgs.gov/tm/06/a57/tm6a57.pdf",
                "https://pubs.usgs.gov/tm/06/a55/tm6a55.pdf",
                "https://pubs.usgs.gov/tm/06/a56/tm6a56.pdf",
                "https://github.com/MODFLOW-USGS/modflow6-testmodels/releases/download/6.1.0/csubexamples.pdf",
            ],
            exclude: vec![".DS_Store"],
            verify_certificates: false,
            line_endings: LineEndingMode::Auto,
            pymake: CommandLine::new("python").args(["-m", "pymake.pymake"]),
            timeouts: Timeouts::default(),
        }
    }

    /// Name of an executable on the configured platform.
    pub fn exe_file_name(&self, base: &str) -> String {
        format!("{base}{}", Toolchain::for_platform(self.platform).exe_suffix)
    }

    pub fn mf6ivar_tex_dir(&self) -> PathBuf {
        self.dfn_dir.join("tex")
    }

    pub fn mf6io_dir(&self) -> PathBuf {
        self.doc_root.join("mf6io")
    }
}
