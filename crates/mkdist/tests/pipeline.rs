//! End-to-end runs of the release pipeline against a synthetic checkout,
//! with every external tool replaced by a scripted runner.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mkdist::dist::config::{DistConfig, LineEndingMode};
use mkdist::dist::error::DistError;
use mkdist::dist::pipeline::Pipeline;
use mkdist::dist::process::{CommandLine, ProcessResult};
use tempfile::TempDir;

const VERSION_TEX: &str = "\\newcommand{\\modflowversion}{mf6beta0.9.00}\n\
                           \\newcommand{\\modflowdate}{January 2020}\n";
const LATEX: &str = "\\documentclass{report}\n";
const EXTRA_FILES: &str = "../../../src/Utilities/kind.f90\n";

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// `modflow6/` with its `distribution/` dir, plus the sibling test-models
/// and docs checkouts. Returns the `distribution/` path.
fn checkout(tmp: &TempDir) -> PathBuf {
    let root = tmp.path();
    let repo = root.join("modflow6");
    let work = repo.join("distribution");
    fs::create_dir_all(&work).unwrap();

    for (path, contents) in [
        ("doc/version.tex", VERSION_TEX),
        ("src/mf6.f90", "program mf6\nend program mf6\n"),
        ("src/.DS_Store", "junk"),
        ("srcbmi/mf6bmi.f90", "module mf6bmi\nend module\n"),
        ("doc/mf6io/mf6io.tex", LATEX),
        ("doc/ReleaseNotes/ReleaseNotes.tex", LATEX),
        ("doc/zonebudget/zonebudget.tex", LATEX),
        ("doc/ConverterGuide/converter_mf5to6.tex", LATEX),
    ] {
        write(&repo.join(path), contents);
    }
    for f in [
        "mf6.sln",
        "mf6.vfproj",
        "mf6core.vfproj",
        "mf6bmi.sln",
        "mf6bmi.vfproj",
    ] {
        write(&repo.join("msvs").join(f), "<project/>\n");
    }
    fs::create_dir_all(repo.join("make")).unwrap();

    for (tool, project) in [
        ("zonebudget", "zonebudget.vfproj"),
        ("mf5to6", "mf5to6.vfproj"),
    ] {
        let dir = repo.join("utils").join(tool);
        let source = dir.join("src").join(format!("{tool}.f90"));
        write(&source, "program tool\nend program\n");
        write(&dir.join("pymake/extrafiles.txt"), EXTRA_FILES);
        write(&dir.join("msvs").join(project), "<project/>\n");
        fs::create_dir_all(dir.join("make")).unwrap();
    }

    let dfn_dir = repo.join("doc/mf6io/mf6ivar/dfn");
    for dfn in ["gwf-dis", "gwf-npf", "utl-common"] {
        write(&dfn_dir.join(format!("{dfn}.dfn")), "block options\n");
    }
    fs::create_dir_all(repo.join("doc/mf6io/mf6ivar/tex")).unwrap();

    let models = root.join("modflow6-testmodels.git/mf6");
    write(&models.join("ex01-twri/mfsim.nam"), "BEGIN models\n");
    write(&models.join("ex02-tidal/mfsim.nam"), "BEGIN models\n");
    let suptechinfo = root.join("modflow6-docs.git/mf6suptechinfo");
    write(&suptechinfo.join("mf6suptechinfo.tex"), LATEX);

    work
}

/// Acts as pymake, the definition generator, the folder-structure script,
/// pdflatex, bibtex and mf6, writing whatever each would leave behind.
fn scripted(
    calls: &RefCell<Vec<String>>,
    cmd: &CommandLine,
    cwd: &Path,
    t: Duration,
) -> ProcessResult {
    calls.borrow_mut().push(cmd.to_string());
    let args: Vec<&str> = cmd.args.iter().map(String::as_str).collect();
    match (cmd.program.as_str(), args.as_slice()) {
        ("python", ["-m", "pymake.pymake", rest @ ..]) => {
            if rest.contains(&"--dryrun") {
                fs::write(cwd.join("makefile"), "# makefile\n").unwrap();
            } else {
                fs::write(format!("{}.exe", rest[1]), b"MZ\0\0").unwrap();
            }
        }
        ("python", ["mf6ivar.py"]) => {
            for entry in fs::read_dir(cwd.join("dfn")).unwrap() {
                let path = entry.unwrap().path();
                let stem = path.file_stem().unwrap().to_str().unwrap().to_string();
                fs::write(cwd.join(format!("tex/{stem}-desc.tex")), "desc\n").unwrap();
            }
        }
        ("python", ["mk_folder_struct.py"]) => {
            fs::write(cwd.join("folder_struct.tex"), "\\dirtree{}\n").unwrap();
        }
        ("pdflatex", [tex]) => {
            let pdf = Path::new(tex).with_extension("pdf");
            fs::write(cwd.join(pdf), "%PDF-1.5").unwrap();
        }
        ("bibtex", _) => {}
        (program, _) if program.ends_with("mf6.exe") => {
            let banner = "MODFLOW 6\r\nNormal termination of simulation.\r\n";
            return ProcessResult::success(banner, t);
        }
        other => panic!("unexpected command: {other:?}"),
    }
    ProcessResult::success("", t)
}

fn fake_download(url: &str, dir: &Path) -> anyhow::Result<PathBuf> {
    let name = url.rsplit('/').next().unwrap();
    let dest = dir.join(name);
    fs::write(&dest, "%PDF-1.4")?;
    Ok(dest)
}

fn entries(archive: &Path) -> Vec<String> {
    let zip = zip::ZipArchive::new(fs::File::open(archive).unwrap()).unwrap();
    zip.file_names().map(str::to_string).collect()
}

#[test]
fn test_full_run_produces_versioned_archive() {
    let tmp = TempDir::new().unwrap();
    let work = checkout(&tmp);
    let mut config = DistConfig::for_work_dir(&work);
    config.line_endings = LineEndingMode::Native;

    let calls = RefCell::new(Vec::new());
    let runner = |cmd: &CommandLine, cwd: &Path, t: Duration| scripted(&calls, cmd, cwd, t);

    let pipeline = Pipeline::new(&config, &runner, &fake_download);
    let archive = pipeline.run().unwrap();

    assert_eq!(archive, work.join("mf6beta0.9.00.zip"));
    let names = entries(&archive);
    for expected in [
        "mf6beta0.9.00/bin/mf6.exe",
        "mf6beta0.9.00/bin/zbud6.exe",
        "mf6beta0.9.00/bin/mf5to6.exe",
        "mf6beta0.9.00/make/makefile",
        "mf6beta0.9.00/utils/zonebudget/make/makefile",
        "mf6beta0.9.00/utils/mf5to6/msvs/mf5to6.vfproj",
        "mf6beta0.9.00/examples/ex01-twri/run.bat",
        "mf6beta0.9.00/doc/release.pdf",
        "mf6beta0.9.00/doc/mf6suptechinfo.pdf",
        "mf6beta0.9.00/doc/tm6a57.pdf",
        "mf6beta0.9.00/src/mf6.f90",
        "mf6beta0.9.00/msvs/mf6bmi.sln",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {expected}");
    }
    assert!(!names.iter().any(|n| n.ends_with(".DS_Store")));

    let dist = work.join("mf6beta0.9.00");
    assert_eq!(
        fs::read(dist.join("src/mf6.f90")).unwrap(),
        b"program mf6\r\nend program mf6\r\n"
    );
    assert_eq!(fs::read(dist.join("bin/mf6.exe")).unwrap(), b"MZ\0\0");

    let repo = work.join("..");
    let output = fs::read_to_string(repo.join("doc/mf6io/mf6output.tex")).unwrap();
    assert!(output.contains("Normal termination of simulation.\n\\end{lstlisting}"));
    assert!(repo.join("utils/zonebudget/make/makefile").is_file());
    assert!(!repo.join("utils/zonebudget/pymake/makefile").exists());
    assert!(!work.join("temp").exists());
    let items = fs::read_to_string(repo.join("doc/ReleaseNotes/example_items.tex")).unwrap();
    assert!(items.contains("ex02-tidal"));

    let calls = calls.borrow();
    let typeset: Vec<&String> = calls
        .iter()
        .filter(|c| c.starts_with("pdflatex") || c.starts_with("bibtex"))
        .take(4)
        .collect();
    assert_eq!(
        typeset,
        [
            "pdflatex mf6io.tex",
            "bibtex mf6io.aux",
            "pdflatex mf6io.tex",
            "pdflatex mf6io.tex"
        ]
    );
}

#[test]
fn test_missing_examples_stop_the_run() {
    let tmp = TempDir::new().unwrap();
    let work = checkout(&tmp);
    fs::remove_dir_all(tmp.path().join("modflow6-testmodels.git")).unwrap();
    let mut config = DistConfig::for_work_dir(&work);
    config.line_endings = LineEndingMode::Native;

    let calls = RefCell::new(Vec::new());
    let runner = |cmd: &CommandLine, cwd: &Path, t: Duration| scripted(&calls, cmd, cwd, t);

    fs::write(work.join("mf6beta0.9.00.zip"), "stale").unwrap();

    let pipeline = Pipeline::new(&config, &runner, &fake_download);
    let err = pipeline.run().unwrap_err();

    match err.downcast_ref::<DistError>() {
        Some(DistError::Precondition { stage, .. }) => assert_eq!(stage, "examples"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(work.join("mf6beta0.9.00/bin/mf5to6.exe").is_file());
    assert!(!calls.borrow().iter().any(|c| c.starts_with("pdflatex")));
    assert!(!work.join("mf6beta0.9.00.zip").exists());
}

#[test]
fn test_download_that_writes_nothing_stops_before_line_endings() {
    let tmp = TempDir::new().unwrap();
    let work = checkout(&tmp);
    let mut config = DistConfig::for_work_dir(&work);
    config.line_endings = LineEndingMode::Native;

    let calls = RefCell::new(Vec::new());
    let runner = |cmd: &CommandLine, cwd: &Path, t: Duration| scripted(&calls, cmd, cwd, t);
    let silent = |url: &str, dir: &Path| -> anyhow::Result<PathBuf> {
        Ok(dir.join(url.rsplit('/').next().unwrap()))
    };

    let err = Pipeline::new(&config, &runner, &silent).run().unwrap_err();

    match err.downcast_ref::<DistError>() {
        Some(DistError::Postcondition { stage, path }) => {
            assert_eq!(stage, "fetch");
            assert_eq!(path.file_name().unwrap(), "tm6a57.pdf");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let dist = work.join("mf6beta0.9.00");
    assert!(dist.join("doc/mf6io.pdf").is_file());
    assert_eq!(
        fs::read(dist.join("src/mf6.f90")).unwrap(),
        b"program mf6\nend program mf6\n"
    );
    assert!(!work.join("mf6beta0.9.00.zip").exists());
}

#[test]
fn test_missing_version_marker_fails_before_staging() {
    let tmp = TempDir::new().unwrap();
    let work = checkout(&tmp);
    let version_tex = "\\newcommand{\\modflowversion}{6.1.0}\n";
    fs::write(work.join("../doc/version.tex"), version_tex).unwrap();
    let config = DistConfig::for_work_dir(&work);

    let runner = |_: &CommandLine, _: &Path, t: Duration| ProcessResult::success("", t);
    let pipeline = Pipeline::new(&config, &runner, &fake_download);
    let err = pipeline.run().unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DistError>(),
        Some(DistError::VersionNotFound { marker: "modflowdate", .. })
    ));
    assert!(!work.join("6.1.0").exists());
}
