//! External command execution with a bounded wait.
//!
//! Every tool the pipeline drives (pymake, pdflatex, bibtex, python, the
//! freshly built mf6, unix2dos) goes through a [`CommandRunner`]. The
//! runner only classifies how the invocation ended; whether the tool did
//! its job is decided by the caller, usually by checking for the file the
//! tool was supposed to write.

use anyhow::Result;
use serde::Serialize;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

use super::error::DistError;

/// A program plus its arguments.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandLine {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How an invocation ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitClass {
    /// The process ran to completion. Its exit code is not interpreted.
    Success,
    /// The timeout expired and the process was killed.
    TimedOut,
    /// The process could not be started or waited on.
    Errored,
}

impl ExitClass {
    pub fn describe(self) -> &'static str {
        match self {
            Self::Success => "completed",
            Self::TimedOut => "timed out",
            Self::Errored => "crashed or could not be started",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProcessResult {
    pub class: ExitClass,
    /// stdout and stderr, interleaved in arrival order.
    pub output: String,
    pub timeout: Duration,
    /// Only set when the process completed; logged, never acted on.
    pub exit_code: Option<i32>,
}

impl ProcessResult {
    pub fn success(output: impl Into<String>, timeout: Duration) -> Self {
        Self {
            class: ExitClass::Success,
            output: output.into(),
            timeout,
            exit_code: Some(0),
        }
    }

    pub fn errored(output: impl Into<String>, timeout: Duration) -> Self {
        Self {
            class: ExitClass::Errored,
            output: output.into(),
            timeout,
            exit_code: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.class == ExitClass::Success
    }
}

/// Runs one external command in a working directory.
pub trait CommandRunner {
    fn run(&self, cmd: &CommandLine, cwd: &Path, timeout: Duration) -> ProcessResult;
}

impl<F> CommandRunner for F
where
    F: Fn(&CommandLine, &Path, Duration) -> ProcessResult,
{
    fn run(&self, cmd: &CommandLine, cwd: &Path, timeout: Duration) -> ProcessResult {
        self(cmd, cwd, timeout)
    }
}

/// How long reader threads get to finish after the process is gone.
///
/// A descendant that left the process group can keep the pipes open; past
/// this point its remaining output is dropped.
const READER_GRACE: Duration = Duration::from_secs(2);

/// Runs commands as real child processes.
///
/// On unix each command leads its own process group, so a timeout kills
/// every descendant (make, the compilers, python subprocesses) along with
/// the direct child.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &CommandLine, cwd: &Path, timeout: Duration) -> ProcessResult {
        debug!(command = %cmd, cwd = %cwd.display(), "running");

        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        own_process_group(&mut command);
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                let message = format!("failed to start {}: {e}", cmd.program);
                return ProcessResult::errored(message, timeout);
            }
        };

        // Both pipes feed one buffer so the transcript keeps arrival order.
        let merged = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = mpsc::channel();
        let mut readers = 0;
        if let Some(stdout) = child.stdout.take() {
            drain(stdout, Arc::clone(&merged), done_tx.clone());
            readers += 1;
        }
        if let Some(stderr) = child.stderr.take() {
            drain(stderr, Arc::clone(&merged), done_tx.clone());
            readers += 1;
        }
        drop(done_tx);

        let mut notes = String::new();
        let (mut class, exit_code) = match child.wait_timeout(timeout) {
            Ok(Some(status)) => (ExitClass::Success, status.code()),
            Ok(None) => {
                warn!(command = %cmd, ?timeout, "timed out, killing process group");
                kill_tree(&mut child);
                (ExitClass::TimedOut, None)
            }
            Err(e) => {
                kill_tree(&mut child);
                notes = format!("\nfailed to wait for {}: {e}", cmd.program);
                (ExitClass::Errored, None)
            }
        };

        let deadline = Instant::now() + READER_GRACE;
        for _ in 0..readers {
            match done_rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => {
                    warn!(command = %cmd, "output still open after exit, no longer reading");
                    notes.push_str("\noutput still open after exit, remaining output dropped");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => {
                    class = ExitClass::Errored;
                    notes.push_str("\noutput reader thread panicked");
                    break;
                }
            }
        }

        let bytes = match merged.lock() {
            Ok(buf) => buf.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let mut output = String::from_utf8_lossy(&bytes).into_owned();
        output.push_str(&notes);

        debug!(command = %cmd, ?class, ?exit_code, "finished");
        ProcessResult {
            class,
            output,
            timeout,
            exit_code,
        }
    }
}

#[cfg(unix)]
fn own_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_command: &mut Command) {}

/// Kill the child and, on unix, everything else in its process group, then
/// reap the child.
fn kill_tree(child: &mut Child) {
    kill_group(child);
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(unix)]
fn kill_group(child: &Child) {
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: plain syscall; the child is not reaped yet, so its pid
        // still names the group it leads.
        unsafe {
            libc::killpg(pgid, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

/// Copy `pipe` into `sink` on a detached thread, signalling `done` at EOF.
fn drain<R: Read + Send + 'static>(mut pipe: R, sink: Arc<Mutex<Vec<u8>>>, done: Sender<()>) {
    std::thread::spawn(move || {
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => match sink.lock() {
                    Ok(mut buf) => buf.extend_from_slice(&chunk[..n]),
                    Err(poisoned) => poisoned.into_inner().extend_from_slice(&chunk[..n]),
                },
            }
        }
        let _ = done.send(());
    });
}

/// Run a command and turn anything but [`ExitClass::Success`] into a fatal
/// [`DistError::CommandFailed`] carrying the transcript.
pub fn run_checked(
    runner: &dyn CommandRunner,
    cmd: &CommandLine,
    cwd: &Path,
    timeout: Duration,
) -> Result<String> {
    let result = runner.run(cmd, cwd, timeout);
    if result.is_success() {
        return Ok(result.output);
    }
    Err(DistError::CommandFailed {
        command: cmd.clone(),
        class: result.class,
        output: result.output,
    }
    .into())
}
