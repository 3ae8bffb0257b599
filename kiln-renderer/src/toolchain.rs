//! External build-and-run toolchains.
//!
//! The [`Toolchain`] trait is the seam between the harness and whatever runs
//! the generated program. [`GoToolchain`] shells out to `go run`; tests plug
//! in a fake.
//!
//! `go run` builds the program and then runs it as a child of its own, so a
//! timeout has to stop more than the process we spawned. On Unix the
//! toolchain leads a fresh process group and the whole group is killed.

use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::error::RenderError;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// How long to wait for output pipes to close after a kill.
const KILL_GRACE: Duration = Duration::from_millis(500);

/// Captured result of one toolchain invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Execution {
    /// Exit code; `None` when the process was killed.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl Execution {
    pub fn success(&self) -> bool {
        self.status == Some(0) && !self.timed_out
    }

    /// Standard output followed by standard error.
    pub fn combined(&self) -> String {
        let mut out = String::with_capacity(self.stdout.len() + self.stderr.len());
        out.push_str(&self.stdout);
        out.push_str(&self.stderr);
        out
    }
}

/// Builds and runs a generated program file.
pub trait Toolchain: Send + Sync {
    /// Run `program` to completion and capture its output.
    ///
    /// A nonzero exit is reported through [`Execution::status`], not as an
    /// error. Errors are reserved for failing to run at all.
    fn run(&self, program: &Path) -> Result<Execution, RenderError>;
}

// ---------------------------------------------------------------------------
// GoToolchain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GoToolchain {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl Default for GoToolchain {
    fn default() -> Self {
        GoToolchain::new("go")
    }
}

impl GoToolchain {
    /// `program run <file>` with no timeout.
    pub fn new(program: impl Into<String>) -> Self {
        GoToolchain {
            program: program.into(),
            args: vec!["run".to_owned()],
            timeout: None,
        }
    }

    /// Replace the arguments placed before the program path.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn spawn(&self, program: &Path) -> Result<Child, RenderError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(program)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        own_process_group(&mut command);
        command.spawn().map_err(|source| self.launch_err(source))
    }

    fn launch_err(&self, source: io::Error) -> RenderError {
        RenderError::ToolchainLaunch {
            program: self.program.clone(),
            source,
        }
    }
}

impl Toolchain for GoToolchain {
    fn run(&self, program: &Path) -> Result<Execution, RenderError> {
        info!(
            toolchain = %self.program,
            args = ?self.args,
            program = %program.display(),
            "launching toolchain"
        );
        let mut child = self.spawn(program)?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let started = Instant::now();
        let (status, timed_out) = loop {
            if let Some(status) = child.try_wait().map_err(|e| self.launch_err(e))? {
                break (status.code(), false);
            }
            match self.timeout {
                Some(limit) if started.elapsed() >= limit => {
                    warn!(toolchain = %self.program, ?limit, "toolchain timed out, killing");
                    if let Err(err) = kill_tree(&mut child) {
                        warn!(toolchain = %self.program, error = %err, "kill failed");
                    }
                    let _ = child.wait();
                    break (None, true);
                }
                _ => thread::sleep(POLL_INTERVAL),
            }
        };

        // A descendant that escaped the kill may still hold the pipes open.
        let grace = timed_out.then_some(KILL_GRACE);
        let stdout = collect(stdout, grace);
        let mut stderr = collect(stderr, grace);
        if timed_out {
            if let Some(limit) = self.timeout {
                stderr.push_str(&format!("\ntimed out after {limit:?}\n"));
            }
        }
        Ok(Execution {
            status,
            stdout,
            stderr,
            timed_out,
        })
    }
}

#[cfg(unix)]
fn own_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_command: &mut Command) {}

/// Kill the child and everything in its process group.
#[cfg(unix)]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(child.id())
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    // SAFETY: plain syscall; a negative pid addresses the group led by the
    // child, which `own_process_group` created at spawn.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    child.kill()
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<Vec<u8>>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });
        rx
    })
}

/// Wait for a reader to finish; with `grace` set, give up after that long.
fn collect(reader: Option<Receiver<Vec<u8>>>, grace: Option<Duration>) -> String {
    let bytes = reader
        .and_then(|rx| match grace {
            Some(limit) => rx.recv_timeout(limit).ok(),
            None => rx.recv().ok(),
        })
        .unwrap_or_default();
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_go_run() {
        let go = GoToolchain::default();
        assert_eq!(go.program(), "go");
        assert_eq!(go.args(), &["run".to_owned()]);
        assert_eq!(go.timeout(), None);
    }

    #[test]
    fn missing_binary_is_a_launch_error() {
        let go = GoToolchain::new("kiln-no-such-toolchain-binary");
        let err = go.run(Path::new("main.go")).unwrap_err();
        assert!(matches!(err, RenderError::ToolchainLaunch { .. }), "got: {err}");
    }

    #[test]
    fn combined_output_is_stdout_then_stderr() {
        let exec = Execution {
            status: Some(0),
            stdout: "out".into(),
            stderr: "err".into(),
            timed_out: false,
        };
        assert!(exec.success());
        assert_eq!(exec.combined(), "outerr");
    }

    #[cfg(unix)]
    #[test]
    fn captures_output_and_exit_status() {
        let sh = GoToolchain::new("sh").with_args(["-c", "echo hi; echo oops >&2; exit 3", "sh"]);
        let exec = sh.run(Path::new("ignored")).unwrap();
        assert_eq!(exec.status, Some(3));
        assert_eq!(exec.stdout, "hi\n");
        assert_eq!(exec.stderr, "oops\n");
        assert!(!exec.success());
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_forked_descendants() {
        let sh = GoToolchain::new("sh")
            .with_args(["-c", "sleep 5; echo late", "sh"])
            .with_timeout(Some(Duration::from_millis(100)));
        let started = Instant::now();
        let exec = sh.run(Path::new("ignored")).unwrap();
        assert!(started.elapsed() < Duration::from_secs(4));
        assert!(exec.timed_out);
        assert_eq!(exec.status, None);
        assert!(!exec.stdout.contains("late"));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_the_child() {
        let sh = GoToolchain::new("sh")
            .with_args(["-c", "exec sleep 5", "sh"])
            .with_timeout(Some(Duration::from_millis(100)));
        let started = Instant::now();
        let exec = sh.run(Path::new("ignored")).unwrap();
        assert!(exec.timed_out);
        assert_eq!(exec.status, None);
        assert!(exec.stderr.contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }
}
