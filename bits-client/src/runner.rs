//! Process execution with a hard deadline.
//!
//! [`CommandRunner`] is the seam between the client and the OS: the client
//! only ever asks for "run this program with these arguments, give up after
//! this long". [`ProcessRunner`] is the real implementation; tests swap in
//! [`crate::mock::MockRunner`].

use crate::error::{BitsError, Result};
use bits_common::render_command_line;
use std::io::Read;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Captured result of one finished invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output and standard error, interleaved as written.
    pub output: String,
    /// `None` when the process was ended by a signal.
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs one external program per call.
///
/// Implementations must not retry, and must not treat a non-zero exit as an
/// error: that decision belongs to the caller. Exceeding `timeout` must end
/// the process and return [`BitsError::Timeout`].
pub trait CommandRunner {
    fn run(&self, program: &Path, args: &[String], timeout: Duration) -> Result<CommandOutput>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, program: &Path, args: &[String], timeout: Duration) -> Result<CommandOutput> {
        (**self).run(program, args, timeout)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for Arc<R> {
    fn run(&self, program: &Path, args: &[String], timeout: Duration) -> Result<CommandOutput> {
        (**self).run(program, args, timeout)
    }
}

impl<R: CommandRunner + ?Sized> CommandRunner for Box<R> {
    fn run(&self, program: &Path, args: &[String], timeout: Duration) -> Result<CommandOutput> {
        (**self).run(program, args, timeout)
    }
}

/// Spawns real OS processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    poll_interval: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// How often to check whether the child has exited.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }
}

/// Minimum wait for the output pipe to close once the child has exited.
const DRAIN_GRACE: Duration = Duration::from_millis(50);

/// Kill the child and everything in its process group, then reap it.
fn terminate(child: &mut Child) {
    #[cfg(unix)]
    if let Ok(pgid) = i32::try_from(child.id()) {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;
        let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
    }
    let _ = child.kill();
    let _ = child.wait();
}

impl CommandRunner for ProcessRunner {
    fn run(&self, program: &Path, args: &[String], timeout: Duration) -> Result<CommandOutput> {
        let program_display = program.display().to_string();
        debug!(command = %render_command_line(program, args), ?timeout, "spawning");

        // One pipe for both streams so status text keeps its original order.
        let (mut reader, writer) = std::io::pipe()?;
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(writer.try_clone()?)
            .stderr(writer);
        // Own group, so a timeout also reaches anything the binary forked.
        #[cfg(unix)]
        cmd.process_group(0);

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| BitsError::Spawn {
            program: program_display.clone(),
            source,
        })?;
        // The Command still owns our copies of the write end; the reader only
        // sees EOF once they are closed.
        drop(cmd);

        let pid = child.id();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = reader.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });

        let timed_out = |child: &mut Child, reason: &str| {
            terminate(child);
            warn!(program = %program_display, pid, ?timeout, reason, "command timed out, killed");
            BitsError::Timeout {
                program: program_display.clone(),
                timeout,
                pid,
            }
        };

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(timed_out(&mut child, "process still running"));
            }
            thread::sleep(self.poll_interval.min(timeout - elapsed));
        };

        // A background process left behind may still hold the pipe open.
        let remaining = timeout.saturating_sub(start.elapsed()).max(DRAIN_GRACE);
        let bytes = match rx.recv_timeout(remaining) {
            Ok(bytes) => bytes,
            Err(RecvTimeoutError::Timeout) => {
                return Err(timed_out(&mut child, "output still open after exit"));
            }
            Err(RecvTimeoutError::Disconnected) => Vec::new(),
        };
        let duration = start.elapsed();
        let output = String::from_utf8_lossy(&bytes).into_owned();
        debug!(
            program = %program_display,
            exit_code = ?status.code(),
            duration_ms = duration.as_millis() as u64,
            output_bytes = bytes.len(),
            "command finished"
        );

        Ok(CommandOutput {
            output,
            exit_code: status.code(),
            duration,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn test_captures_stdout_and_stderr() {
        let runner = ProcessRunner::new();
        let out = runner
            .run(Path::new("sh"), &sh("echo out; echo err 1>&2"), Duration::from_secs(10))
            .unwrap();
        assert!(out.success());
        assert!(out.output.contains("out"));
        assert!(out.output.contains("err"));
    }

    #[test]
    fn test_streams_keep_write_order() {
        let runner = ProcessRunner::new();
        let out = runner
            .run(
                Path::new("sh"),
                &sh("echo first; echo second 1>&2; echo third"),
                Duration::from_secs(10),
            )
            .unwrap();
        assert_eq!(out.output, "first\nsecond\nthird\n");
    }

    #[test]
    fn test_nonzero_exit_is_not_an_error() {
        let runner = ProcessRunner::new();
        let out = runner
            .run(Path::new("sh"), &sh("echo failing; exit 3"), Duration::from_secs(10))
            .unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert!(!out.success());
        assert_eq!(out.output, "failing\n");
    }

    #[test]
    fn test_arguments_are_not_shell_split() {
        let runner = ProcessRunner::new();
        let out = runner
            .run(
                Path::new("printf"),
                &["%s|".to_string(), "a b".to_string(), "c".to_string()],
                Duration::from_secs(10),
            )
            .unwrap();
        assert_eq!(out.output, "a b|c|");
    }

    #[test]
    fn test_missing_binary_is_spawn_error() {
        let runner = ProcessRunner::new();
        let err = runner
            .run(Path::new("/definitely/not/a/binary"), &[], Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, BitsError::Spawn { .. }));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_timeout_kills_process() {
        let runner = ProcessRunner::new();
        let start = Instant::now();
        let err = runner
            .run(Path::new("sleep"), &["5".to_string()], Duration::from_millis(10))
            .unwrap_err();
        assert!(start.elapsed() < Duration::from_secs(4));
        let BitsError::Timeout { timeout, .. } = err else {
            panic!("expected timeout, got {err:?}");
        };
        assert_eq!(timeout, Duration::from_millis(10));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_timed_out_pid_is_reaped() {
        let runner = ProcessRunner::new();
        let err = runner
            .run(Path::new("sleep"), &["5".to_string()], Duration::from_millis(10))
            .unwrap_err();
        let BitsError::Timeout { pid, .. } = err else {
            panic!("expected timeout, got {err:?}");
        };
        assert!(
            !Path::new(&format!("/proc/{pid}")).exists(),
            "child {pid} still present after timeout"
        );
    }

    #[test]
    fn test_background_child_holding_output_is_bounded() {
        let runner = ProcessRunner::new();
        let start = Instant::now();
        let err = runner
            .run(Path::new("sh"), &sh("sleep 4 & echo started"), Duration::from_millis(500))
            .unwrap_err();
        assert!(
            start.elapsed() < Duration::from_secs(3),
            "run took {:?} with a 500ms timeout",
            start.elapsed()
        );
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }
}
