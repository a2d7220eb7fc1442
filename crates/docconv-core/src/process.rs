//! Bounded invocation of external conversion tools.

use std::ffi::OsStr;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{ConvertError, FailureCause};

/// Hard wall-clock bound applied when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// What a successful (exit code 0) run left behind.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

/// Runs a tool as a child process with a hard timeout.
///
/// The tool gets its own process group. The timeout covers the whole run
/// (exit plus draining stdout and stderr), and when it expires every process
/// in the group is killed and the child is reaped before the call returns.
/// Anything still in the group when the call returns is killed as well, so
/// helpers the tool forked never outlive the job.
#[derive(Debug, Clone, Copy)]
pub struct ProcessInvoker {
    timeout: Duration,
}

impl Default for ProcessInvoker {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ProcessInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `program args...` and wait for it.
    ///
    /// `tool` is the human-readable name used in error messages and logs.
    /// Non-zero exits become [`ConvertError::ToolFailure`] carrying stderr;
    /// they are never retried.
    pub async fn run<I, S>(
        &self,
        tool: &'static str,
        program: impl AsRef<OsStr>,
        args: I,
    ) -> Result<ProcessOutput, ConvertError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = program.as_ref();
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.timeout;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|source| ConvertError::Spawn {
            tool,
            program: program.to_string_lossy().into_owned(),
            source,
        })?;
        let pid = child.id();
        let group = ProcessGroup::led_by(pid);
        debug!(tool, pid, "spawned conversion tool");

        // Drain both pipes concurrently so a chatty tool never blocks on a full pipe.
        let mut stdout_task = tokio::spawn(read_pipe(child.stdout.take()));
        let mut stderr_task = tokio::spawn(read_pipe(child.stderr.take()));

        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!(
                    tool,
                    pid,
                    timeout_secs = self.timeout.as_secs(),
                    "conversion tool exceeded timeout; killing"
                );
                group.kill();
                if let Err(e) = child.kill().await {
                    warn!(tool, pid, error = %e, "failed to kill timed-out conversion tool");
                }
                stdout_task.abort();
                stderr_task.abort();
                return Err(ConvertError::Timeout {
                    tool,
                    after: self.timeout,
                });
            }
        };

        // A forked helper can keep the pipes open after the tool itself exited.
        let drained = tokio::time::timeout_at(deadline, async {
            let stdout = (&mut stdout_task).await.unwrap_or_default();
            let stderr = (&mut stderr_task).await.unwrap_or_default();
            (stdout, stderr)
        })
        .await;
        let (stdout, stderr) = match drained {
            Ok(output) => output,
            Err(_) => {
                warn!(
                    tool,
                    pid,
                    exit_code = ?status.code(),
                    timeout_secs = self.timeout.as_secs(),
                    "conversion tool exceeded timeout; leftover processes held its output open"
                );
                group.kill();
                stdout_task.abort();
                stderr_task.abort();
                return Err(ConvertError::Timeout {
                    tool,
                    after: self.timeout,
                });
            }
        };
        let elapsed = started.elapsed();

        if !status.success() {
            let stderr = stderr.trim().to_owned();
            warn!(
                tool,
                pid,
                exit_code = ?status.code(),
                elapsed_ms = elapsed.as_millis(),
                stderr = %stderr,
                "conversion tool failed"
            );
            return Err(ConvertError::ToolFailure {
                tool,
                exit_code: status.code(),
                cause: FailureCause::classify(&stderr),
                stderr,
            });
        }

        debug!(tool, pid, elapsed_ms = elapsed.as_millis(), stdout = %stdout.trim(), "conversion tool finished");
        Ok(ProcessOutput {
            exit_code: status.code(),
            stdout,
            stderr,
            elapsed,
        })
    }
}

/// The process group the tool leads. Killed on drop.
struct ProcessGroup {
    pgid: Option<u32>,
}

impl ProcessGroup {
    fn led_by(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.filter(|&p| p > 0),
        }
    }

    /// SIGKILL every process still in the group.
    fn kill(&self) {
        if let Some(pgid) = self.pgid {
            kill_group(pgid);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: killpg only sends a signal and touches no memory.
    let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        // ESRCH: the whole group already exited.
        if err.raw_os_error() != Some(libc::ESRCH) {
            debug!(pgid, error = %err, "failed to signal tool process group");
        }
    }
}

// Without process groups only the direct child is killed (`kill_on_drop`).
#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            debug!(error = %e, "failed to read child pipe");
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
