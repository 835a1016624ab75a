//! Process-based runtime

use crate::error::RunError;
use crate::types::{Invocation, RunOutput};
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

const READ_CHUNK: usize = 8 * 1024;

/// Runs commands as plain child processes of this server.
///
/// Each child is started in its own process group so a timeout can kill the
/// whole tree (`go run` forks the compiled program as a grandchild).
pub struct ProcessRuntime {
    /// How long to keep reading pipes after the child is gone
    drain_grace: Duration,
}

impl ProcessRuntime {
    pub fn new() -> Self {
        Self {
            drain_grace: Duration::from_secs(2),
        }
    }

    pub fn with_drain_grace(drain_grace: Duration) -> Self {
        Self { drain_grace }
    }
}

impl Default for ProcessRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::Runtime for ProcessRuntime {
    async fn run(&self, invocation: &Invocation) -> RunOutput {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(&invocation.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let start = Instant::now();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(
                    program = %invocation.program,
                    error = %e,
                    "Failed to spawn process"
                );
                return RunOutput {
                    stdout: Vec::new(),
                    stderr: Vec::new(),
                    elapsed: start.elapsed(),
                    error: Some(RunError::Spawn {
                        program: invocation.program.clone(),
                        source: e,
                    }),
                };
            }
        };

        let pid = child.id();
        tracing::debug!(program = %invocation.program, pid = ?pid, "Process started");
        // kill_on_drop only reaches the direct child; this covers its descendants
        let group = GroupGuard::new(pid);

        let stdout = Collector::spawn(child.stdout.take());
        let stderr = Collector::spawn(child.stderr.take());

        let (status, timed_out) = match invocation.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => (status, None),
                Err(_) => {
                    tracing::warn!(
                        program = %invocation.program,
                        pid = ?pid,
                        timeout_ms = limit.as_millis() as u64,
                        "Process exceeded deadline, killing"
                    );
                    kill_tree(&mut child);
                    (child.wait().await, Some(limit))
                }
            },
            None => (child.wait().await, None),
        };
        let elapsed = start.elapsed();

        let ((stdout, stdout_done), (stderr, stderr_done)) = tokio::join!(
            stdout.finish(self.drain_grace),
            stderr.finish(self.drain_grace)
        );
        if stdout_done && stderr_done {
            group.disarm();
        } else {
            // a descendant outlived the child and still holds the pipes
            tracing::warn!(
                program = %invocation.program,
                pid = ?pid,
                "Output pipes still open after exit, killing process group"
            );
            drop(group);
        }

        let error = match (status, timed_out) {
            (_, Some(limit)) => Some(RunError::TimedOut { limit }),
            (Ok(status), None) => exit_error(status),
            (Err(e), None) => Some(RunError::Wait(e)),
        };

        tracing::debug!(
            program = %invocation.program,
            pid = ?pid,
            elapsed_ms = elapsed.as_millis() as u64,
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            error = ?error,
            "Process finished"
        );

        RunOutput {
            stdout,
            stderr,
            elapsed,
            error,
        }
    }

    fn name(&self) -> &str {
        "process"
    }
}

fn exit_error(status: ExitStatus) -> Option<RunError> {
    if status.success() {
        return None;
    }
    if let Some(code) = status.code() {
        return Some(RunError::Exit { code });
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Some(RunError::Signal { signal });
        }
    }
    Some(RunError::Exit { code: -1 })
}

fn kill_tree(child: &mut Child) {
    kill_group(child.id());
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "start_kill after group kill");
    }
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pgid = pid, error = %e, "Failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

/// Kills the child's process group when dropped while still armed, so a
/// cancelled run takes its grandchildren down with it.
struct GroupGuard {
    pid: Option<u32>,
}

impl GroupGuard {
    fn new(pid: Option<u32>) -> Self {
        Self { pid }
    }

    /// The group drained cleanly; nothing left to kill.
    fn disarm(mut self) {
        self.pid = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if self.pid.is_some() {
            kill_group(self.pid);
        }
    }
}

/// Reads one pipe to the end into a shared buffer, so whatever arrived
/// before an abort is still available.
struct Collector {
    buf: Arc<Mutex<Vec<u8>>>,
    task: Option<JoinHandle<()>>,
}

impl Collector {
    fn spawn<R>(reader: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let task = reader.map(|mut reader| {
            let buf = Arc::clone(&buf);
            tokio::spawn(async move {
                let mut chunk = vec![0u8; READ_CHUNK];
                loop {
                    match reader.read(&mut chunk).await {
                        Ok(0) => break,
                        Ok(n) => lock(&buf).extend_from_slice(&chunk[..n]),
                        Err(e) => {
                            tracing::debug!(error = %e, "Pipe read failed");
                            break;
                        }
                    }
                }
            })
        });
        Self { buf, task }
    }

    /// Wait up to `grace` for EOF. Returns the bytes read and whether the
    /// pipe reached EOF.
    async fn finish(mut self, grace: Duration) -> (Vec<u8>, bool) {
        let done = match self.task.take() {
            Some(mut task) => match tokio::time::timeout(grace, &mut task).await {
                Ok(_) => true,
                Err(_) => {
                    task.abort();
                    false
                }
            },
            None => true,
        };
        (std::mem::take(&mut *lock(&self.buf)), done)
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

fn lock(buf: &Mutex<Vec<u8>>) -> std::sync::MutexGuard<'_, Vec<u8>> {
    buf.lock().unwrap_or_else(|poison| poison.into_inner())
}
