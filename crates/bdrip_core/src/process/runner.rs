//! Supervised child processes.
//!
//! A `SupervisedChild` owns the `Child` behind a mutex shared with an
//! optional watchdog thread. The watchdog kills the process once the
//! deadline passes; the owner polls for exit so it never blocks while
//! holding the lock.

use std::io::Read;
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use super::types::{ProcessError, ProcessResult};

/// How often the owner polls a running child for exit.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A running external process with an optional deadline.
///
/// Dropping a `SupervisedChild` that has not been waited on kills and reaps
/// the process.
pub struct SupervisedChild {
    tool: String,
    child: Arc<Mutex<Child>>,
    limit: Option<Duration>,
    timed_out: Arc<AtomicBool>,
    disarm_tx: Option<mpsc::Sender<()>>,
    watchdog: Option<JoinHandle<()>>,
    reaped: bool,
}

impl SupervisedChild {
    /// Spawn `cmd` and arm the watchdog when a limit is given.
    pub fn spawn(
        tool: impl Into<String>,
        cmd: &mut Command,
        limit: Option<Duration>,
    ) -> ProcessResult<Self> {
        let tool = tool.into();
        let child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            tool: tool.clone(),
            source,
        })?;

        let child = Arc::new(Mutex::new(child));
        let timed_out = Arc::new(AtomicBool::new(false));

        let (disarm_tx, watchdog) = match limit {
            Some(limit) => {
                let (tx, rx) = mpsc::channel::<()>();
                let child = Arc::clone(&child);
                let flag = Arc::clone(&timed_out);
                let tool_name = tool.clone();
                let handle = thread::spawn(move || {
                    if let Err(RecvTimeoutError::Timeout) = rx.recv_timeout(limit) {
                        tracing::warn!(
                            "{} exceeded its {}s limit, terminating",
                            tool_name,
                            limit.as_secs()
                        );
                        flag.store(true, Ordering::SeqCst);
                        let _ = child.lock().kill();
                    }
                });
                (Some(tx), Some(handle))
            }
            None => (None, None),
        };

        Ok(Self {
            tool,
            child,
            limit,
            timed_out,
            disarm_tx,
            watchdog,
            reaped: false,
        })
    }

    /// Tool name used in errors.
    pub fn tool(&self) -> &str {
        &self.tool
    }

    /// Take the child's stdin handle.
    pub fn take_stdin(&self) -> Option<ChildStdin> {
        self.child.lock().stdin.take()
    }

    /// Take the child's stdout handle.
    pub fn take_stdout(&self) -> Option<ChildStdout> {
        self.child.lock().stdout.take()
    }

    /// Take the child's stderr handle.
    pub fn take_stderr(&self) -> Option<ChildStderr> {
        self.child.lock().stderr.take()
    }

    /// Whether the watchdog has fired.
    pub fn timed_out(&self) -> bool {
        self.timed_out.load(Ordering::SeqCst)
    }

    /// Wait for the process to exit.
    ///
    /// Returns `ProcessError::Timeout` if the watchdog killed it.
    pub fn wait(mut self) -> ProcessResult<ExitStatus> {
        let status = self.poll_exit()?;
        self.reaped = true;
        self.disarm();

        if self.timed_out() {
            return Err(ProcessError::Timeout {
                tool: self.tool.clone(),
                secs: self.limit.map(|l| l.as_secs()).unwrap_or(0),
            });
        }
        Ok(status)
    }

    /// Kill and reap the process.
    pub fn kill(mut self) {
        self.terminate();
    }

    fn poll_exit(&self) -> ProcessResult<ExitStatus> {
        loop {
            let polled = self.child.lock().try_wait();
            match polled {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(ProcessError::io(&self.tool, "waiting for exit", e)),
            }
        }
    }

    fn terminate(&mut self) {
        if !self.reaped {
            let mut child = self.child.lock();
            let _ = child.kill();
            let _ = child.wait();
            self.reaped = true;
        }
        self.disarm();
    }

    fn disarm(&mut self) {
        // Dropping the sender wakes the watchdog with `Disconnected`.
        drop(self.disarm_tx.take());
        if let Some(handle) = self.watchdog.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SupervisedChild {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Output of a process run to completion.
#[derive(Debug)]
pub struct CapturedOutput {
    /// Exit status.
    pub status: ExitStatus,
    /// Everything written to stdout.
    pub stdout: Vec<u8>,
    /// Everything written to stderr.
    pub stderr: Vec<u8>,
}

impl CapturedOutput {
    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Exit code, or -1 when killed by a signal.
    pub fn exit_code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    /// Stdout decoded lossily.
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Stderr decoded lossily.
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }
}

/// Run a command to completion, capturing stdout and stderr.
///
/// Both streams are drained on background threads so a chatty tool can
/// never block on a full pipe.
pub fn run_captured(
    tool: &str,
    cmd: &mut Command,
    limit: Option<Duration>,
) -> ProcessResult<CapturedOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let child = SupervisedChild::spawn(tool, cmd, limit)?;
    let stdout = child.take_stdout().map(spawn_collect);
    let stderr = child.take_stderr().map(spawn_collect);

    // On timeout the collectors are detached: a grandchild may still hold
    // the pipes open.
    let status = child.wait()?;

    Ok(CapturedOutput {
        status,
        stdout: join_collect(stdout),
        stderr: join_collect(stderr),
    })
}

/// Drain a stream on a background thread, passing each line to `sink`.
///
/// Lines are split on `\n` and `\r` so progress output that rewrites a
/// single terminal line still arrives in pieces.
pub fn spawn_line_drain<R, F>(mut reader: R, mut sink: F) -> JoinHandle<()>
where
    R: Read + Send + 'static,
    F: FnMut(&str) + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = [0u8; 4096];
        let mut line = Vec::new();
        loop {
            let n = match reader.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            for &b in &buf[..n] {
                if b == b'\n' || b == b'\r' {
                    if !line.is_empty() {
                        sink(&String::from_utf8_lossy(&line));
                        line.clear();
                    }
                } else {
                    line.push(b);
                }
            }
        }
        if !line.is_empty() {
            sink(&String::from_utf8_lossy(&line));
        }
    })
}

fn spawn_collect<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn join_collect(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}
