//! Process runner.
//!
//! Spawns a variant, writes one encoded input to its stdin and closes it,
//! and captures stdout byte-for-byte. With a deadline, a child still running
//! when the deadline passes is killed and reaped, and the result is marked
//! `timed_out`; its exit status is then not meaningful.
//!
//! The deadline also bounds output collection. Subprocesses a variant left
//! behind may hold its stdout or stderr open after it exits; such a run is
//! treated as hung and only the bytes read so far are kept.

use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;

use crate::build::Variant;
use crate::fixture::Input;

/// Interval between liveness checks while a deadline is armed.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How long output pipes may stay open once a timed-out child has been killed.
const DRAIN_GRACE: Duration = Duration::from_millis(100);

/// Failure to drive a child process at all (as opposed to the child failing).
#[derive(Debug, Clone, Error)]
pub enum RunError {
    #[error("failed to start '{program}': {message}")]
    Spawn { program: String, message: String },
    #[error("I/O error while running '{program}': {message}")]
    Io { program: String, message: String },
}

/// Everything observed from one run of one variant on one input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionResult {
    /// Raw stdout bytes, uninterpreted.
    pub stdout: Vec<u8>,
    /// Raw stderr bytes. Never compared, kept for diagnostics.
    pub stderr: Vec<u8>,
    /// Exit code; `128 + signal` when the child was killed by a signal.
    pub exit_code: i32,
    /// Terminating signal, on platforms that have them.
    pub signal: Option<i32>,
    pub elapsed: Duration,
    pub timed_out: bool,
}

impl ExecutionResult {
    /// Ran to completion and exited 0.
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.exit_code == 0
    }
}

/// Run `variant` on `input`, optionally bounded by `deadline`.
pub fn execute(
    variant: &Variant,
    input: Input,
    deadline: Option<Duration>,
) -> Result<ExecutionResult, RunError> {
    let _span = tracing::debug_span!("execute", role = %variant.role(), %input).entered();
    run_program(variant.executable(), input.encode().as_bytes(), deadline)
}

/// Run `program` with `stdin` as its entire input.
pub fn run_program(
    program: &Path,
    stdin: &[u8],
    deadline: Option<Duration>,
) -> Result<ExecutionResult, RunError> {
    let name = program.display().to_string();
    let start = Instant::now();

    let mut child = Command::new(program)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| RunError::Spawn {
            program: name.clone(),
            message: e.to_string(),
        })?;

    let stdin_pipe = child.stdin.take();
    let payload = stdin.to_vec();
    std::thread::spawn(move || {
        if let Some(mut pipe) = stdin_pipe {
            // A child may exit without reading; a broken pipe is not our failure.
            let _ = pipe.write_all(&payload);
        }
    });
    let stdout_reader = PipeReader::spawn(child.stdout.take());
    let stderr_reader = PipeReader::spawn(child.stderr.take());

    // A deadline too far out to represent is no deadline.
    let expires = deadline.and_then(|limit| start.checked_add(limit));
    let waited = match (expires, deadline) {
        (Some(at), Some(limit)) => wait_with_deadline(&mut child, at, limit),
        _ => child.wait().map(|status| (status, false)),
    };
    let (status, mut timed_out) = match waited {
        Ok(done) => done,
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RunError::Io {
                program: name,
                message: e.to_string(),
            });
        }
    };

    let drain_until = if timed_out {
        Some(Instant::now() + DRAIN_GRACE)
    } else {
        expires.map(|at| at.max(Instant::now() + DRAIN_GRACE))
    };
    let io_error = |e: io::Error| RunError::Io {
        program: name.clone(),
        message: e.to_string(),
    };
    let (stdout, stdout_closed) = stdout_reader.finish(drain_until).map_err(io_error)?;
    let (stderr, stderr_closed) = stderr_reader.finish(drain_until).map_err(io_error)?;
    if !(stdout_closed && stderr_closed) && !timed_out {
        tracing::warn!(program = %name, "output still open at deadline, abandoning subprocesses");
        timed_out = true;
    }

    let signal = exit_signal(status);
    let exit_code = status
        .code()
        .unwrap_or_else(|| signal.map_or(1, |s| 128 + s));
    let elapsed = start.elapsed();

    tracing::debug!(
        program = %name,
        exit_code,
        timed_out,
        stdout_bytes = stdout.len(),
        elapsed_ms = elapsed.as_secs_f64() * 1000.0,
        "process finished"
    );

    Ok(ExecutionResult {
        stdout,
        stderr,
        exit_code,
        signal,
        elapsed,
        timed_out,
    })
}

/// Poll until the child exits or `expires` passes; on expiry kill and reap it.
fn wait_with_deadline(
    child: &mut Child,
    expires: Instant,
    limit: Duration,
) -> io::Result<(ExitStatus, bool)> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status, false));
        }
        if Instant::now() >= expires {
            tracing::warn!(pid = child.id(), ?limit, "deadline expired, killing child");
            // The child may exit on its own between the check and the kill.
            let _ = child.kill();
            let status = child.wait()?;
            return Ok((status, true));
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}

/// Collects one output pipe on a background thread.
///
/// Bytes are visible as they arrive, so a reader that never sees
/// end-of-stream can be abandoned without losing what was already read.
struct PipeReader {
    bytes: Arc<Mutex<Vec<u8>>>,
    done: Receiver<io::Result<()>>,
}

impl PipeReader {
    fn spawn<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let bytes = Arc::new(Mutex::new(Vec::new()));
        let (tx, done) = mpsc::channel();
        let sink = Arc::clone(&bytes);
        std::thread::spawn(move || {
            let result = match pipe {
                Some(mut pipe) => copy_into(&mut pipe, &sink),
                None => Ok(()),
            };
            let _ = tx.send(result);
        });
        PipeReader { bytes, done }
    }

    /// Wait for end-of-stream, until `until` if given. Returns the bytes read
    /// and whether the pipe was closed.
    fn finish(self, until: Option<Instant>) -> io::Result<(Vec<u8>, bool)> {
        let outcome = match until {
            Some(at) => self
                .done
                .recv_timeout(at.saturating_duration_since(Instant::now()))
                .ok(),
            None => self.done.recv().ok(),
        };
        let bytes = std::mem::take(&mut *self.bytes.lock());
        match outcome {
            Some(Err(e)) => Err(e),
            Some(Ok(())) => Ok((bytes, true)),
            None => Ok((bytes, false)),
        }
    }
}

fn copy_into(pipe: &mut impl Read, sink: &Mutex<Vec<u8>>) -> io::Result<()> {
    let mut chunk = [0u8; 8192];
    loop {
        match pipe.read(&mut chunk) {
            Ok(0) => return Ok(()),
            Ok(n) => sink.lock().extend_from_slice(&chunk[..n]),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt as _;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> Option<i32> {
    None
}

#[cfg(all(test, unix))]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests;
