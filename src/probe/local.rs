//! Probe run as a local shell process.
//!
//! Used when the verifier host can reach the observed system directly
//! (`settle digest --local`). The process is bounded by the same deadline
//! as everything else and is killed when it runs out.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

use crate::deadline::Deadline;
use crate::error::SettleError;
use crate::models::PodPhase;

use super::{ProbeRun, ProbeRunner, ProbeSpec};

/// How often a running probe checks for cancellation.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Maximum probe output kept (1MB)
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

const TRUNCATION_MARKER: &str = "\n[output truncated at 1MB]";

/// Runs the probe command with `sh -c` on this host.
#[derive(Debug, Clone, Default)]
pub struct LocalProbeRunner {
    shell: Option<String>,
}

impl LocalProbeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific shell instead of `sh`.
    pub fn with_shell(shell: &str) -> Self {
        Self {
            shell: Some(shell.to_string()),
        }
    }

    fn spawn(&self, spec: &ProbeSpec) -> std::io::Result<Child> {
        Command::new(self.shell.as_deref().unwrap_or("sh"))
            .arg("-c")
            .arg(&spec.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
    }
}

enum Waited {
    Exited(ExitStatus),
    Expired,
}

impl ProbeRunner for LocalProbeRunner {
    fn run_probe(&self, spec: &ProbeSpec, deadline: &Deadline) -> Result<ProbeRun, SettleError> {
        let launch_error = |message: String| SettleError::ProbeLaunch {
            probe: spec.identity.clone(),
            message,
        };

        if deadline.is_done() {
            return Err(expired(spec, deadline, 0, RUNNING));
        }

        tracing::info!(probe = %spec.identity, "running probe locally");
        let mut child = self.spawn(spec).map_err(|e| launch_error(e.to_string()))?;

        // Drain the pipes while waiting so a chatty probe can't block on a
        // full pipe buffer.
        let stdout_rx = drain(child.stdout.take());
        let stderr_rx = drain(child.stderr.take());

        let mut checks: u32 = 0;
        let waited = loop {
            if deadline.is_done() {
                break Waited::Expired;
            }
            checks += 1;
            let slice = deadline.remaining().min(CANCEL_CHECK_INTERVAL);
            match child.wait_timeout(slice) {
                Ok(Some(status)) => break Waited::Exited(status),
                Ok(None) => {}
                Err(e) => {
                    kill_child_process(&mut child);
                    return Err(launch_error(e.to_string()));
                }
            }
        };

        let status = match waited {
            Waited::Exited(status) => status,
            Waited::Expired => {
                kill_child_process(&mut child);
                return Err(expired(spec, deadline, checks, RUNNING));
            }
        };

        // A background process started by the probe can hold the pipes open
        // after the shell exits; collection is bounded by the same deadline.
        let output = collect(&stdout_rx, spec, deadline, checks)?;
        let stderr = collect(&stderr_rx, spec, deadline, checks)?;
        if output.ends_with(TRUNCATION_MARKER) {
            tracing::warn!(probe = %spec.identity, limit = MAX_OUTPUT_SIZE, "probe output truncated");
        }
        if !stderr.is_empty() {
            tracing::debug!(probe = %spec.identity, stderr = %stderr.trim_end(), "probe stderr");
        }

        let phase = if status.success() {
            PodPhase::Succeeded
        } else {
            tracing::debug!(probe = %spec.identity, code = ?status.code(), "probe exited unsuccessfully");
            PodPhase::Failed
        };

        Ok(ProbeRun { phase, output })
    }
}

const RUNNING: &str = "process still running";
const PIPE_OPEN: &str = "exited, output still open";

fn expired(spec: &ProbeSpec, deadline: &Deadline, checks: u32, state: &str) -> SettleError {
    if deadline.is_cancelled() {
        SettleError::Cancelled {
            identity: spec.identity.clone(),
            description: super::pod::PROBE_TERMINATED.to_string(),
        }
    } else {
        SettleError::Timeout {
            identity: spec.identity.clone(),
            description: super::pod::PROBE_TERMINATED.to_string(),
            last_state: state.to_string(),
            attempts: checks,
        }
    }
}

/// Wait for a drained stream, giving up when the deadline is done.
fn collect(
    rx: &mpsc::Receiver<String>,
    spec: &ProbeSpec,
    deadline: &Deadline,
    mut checks: u32,
) -> Result<String, SettleError> {
    loop {
        if deadline.is_done() {
            return Err(expired(spec, deadline, checks, PIPE_OPEN));
        }
        checks += 1;
        let slice = deadline.remaining().min(CANCEL_CHECK_INTERVAL);
        match rx.recv_timeout(slice) {
            Ok(text) => return Ok(text),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(String::new()),
        }
    }
}

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    match stream {
        Some(stream) => {
            thread::spawn(move || {
                let _ = tx.send(read_stream_to_string(stream));
            });
        }
        None => {
            let _ = tx.send(String::new());
        }
    }
    rx
}

/// Read a stream to string, keeping at most `MAX_OUTPUT_SIZE` bytes and
/// marking the cut when there was more.
fn read_stream_to_string<R: Read>(mut stream: R) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let to_copy = n.min(MAX_OUTPUT_SIZE.saturating_sub(buf.len()));
                buf.extend_from_slice(&chunk[..to_copy]);
                if to_copy < n {
                    buf.extend_from_slice(TRUNCATION_MARKER.as_bytes());
                    // Keep draining so the child never sees a broken pipe.
                    while stream.read(&mut chunk).unwrap_or(0) > 0 {}
                    break;
                }
            }
            Err(_) => break,
        }
    }

    String::from_utf8_lossy(&buf).to_string()
}

fn kill_child_process(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deadline::CancelToken;
    use crate::models::Identity;
    use std::io::Cursor;
    use std::time::Instant;

    fn spec(command: &str) -> ProbeSpec {
        ProbeSpec::new(
            Identity::new("local", "probe").unwrap(),
            "",
            "sh",
            command.to_string(),
        )
    }

    #[test]
    fn test_captures_stdout() {
        let run = LocalProbeRunner::new()
            .run_probe(&spec("echo '\"sha256:abc\"'"), &Deadline::after(Duration::from_secs(10)))
            .unwrap();
        assert_eq!(run.phase, PodPhase::Succeeded);
        assert_eq!(run.output, "\"sha256:abc\"\n");
    }

    #[test]
    fn test_nonzero_exit_is_failed_phase() {
        let run = LocalProbeRunner::new()
            .run_probe(&spec("echo partial; exit 3"), &Deadline::after(Duration::from_secs(10)))
            .unwrap();
        assert_eq!(run.phase, PodPhase::Failed);
        assert_eq!(run.output, "partial\n");
    }

    #[test]
    fn test_killed_at_deadline() {
        let start = Instant::now();
        let err = LocalProbeRunner::new()
            .run_probe(&spec("sleep 30"), &Deadline::after(Duration::from_millis(200)))
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cancelled_while_running() {
        let token = CancelToken::new();
        let deadline = Deadline::with_token(Duration::from_secs(60), token.clone());
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            token.cancel();
        });

        let start = Instant::now();
        let err = LocalProbeRunner::new()
            .run_probe(&spec("sleep 30"), &deadline)
            .unwrap_err();
        assert!(matches!(err, SettleError::Cancelled { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
        canceller.join().unwrap();
    }

    #[test]
    fn test_missing_shell_is_launch_error() {
        let err = LocalProbeRunner::with_shell("/nonexistent/shell")
            .run_probe(&spec("true"), &Deadline::after(Duration::from_secs(5)))
            .unwrap_err();
        assert!(matches!(err, SettleError::ProbeLaunch { .. }));
    }

    #[test]
    fn test_read_stream_truncates_at_limit() {
        let data = vec![b'x'; MAX_OUTPUT_SIZE + 1000];
        let result = read_stream_to_string(Cursor::new(data));
        assert_eq!(result.len(), MAX_OUTPUT_SIZE + TRUNCATION_MARKER.len());
        assert!(result.ends_with("[output truncated at 1MB]"));
    }

    #[test]
    fn test_read_stream_under_limit_is_untouched() {
        let result = read_stream_to_string(Cursor::new(b"sha256:abc\n".to_vec()));
        assert_eq!(result, "sha256:abc\n");
    }

    #[test]
    fn test_background_process_holding_pipe_times_out() {
        let start = Instant::now();
        let err = LocalProbeRunner::new()
            .run_probe(
                &spec("sleep 5 & echo sha256:abc"),
                &Deadline::after(Duration::from_millis(500)),
            )
            .unwrap_err();
        match err {
            SettleError::Timeout { last_state, .. } => assert_eq!(last_state, PIPE_OPEN),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[test]
    fn test_cancelled_while_collecting_output() {
        let token = CancelToken::new();
        let deadline = Deadline::with_token(Duration::from_secs(60), token.clone());
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            token.cancel();
        });

        let start = Instant::now();
        let err = LocalProbeRunner::new()
            .run_probe(&spec("sleep 5 & echo sha256:abc"), &deadline)
            .unwrap_err();
        assert!(err.is_cancelled(), "unexpected error: {err:?}");
        assert!(start.elapsed() < Duration::from_secs(3));
        canceller.join().unwrap();
    }
}
