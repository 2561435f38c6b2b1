//! Child processes with a deadline and bounded output.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes dropped past the output limit, per stream.
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    /// Stderr for error messages: lossy and trimmed.
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// One drained pipe: the kept prefix and how many bytes were dropped.
struct Drained {
    kept: Vec<u8>,
    dropped: usize,
}

type DrainHandle = thread::JoinHandle<Result<Drained>>;

/// Run `cmd` to completion or until `timeout`, whichever comes first.
///
/// Stdin is closed. Stdout and stderr are drained on reader threads while the
/// child runs, so a chatty child cannot deadlock on a full pipe. At most
/// `output_limit_bytes` per stream are kept; the rest is drained and counted.
/// On timeout the child is killed and reaped, and `timed_out` is set.
#[instrument(skip_all, fields(program = ?cmd.get_program(), timeout_ms = timeout.as_millis() as u64, output_limit_bytes))]
pub fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = cmd
        .spawn()
        .inspect_err(|err| error!(err = %err, "failed to spawn command"))
        .context("spawn command")?;

    let stdout = drain(child.stdout.take(), "stdout", output_limit_bytes)?;
    let stderr = drain(child.stderr.take(), "stderr", output_limit_bytes)?;

    let (status, timed_out) = wait_or_kill(&mut child, timeout)?;

    let stdout = collect(stdout, "stdout")?;
    let stderr = collect(stderr, "stderr")?;
    if stdout.dropped > 0 || stderr.dropped > 0 {
        warn!(
            stdout_truncated = stdout.dropped,
            stderr_truncated = stderr.dropped,
            "output truncated"
        );
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout: stdout.kept,
        stderr: stderr.kept,
        stdout_truncated: stdout.dropped,
        stderr_truncated: stderr.dropped,
        timed_out,
    })
}

fn drain<R>(pipe: Option<R>, label: &str, limit: usize) -> Result<DrainHandle>
where
    R: Read + Send + 'static,
{
    let pipe = pipe.ok_or_else(|| anyhow!("{label} was not piped"))?;
    Ok(thread::spawn(move || read_limited(pipe, limit)))
}

/// Wait for `child` up to `timeout`; past it, kill and reap.
fn wait_or_kill(child: &mut Child, timeout: Duration) -> Result<(ExitStatus, bool)> {
    if let Some(status) = child.wait_timeout(timeout).context("wait for command")? {
        return Ok((status, false));
    }
    warn!(timeout_ms = timeout.as_millis() as u64, "command timed out, killing");
    child.kill().context("kill command")?;
    let status = child.wait().context("wait command after kill")?;
    Ok((status, true))
}

fn collect(handle: DrainHandle, label: &str) -> Result<Drained> {
    handle
        .join()
        .map_err(|_| anyhow!("{label} reader thread panicked"))?
        .with_context(|| format!("read {label}"))
}

fn read_limited<R: Read>(mut reader: R, limit: usize) -> Result<Drained> {
    let mut drained = Drained {
        kept: Vec::new(),
        dropped: 0,
    };
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            return Ok(drained);
        }
        let keep = n.min(limit.saturating_sub(drained.kept.len()));
        drained.kept.extend_from_slice(&chunk[..keep]);
        drained.dropped += n - keep;
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_both_streams() {
        let out = run_with_timeout(sh("echo out; echo err >&2"), Duration::from_secs(10), 1024)
            .expect("run");
        assert!(out.status.success());
        assert_eq!(out.stdout, b"out\n");
        assert_eq!(out.stderr_text(), "err");
    }

    #[test]
    fn nonzero_exit_is_reported() {
        let out = run_with_timeout(sh("exit 3"), Duration::from_secs(10), 1024).expect("run");
        assert!(!out.timed_out);
        assert_eq!(out.status.code(), Some(3));
    }

    #[test]
    fn kills_on_timeout() {
        let out = run_with_timeout(sh("exec sleep 5"), Duration::from_millis(100), 1024).expect("run");
        assert!(out.timed_out);
        assert!(!out.status.success());
    }

    #[test]
    fn truncates_past_limit() {
        let out = run_with_timeout(sh("printf 'abcdefghij'"), Duration::from_secs(10), 4)
            .expect("run");
        assert_eq!(out.stdout, b"abcd");
        assert_eq!(out.stdout_truncated, 6);
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let err = run_with_timeout(
            Command::new("definitely-not-a-real-binary-1f3a"),
            Duration::from_secs(1),
            16,
        )
        .expect_err("spawn");
        assert!(format!("{err:#}").contains("spawn command"));
    }
}
