//! Shell out to the external test harness.

use std::io::Read;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

/// Exit code reported for a timed-out harness run, matching `timeout(1)`.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Raw outcome of one test-harness invocation.
#[derive(Debug, Clone)]
pub struct TestRunResult {
    /// Exit code, `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,

    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,

    /// How long the command ran.
    pub duration: Duration,
}

impl TestRunResult {
    /// Did the harness exit cleanly?
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run a shell command in `cwd`, capturing output, killing it at `timeout`.
///
/// A timed-out run is not an error: it comes back as exit code 124 with
/// empty stdout and stderr `"TIMEOUT"`, to be scored like any failing run.
/// Only failure to spawn the shell itself is reported as `Err`.
pub fn run_test_command(cmd: &str, cwd: &Path, timeout: Duration) -> Result<TestRunResult> {
    let start = Instant::now();

    let mut child = shell_command(cmd)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("failed to run test command {cmd:?} in {cwd:?}"))?;

    let stdout_reader = drain_pipe(child.stdout.take());
    let stderr_reader = drain_pipe(child.stderr.take());

    loop {
        if let Some(status) = child
            .try_wait()
            .with_context(|| format!("failed to wait for test command {cmd:?}"))?
        {
            let duration = start.elapsed();
            return Ok(TestRunResult {
                exit_code: status.code(),
                stdout: join_pipe(stdout_reader),
                stderr: join_pipe(stderr_reader),
                duration,
            });
        }

        if start.elapsed() >= timeout {
            kill_process_tree(&mut child);
            // Drop the readers; a timed-out run reports no captured output.
            let _ = join_pipe(stdout_reader);
            let _ = join_pipe(stderr_reader);
            return Ok(TestRunResult {
                exit_code: Some(TIMEOUT_EXIT_CODE),
                stdout: String::new(),
                stderr: "TIMEOUT".to_string(),
                duration: start.elapsed(),
            });
        }

        thread::sleep(Duration::from_millis(10));
    }
}

#[cfg(unix)]
fn shell_command(cmd: &str) -> Command {
    let mut c = Command::new("sh");
    c.arg("-c").arg(cmd);
    // Run the shell as its own process group leader, so a timeout kill can
    // reach everything it forked, not just the wrapper.
    c.process_group(0);
    c
}

#[cfg(windows)]
fn shell_command(cmd: &str) -> Command {
    let mut c = Command::new("cmd");
    c.arg("/C").arg(cmd);
    c
}

/// Kill the child and everything it spawned.
///
/// The shell forks for compound commands; killing only the wrapper leaves a
/// grandchild holding the output pipes, which would block the reader threads
/// until the orphan exits on its own.
fn kill_process_tree(child: &mut Child) {
    #[cfg(unix)]
    unsafe {
        // The child is its own process group leader, see `shell_command`.
        let _ = libc::killpg(child.id() as libc::pid_t, libc::SIGKILL);
    }
    let _ = child.kill();
    let _ = child.wait();
}

fn drain_pipe<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    let mut pipe = pipe?;
    Some(thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).to_string()
    }))
}

fn join_pipe(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}
