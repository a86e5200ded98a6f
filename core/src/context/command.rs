//! External command execution with a hard timeout

use std::io::Read;
use std::path::Path;
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::error::FacetError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured output of a finished command.
#[derive(Debug, Clone, Default)]
pub(crate) struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// First non-empty line of stdout, falling back to stderr.
    pub fn first_line(&self) -> Option<&str> {
        [self.stdout.as_str(), self.stderr.as_str()]
            .into_iter()
            .flat_map(str::lines)
            .map(str::trim)
            .find(|l| !l.is_empty())
    }
}

/// Run `program` with `args`, killing it if it outlives `timeout`.
///
/// Output pipes are drained on background threads so a chatty child can
/// never block on a full pipe while we poll for its exit.
///
/// # Errors
/// - [`FacetError::Io`] if the program cannot be spawned (e.g. not installed)
/// - [`FacetError::Timeout`] if it did not exit in time
/// - [`FacetError::CommandFailed`] on a non-zero exit status
pub(crate) fn run(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput, FacetError> {
    let label = command_label(program, args);
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let started = Instant::now();
    let mut child = command.spawn()?;
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None => {
                if started.elapsed() > timeout {
                    kill(&mut child);
                    return Err(FacetError::Timeout {
                        command: label,
                        timeout_ms: timeout.as_millis() as u64,
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
        }
    };

    let output = CommandOutput {
        stdout: join(stdout),
        stderr: join(stderr),
    };

    if status.success() {
        Ok(output)
    } else {
        Err(FacetError::CommandFailed {
            command: label,
            status: status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string()),
        })
    }
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

trait Pipe: Read + Send + 'static {}
impl Pipe for ChildStdout {}
impl Pipe for ChildStderr {}

fn drain<P: Pipe>(pipe: Option<P>) -> Option<JoinHandle<String>> {
    pipe.map(|mut p| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = p.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).into_owned()
        })
    })
}

fn join(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn command_label(program: &str, args: &[&str]) -> String {
    let mut parts = vec![program];
    parts.extend_from_slice(args);
    parts.join(" ")
}
