//! Scoped execution of external tools.
//!
//! A spawned child is owned by a guard that kills and reaps it on every exit
//! path, so an early return or a timeout never leaks a running process.
//! Output pipes are drained on helper threads and surfaced together with the
//! exit code as one [`ProcessOutput`].

use serde::{Deserialize, Serialize};

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::{NavResult, NavigatorError};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// An executable plus arguments that always precede the rendered ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalTool {
    pub program: PathBuf,
    #[serde(default)]
    pub prefix_args: Vec<String>,
}

impl ExternalTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    pub fn with_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn command_line(&self, args: &[String]) -> Vec<String> {
        std::iter::once(self.program.to_string_lossy().to_string())
            .chain(self.prefix_args.iter().cloned())
            .chain(args.iter().cloned())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    pub cwd: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl ProcessOptions {
    pub fn new(cwd: Option<&Path>, timeout: Option<Duration>) -> Self {
        Self {
            cwd: cwd.map(Path::to_path_buf),
            timeout,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutput {
    pub command: Vec<String>,
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed_ms: u64,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }

    pub fn combined_output(&self) -> String {
        let stdout = self.stdout.trim();
        let stderr = self.stderr.trim();
        match (stdout.is_empty(), stderr.is_empty()) {
            (true, _) => stderr.to_string(),
            (_, true) => stdout.to_string(),
            _ => format!("{stdout}\n{stderr}"),
        }
    }

    /// Converts a non-zero exit into [`NavigatorError::Process`].
    pub fn into_checked(self) -> NavResult<Self> {
        if self.success() {
            return Ok(self);
        }
        Err(NavigatorError::Process {
            command: self.command_line(),
            exit_code: self.exit_code,
            output: self.combined_output(),
        })
    }
}

struct ChildGuard {
    child: Child,
}

impl ChildGuard {
    fn wait(&mut self, timeout: Option<Duration>) -> NavResult<Option<ExitStatus>> {
        let Some(limit) = timeout else {
            return Ok(Some(self.child.wait()?));
        };
        let deadline = Instant::now() + limit;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// The child leads its own process group, so this also reaches
    /// grandchildren such as the commands of a wrapper script.
    #[cfg(unix)]
    fn kill_group(&self) {
        if let Ok(pgid) = libc::pid_t::try_from(self.child.id()) {
            // SAFETY: kill(2) only delivers a signal and reads no memory.
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        #[cfg(unix)]
        self.kill_group();
        if let Ok(None) = self.child.try_wait() {
            let _ = self.child.kill();
        }
        let _ = self.child.wait();
    }
}

/// Runs `tool args...` to completion and returns its output whatever the
/// exit code. Use [`run_checked`] to fail on a non-zero exit.
pub fn run_process(
    tool: &ExternalTool,
    args: &[String],
    options: &ProcessOptions,
) -> NavResult<ProcessOutput> {
    let command = tool.command_line(args);
    let rendered = command.join(" ");

    let mut cmd = Command::new(&tool.program);
    cmd.args(&tool.prefix_args)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt as _;
        cmd.process_group(0);
    }

    tracing::debug!(command = %rendered, "spawning external tool");
    let started = Instant::now();
    let child = cmd.spawn().map_err(|err| NavigatorError::Process {
        command: rendered.clone(),
        exit_code: None,
        output: format!("failed to spawn: {err}"),
    })?;
    let mut guard = ChildGuard { child };
    let stdout = guard.child.stdout.take().map(drain);
    let stderr = guard.child.stderr.take().map(drain);

    let Some(status) = guard.wait(options.timeout)? else {
        drop(guard);
        tracing::warn!(command = %rendered, "external tool timed out");
        return Err(NavigatorError::Timeout {
            command: rendered,
            timeout_secs: options.timeout.map(|t| t.as_secs_f64()).unwrap_or_default(),
        });
    };
    drop(guard);

    let output = ProcessOutput {
        command,
        exit_code: status.code(),
        stdout: stdout.map(join_output).unwrap_or_default(),
        stderr: stderr.map(join_output).unwrap_or_default(),
        elapsed_ms: started.elapsed().as_millis() as u64,
    };
    tracing::debug!(
        command = %rendered,
        exit_code = ?output.exit_code,
        elapsed_ms = output.elapsed_ms,
        "external tool finished"
    );
    Ok(output)
}

pub fn run_checked(
    tool: &ExternalTool,
    args: &[String],
    options: &ProcessOptions,
) -> NavResult<ProcessOutput> {
    run_process(tool, args, options)?.into_checked()
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_output(handle: JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}
