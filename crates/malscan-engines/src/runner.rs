//! Subprocess execution with an enforced wall-clock budget.
//!
//! Every engine invocation (scan, version query, update check, update) goes
//! through a [`ProcessRunner`]. Commands are argument vectors handed straight
//! to `execve`; no shell ever sees an attacker-influenced path.

use async_trait::async_trait;
use malscan_core::{EngineError, RawScanOutput};
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Default budget for a single engine invocation.
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(15);

/// A fully specified command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    /// Binary to execute
    pub program: PathBuf,
    /// Arguments, passed verbatim
    pub args: Vec<OsString>,
    /// Wall-clock budget; the process is killed when it elapses
    pub timeout: Duration,
}

impl ProcessSpec {
    /// Create a spec with no arguments and the default timeout
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_PROCESS_TIMEOUT,
        }
    }

    /// Append one argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program path for logs and error messages
    #[must_use]
    pub fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

/// Errors from running a subprocess
#[derive(Error, Debug)]
pub enum RunError {
    /// Process exceeded its budget and was killed
    #[error("{program} timed out after {timeout:?}")]
    Timeout {
        program: String,
        timeout: Duration,
    },

    /// Process could not be started
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading output or waiting for exit failed
    #[error("i/o error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<RunError> for EngineError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Timeout { program, timeout } => Self::ProcessTimeout { program, timeout },
            RunError::Spawn { program, source } => Self::Spawn { program, source },
            RunError::Io { program, source } => Self::Io { program, source },
        }
    }
}

/// Executes external commands under a timeout.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run `spec` to completion or until its timeout elapses.
    ///
    /// Implementations must not leave the process running after returning,
    /// whether they return `Ok` or `Err`.
    async fn run(&self, spec: &ProcessSpec) -> Result<RawScanOutput, RunError>;
}

/// [`ProcessRunner`] backed by `tokio::process`.
///
/// Children are spawned with `kill_on_drop`, so dropping the `run` future
/// (for example when the orchestrator aborts a task at its deadline) also
/// terminates the process.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioProcessRunner;

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    async fn run(&self, spec: &ProcessSpec) -> Result<RawScanOutput, RunError> {
        let program = spec.program_name();
        let start = Instant::now();

        let mut child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunError::Spawn {
                program: program.clone(),
                source,
            })?;

        debug!(program = %program, pid = child.id(), timeout = ?spec.timeout, "spawned process");

        let outcome = tokio::time::timeout(spec.timeout, collect_output(&mut child)).await;

        match outcome {
            Ok(Ok((status, stdout, stderr))) => {
                let elapsed = start.elapsed();
                debug!(program = %program, code = ?status.code(), ?elapsed, "process exited");
                Ok(RawScanOutput {
                    stdout,
                    stderr,
                    exit_code: status.code(),
                    elapsed,
                })
            }
            Ok(Err(source)) => {
                terminate(&mut child, &program).await;
                Err(RunError::Io { program, source })
            }
            Err(_) => {
                warn!(program = %program, timeout = ?spec.timeout, "process timed out, killing");
                terminate(&mut child, &program).await;
                Err(RunError::Timeout {
                    program,
                    timeout: spec.timeout,
                })
            }
        }
    }
}

/// Drain both pipes concurrently, then reap the child.
async fn collect_output(child: &mut Child) -> std::io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (stdout, stderr) = tokio::try_join!(read_pipe(stdout), read_pipe(stderr))?;
    let status = child.wait().await?;
    Ok((status, stdout, stderr))
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Kill and reap. Only the direct child is signalled.
async fn terminate(child: &mut Child, program: &str) {
    if let Err(e) = child.kill().await {
        debug!(program, error = %e, "kill failed (process already exited?)");
    }
}

#[cfg(test)]
pub(crate) mod scripted {
    //! Recording runner with canned responses, for adapter tests.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    pub(crate) struct ScriptedRunner {
        responses: Mutex<VecDeque<Result<RawScanOutput, RunError>>>,
        calls: Mutex<Vec<ProcessSpec>>,
    }

    impl ScriptedRunner {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Queue a successful run with the given stdout and exit code.
        pub(crate) fn respond(self, stdout: &str, exit_code: i32) -> Self {
            self.responses.lock().unwrap().push_back(Ok(RawScanOutput {
                stdout: stdout.as_bytes().to_vec(),
                stderr: Vec::new(),
                exit_code: Some(exit_code),
                elapsed: Duration::from_millis(5),
            }));
            self
        }

        /// Queue a failed run.
        pub(crate) fn fail(self, err: RunError) -> Self {
            self.responses.lock().unwrap().push_back(Err(err));
            self
        }

        pub(crate) fn calls(&self) -> Vec<ProcessSpec> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProcessRunner for ScriptedRunner {
        async fn run(&self, spec: &ProcessSpec) -> Result<RawScanOutput, RunError> {
            self.calls.lock().unwrap().push(spec.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected call to {}", spec.program_name()))
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ProcessSpec {
        ProcessSpec::new("/bin/sh").arg("-c").arg(script)
    }

    #[tokio::test]
    async fn captures_stdout_stderr_and_exit_code() {
        let out = TokioProcessRunner
            .run(&sh("echo out; echo err >&2; exit 3"))
            .await
            .unwrap();

        assert_eq!(out.stdout_text(), "out\n");
        assert_eq!(out.stderr_text(), "err\n");
        assert_eq!(out.exit_code, Some(3));
    }

    #[tokio::test]
    async fn passes_arguments_without_shell_interpolation() {
        let spec = sh("printf '%s' \"$1\"").arg("engine").arg("a file; rm -rf $HOME");
        let out = TokioProcessRunner.run(&spec).await.unwrap();
        assert_eq!(out.stdout_text(), "a file; rm -rf $HOME");
    }

    #[tokio::test]
    async fn times_out_and_kills() {
        let spec = sh("exec sleep 30").timeout(Duration::from_millis(200));
        let start = Instant::now();

        let err = TokioProcessRunner.run(&spec).await.unwrap_err();

        assert!(matches!(err, RunError::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn no_process_left_after_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("echo $$ > {}; exec sleep 30", pid_file.display());
        let spec = sh(&script).timeout(Duration::from_millis(500));

        let err = TokioProcessRunner.run(&spec).await.unwrap_err();
        assert!(matches!(err, RunError::Timeout { .. }));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let proc_dir = std::path::Path::new("/proc").join(pid.trim());
        assert!(!proc_dir.exists(), "process {} still running", pid.trim());
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let err = TokioProcessRunner
            .run(&ProcessSpec::new("/nonexistent/engine-binary"))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Spawn { .. }));

        let engine_err: EngineError = err.into();
        assert!(matches!(engine_err, EngineError::Spawn { .. }));
    }

    #[test]
    fn timeout_converts_to_process_timeout() {
        let err: EngineError = RunError::Timeout {
            program: "avgscan".into(),
            timeout: Duration::from_secs(15),
        }
        .into();
        assert!(err.is_timeout());
    }
}
