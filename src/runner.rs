//! External executor invocation.
//!
//! Runs `<program> -i <inventory> <playbook>` once, with a bounded timeout.
//! Every failure mode is folded into the returned [`ExecutionReport`]; the
//! runner never returns an error.

use serde::Serialize;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::ExecutorConfig;
use crate::error::ExecutionError;

/// Default executor program.
pub const DEFAULT_PROGRAM: &str = "ansible-playbook";

/// Default timeout: 30 minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1800);

/// How an execution ended.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunOutcome {
    /// Exit status zero.
    Success,
    /// Non-zero exit, or the process could not be run.
    Failure,
    /// The timeout elapsed and the process was killed.
    Timeout,
    /// The program is not installed.
    ToolMissing,
}

impl RunOutcome {
    /// Returns true only for [`RunOutcome::Success`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Timeout => "TIMEOUT",
            Self::ToolMissing => "TOOL_MISSING",
        };
        f.write_str(text)
    }
}

/// Result of one execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// How the execution ended.
    pub outcome: RunOutcome,
    /// Exit code, when the process exited normally.
    pub exit_code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
    /// Failure detail for every outcome except success.
    pub error: Option<ExecutionError>,
}

impl ExecutionReport {
    /// Report for an execution that never started.
    #[must_use]
    pub fn not_started(message: impl Into<String>) -> Self {
        Self::failed(
            RunOutcome::Failure,
            ExecutionError::NotStarted {
                message: message.into(),
            },
            Duration::ZERO,
        )
    }

    fn failed(outcome: RunOutcome, error: ExecutionError, elapsed: Duration) -> Self {
        Self {
            outcome,
            exit_code: None,
            stdout: String::new(),
            stderr: String::new(),
            elapsed_ms: millis(elapsed),
            error: Some(error),
        }
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Invokes the external executor.
#[derive(Debug, Clone)]
pub struct ExecutionRunner {
    /// Program to run.
    program: String,
    /// Arguments placed before `-i`.
    leading_args: Vec<String>,
    /// Maximum run time.
    timeout: Duration,
}

impl Default for ExecutionRunner {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM, DEFAULT_TIMEOUT)
    }
}

impl ExecutionRunner {
    /// Creates a runner for `program` with the given timeout.
    #[must_use]
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            timeout,
        }
    }

    /// Creates a runner from executor configuration.
    #[must_use]
    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.program.trim(), Duration::from_secs(config.timeout_secs))
    }

    /// Adds arguments placed before `-i`.
    #[must_use]
    pub fn with_leading_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the program name.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Runs the executor against the given artifacts from `working_dir`.
    pub async fn run(&self, working_dir: &Path, manifest: &Path, graph: &Path) -> ExecutionReport {
        info!(
            "Command: {} -i {} {}",
            self.program,
            manifest.display(),
            graph.display()
        );

        let started = Instant::now();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg("-i")
            .arg(manifest)
            .arg(graph)
            .current_dir(working_dir)
            .kill_on_drop(true)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let err = ExecutionError::ToolMissing {
                    program: self.program.clone(),
                };
                error!("{err}");
                return ExecutionReport::failed(RunOutcome::ToolMissing, err, started.elapsed());
            }
            Err(e) => {
                let err = ExecutionError::Spawn {
                    message: format!("Failed to spawn '{}': {e}", self.program),
                };
                error!("{err}");
                return ExecutionReport::failed(RunOutcome::Failure, err, started.elapsed());
            }
        };

        // Dropping the child on timeout kills it.
        let output = match timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                let err = ExecutionError::Spawn {
                    message: format!("Failed to wait for '{}': {e}", self.program),
                };
                error!("{err}");
                return ExecutionReport::failed(RunOutcome::Failure, err, started.elapsed());
            }
            Err(_) => {
                let err = ExecutionError::Timeout {
                    timeout_secs: self.timeout.as_secs(),
                };
                error!("{err}");
                return ExecutionReport::failed(RunOutcome::Timeout, err, started.elapsed());
            }
        };

        let elapsed = started.elapsed();
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        for line in stdout.lines() {
            debug!(target: "rolewright::executor", "{line}");
        }
        if !stderr.trim().is_empty() {
            warn!("Executor stderr:\n{}", stderr.trim_end());
        }

        let exit_code = output.status.code();
        let (outcome, error) = if output.status.success() {
            info!("Executor finished in {:.1}s", elapsed.as_secs_f64());
            (RunOutcome::Success, None)
        } else {
            let err = ExecutionError::NonZeroExit { code: exit_code };
            error!("{err}");
            (RunOutcome::Failure, Some(err))
        };

        ExecutionReport {
            outcome,
            exit_code,
            stdout,
            stderr,
            elapsed_ms: millis(elapsed),
            error,
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn script(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake-executor.sh");
        std::fs::write(&path, format!("{body}\n")).expect("write script");
        path
    }

    fn runner_for(script: &Path, timeout: Duration) -> ExecutionRunner {
        ExecutionRunner::new("sh", timeout).with_leading_args([script.display().to_string()])
    }

    #[tokio::test]
    async fn test_success_captures_output() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = script(&dir, r#"echo "args: $*"; pwd"#);
        let runner = runner_for(&path, Duration::from_secs(10));

        let report = runner
            .run(dir.path(), Path::new("inventory.yml"), Path::new("main.yml"))
            .await;

        assert_eq!(report.outcome, RunOutcome::Success);
        assert_eq!(report.exit_code, Some(0));
        assert!(report.stdout.contains("args: -i inventory.yml main.yml"));
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_failure() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = script(&dir, "echo boom >&2; exit 3");
        let runner = runner_for(&path, Duration::from_secs(10));

        let report = runner
            .run(dir.path(), Path::new("inventory.yml"), Path::new("main.yml"))
            .await;

        assert_eq!(report.outcome, RunOutcome::Failure);
        assert_eq!(report.exit_code, Some(3));
        assert!(report.stderr.contains("boom"));
        assert_eq!(report.error, Some(ExecutionError::NonZeroExit { code: Some(3) }));
    }

    #[tokio::test]
    async fn test_timeout_kills_the_process() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = script(&dir, "exec sleep 30");
        let runner = runner_for(&path, Duration::from_millis(200));

        let report = runner
            .run(dir.path(), Path::new("inventory.yml"), Path::new("main.yml"))
            .await;

        assert_eq!(report.outcome, RunOutcome::Timeout);
        assert!(report.elapsed_ms < 10_000);
    }

    #[test]
    fn test_from_config_uses_program_and_timeout() {
        let config = ExecutorConfig {
            program: String::from(" ansible-playbook "),
            timeout_secs: 90,
            ..ExecutorConfig::default()
        };

        let runner = ExecutionRunner::from_config(&config);
        assert_eq!(runner.program(), "ansible-playbook");
        assert_eq!(runner.timeout(), Duration::from_secs(90));
        assert_eq!(ExecutionRunner::default().timeout(), DEFAULT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_missing_program_is_tool_missing() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let runner = ExecutionRunner::new(
            "rolewright-test-no-such-executor",
            Duration::from_secs(5),
        );

        let report = runner
            .run(dir.path(), Path::new("inventory.yml"), Path::new("main.yml"))
            .await;

        assert_eq!(report.outcome, RunOutcome::ToolMissing);
        assert!(matches!(report.error, Some(ExecutionError::ToolMissing { .. })));
    }
}
