//! External converter process execution.
//!
//! Runs a conversion tool as a child process with a hard timeout and
//! captured output. A non-zero exit code is recorded, not judged: some
//! `dwg2dxf` builds exit non-zero after writing a usable file, so the
//! caller decides by looking for the artifact.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ConversionError;

/// How many characters of stderr are kept in log lines.
const LOG_EXCERPT_CHARS: usize = 500;

/// Captured result of one external process run.
#[derive(Debug, Clone, Default)]
pub struct ExternalProcessResult {
    /// Exit code; `None` when the process was killed by a signal or timed out.
    pub exit_code: Option<i32>,
    /// Standard output (lossy UTF-8).
    pub stdout: String,
    /// Standard error (lossy UTF-8).
    pub stderr: String,
    /// Whether the time bound was exceeded.
    pub timed_out: bool,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u64,
}

impl ExternalProcessResult {
    /// Whether the process exited with status 0.
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Best diagnostic text: stderr, else stdout, else `None`.
    pub fn diagnostic(&self) -> Option<String> {
        [&self.stderr, &self.stdout]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }
}

/// Parameters for executing a conversion.
#[derive(Debug, Clone)]
pub struct ExecutionParams {
    /// The command to execute.
    pub command: String,
    /// Arguments (after placeholder substitution).
    pub args: Vec<String>,
    /// Working directory of the child process.
    pub working_dir: PathBuf,
    /// Time bound in seconds.
    pub timeout_seconds: u64,
}

/// Executor for running external conversion commands.
#[derive(Debug, Clone, Default)]
pub struct ConversionExecutor;

impl ConversionExecutor {
    /// Create a new conversion executor.
    pub fn new() -> Self {
        Self
    }

    /// Substitute template placeholders in arguments.
    pub fn substitute_args(
        &self,
        template_args: &[String],
        input_path: &Path,
        output_path: &Path,
    ) -> Vec<String> {
        let input_str = input_path.to_string_lossy();
        let output_str = output_path.to_string_lossy();
        let input_dir = input_path
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        let output_dir = output_path
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();

        template_args
            .iter()
            .map(|arg| {
                arg.replace("{input_dir}", &input_dir)
                    .replace("{output_dir}", &output_dir)
                    .replace("{input}", &input_str)
                    .replace("{output}", &output_str)
            })
            .collect()
    }

    /// Execute a conversion command.
    ///
    /// Timeouts are reported through [`ExternalProcessResult::timed_out`].
    /// Cancellation returns [`ConversionError::Cancelled`]; in both cases the
    /// child is killed because the command is spawned with `kill_on_drop`.
    /// Failing to spawn at all is returned as an I/O error.
    pub async fn execute(
        &self,
        params: &ExecutionParams,
        cancel: &CancellationToken,
    ) -> Result<ExternalProcessResult, ConversionError> {
        let start = Instant::now();

        info!(
            command = %params.command,
            args = ?params.args,
            cwd = %params.working_dir.display(),
            "Executing converter"
        );

        let mut cmd = Command::new(&params.command);
        cmd.args(&params.args)
            .current_dir(&params.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let timeout = Duration::from_secs(params.timeout_seconds);

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                warn!(command = %params.command, "Converter cancelled");
                return Err(ConversionError::Cancelled);
            }
            result = tokio::time::timeout(timeout, cmd.output()) => result,
        };

        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(Ok(output)) => {
                let process = ExternalProcessResult {
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                    timed_out: false,
                    duration_ms,
                };

                if process.succeeded() {
                    debug!(
                        command = %params.command,
                        duration_ms,
                        "Converter exited cleanly"
                    );
                } else {
                    warn!(
                        command = %params.command,
                        exit_code = ?process.exit_code,
                        duration_ms,
                        stderr = %process.stderr.chars().take(LOG_EXCERPT_CHARS).collect::<String>(),
                        "Converter exited with failure status"
                    );
                }

                Ok(process)
            }
            Ok(Err(e)) => {
                warn!(
                    command = %params.command,
                    error = %e,
                    "Failed to execute converter"
                );
                Err(ConversionError::Io(e))
            }
            Err(_) => {
                warn!(
                    command = %params.command,
                    timeout_seconds = params.timeout_seconds,
                    "Converter timed out"
                );
                Ok(ExternalProcessResult {
                    timed_out: true,
                    duration_ms,
                    ..Default::default()
                })
            }
        }
    }
}
