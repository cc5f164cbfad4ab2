//! qlik-cli runner: spawns qlik-cli with timeout-kill, captures output, and
//! redacts secrets from everything that gets logged or returned.
//!
//! `ProcessRunner` is the seam every operation talks to. `TokioProcessRunner`
//! is the production implementation; tests substitute a scripted fake.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::QlikError;

/// Flags whose following argument is a secret.
pub const SECRET_FLAGS: &[&str] = &["--api-key", "--token"];

/// Replacement written in place of a secret argument.
pub const MASK: &str = "***MASKED***";

/// Outcome of one successful qlik-cli invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub success: bool,
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
    /// Redacted, space-joined argument vector.
    pub command: String,
}

impl CommandResult {
    /// Build a successful result for the given (already redacted) command line.
    pub fn ok(command: impl Into<String>, stdout: impl Into<String>) -> Self {
        CommandResult {
            success: true,
            returncode: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            command: command.into(),
        }
    }
}

/// Executes an argument vector as an external process.
///
/// `argv[0]` is the executable. Implementations inherit the caller's
/// environment unmodified and fail with `QlikError::ExternalTool` when the
/// executable is missing, the timeout expires, or the exit code is non-zero.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(
        &self,
        argv: &[String],
        timeout: Duration,
        redact_secret_args: bool,
    ) -> crate::Result<CommandResult>;
}

/// Return a copy of `argv` with every value following a secret flag masked.
///
/// Handles both `--api-key VALUE` and `--api-key=VALUE` forms.
pub fn redact_argv(argv: &[String]) -> Vec<String> {
    let mut redacted = Vec::with_capacity(argv.len());
    let mut mask_next = false;
    for arg in argv {
        if mask_next {
            redacted.push(MASK.to_string());
            mask_next = false;
            continue;
        }
        if SECRET_FLAGS.contains(&arg.as_str()) {
            mask_next = true;
            redacted.push(arg.clone());
            continue;
        }
        match SECRET_FLAGS
            .iter()
            .find(|flag| arg.starts_with(&format!("{}=", flag)))
        {
            Some(flag) => redacted.push(format!("{}={}", flag, MASK)),
            None => redacted.push(arg.clone()),
        }
    }
    redacted
}

/// Collect the secret values carried by `argv`.
fn secret_values(argv: &[String]) -> Vec<&str> {
    let mut secrets = Vec::new();
    for (i, arg) in argv.iter().enumerate() {
        if SECRET_FLAGS.contains(&arg.as_str()) {
            if let Some(value) = argv.get(i + 1) {
                secrets.push(value.as_str());
            }
        } else if let Some(value) = SECRET_FLAGS
            .iter()
            .find_map(|flag| arg.strip_prefix(&format!("{}=", flag)))
        {
            secrets.push(value);
        }
    }
    secrets.retain(|s| !s.is_empty());
    secrets
}

/// Replace every occurrence of a secret in `text` with the mask.
fn scrub(text: &str, secrets: &[&str]) -> String {
    secrets
        .iter()
        .fold(text.to_string(), |acc, secret| acc.replace(secret, MASK))
}

/// Production runner built on `tokio::process::Command`.
#[derive(Debug, Default, Clone)]
pub struct TokioProcessRunner;

impl TokioProcessRunner {
    pub fn new() -> Self {
        TokioProcessRunner
    }
}

#[async_trait]
impl ProcessRunner for TokioProcessRunner {
    /// Spawn `argv` with structured args (never a shell), draining stdout and
    /// stderr while racing the child against `timeout`. On expiry the child
    /// is killed, not just abandoned.
    async fn run(
        &self,
        argv: &[String],
        timeout: Duration,
        redact_secret_args: bool,
    ) -> crate::Result<CommandResult> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| QlikError::ExternalTool("empty argument vector".to_string()))?;

        let log_argv = if redact_secret_args {
            redact_argv(argv)
        } else {
            argv.to_vec()
        };
        let secrets = if redact_secret_args {
            secret_values(argv)
        } else {
            Vec::new()
        };
        let command_line = log_argv.join(" ");

        tracing::info!(args = ?log_argv, "executing qlik-cli command");

        let start = Instant::now();

        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                QlikError::ExternalTool(format!("qlik-cli executable not found: {}", program))
            } else {
                QlikError::ExternalTool(format!("failed to spawn '{}': {}", program, e))
            }
        })?;

        // Take pipes so the child stays available for kill() on timeout
        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let output = tokio::select! {
            result = async {
                use tokio::io::AsyncReadExt;
                let mut stdout_bytes = Vec::new();
                let mut stderr_bytes = Vec::new();
                let read_stdout = async {
                    if let Some(mut out) = stdout_pipe {
                        if let Err(e) = out.read_to_end(&mut stdout_bytes).await {
                            tracing::warn!(error = %e, "failed to read qlik-cli stdout");
                        }
                    }
                };
                let read_stderr = async {
                    if let Some(mut err) = stderr_pipe {
                        if let Err(e) = err.read_to_end(&mut stderr_bytes).await {
                            tracing::warn!(error = %e, "failed to read qlik-cli stderr");
                        }
                    }
                };
                tokio::join!(read_stdout, read_stderr);
                let status = child.wait().await?;
                Ok::<std::process::Output, std::io::Error>(std::process::Output {
                    status,
                    stdout: stdout_bytes,
                    stderr: stderr_bytes,
                })
            } => {
                result.map_err(|e| QlikError::ExternalTool(format!(
                    "process I/O error running {}: {}",
                    command_line, e
                )))?
            }
            _ = tokio::time::sleep(timeout) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to kill timed out qlik-cli process");
                }
                let msg = format!(
                    "{} timed out after {}s",
                    command_line,
                    timeout.as_secs()
                );
                tracing::error!(args = ?log_argv, timeout_secs = timeout.as_secs(), "qlik-cli command timed out");
                return Err(QlikError::ExternalTool(msg));
            }
        };

        let elapsed = start.elapsed().as_millis();
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = scrub(&String::from_utf8_lossy(&output.stdout), &secrets);
        let stderr = scrub(&String::from_utf8_lossy(&output.stderr), &secrets);

        tracing::debug!(
            exit_code = %exit_code,
            duration_ms = %elapsed,
            stdout = %stdout,
            "qlik-cli command finished"
        );
        if !stderr.is_empty() && !redact_secret_args {
            tracing::debug!(stderr = %stderr, "qlik-cli stderr");
        }

        if exit_code != 0 {
            let mut msg = format!("{} failed with code {}", command_line, exit_code);
            if !stderr.trim().is_empty() {
                msg.push_str(": ");
                msg.push_str(stderr.trim());
            }
            return Err(QlikError::ExternalTool(msg));
        }

        Ok(CommandResult {
            success: true,
            returncode: exit_code,
            stdout,
            stderr,
            command: command_line,
        })
    }
}
