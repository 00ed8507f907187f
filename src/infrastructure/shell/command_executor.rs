//! Command executor for running shell commands
//!
//! Commands run through the platform shell with the gateway's environment.
//! Standard input is fed from a separate task so a child that writes a lot of
//! output before reading its input cannot deadlock the pipes.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::application::CommandExecutor;
use crate::core::{CommandOutput, Error, Result};

/// Default bound on a single command execution
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default command executor using tokio::process
#[derive(Debug, Clone)]
pub struct ShellCommandExecutor {
    timeout: Duration,
}

impl ShellCommandExecutor {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Kills commands that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for ShellCommandExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandExecutor for ShellCommandExecutor {
    async fn execute(&self, command: &str, stdin: Option<Vec<u8>>) -> Result<CommandOutput> {
        let shell = if cfg!(target_os = "windows") {
            "cmd"
        } else {
            "sh"
        };

        let shell_arg = if cfg!(target_os = "windows") {
            "/C"
        } else {
            "-c"
        };

        let mut child = Command::new(shell)
            .arg(shell_arg)
            .arg(command)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::execution(format!("Failed to execute command '{command}': {e}")))?;

        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            tokio::spawn(async move {
                // A child that exits without reading closes the pipe early
                if let Err(err) = pipe.write_all(&input).await {
                    tracing::debug!("Writing command input stopped: {err}");
                }
            });
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                Error::execution(format!(
                    "Command '{command}' timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::execution(format!("Failed to wait for command '{command}': {e}")))?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Mock command executor for testing
#[cfg(test)]
#[derive(Default)]
pub struct MockCommandExecutor {
    pub results: std::collections::HashMap<String, CommandOutput>,
    pub calls: std::sync::Mutex<Vec<(String, Option<Vec<u8>>)>>,
}

#[cfg(test)]
impl MockCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, command: &str, exit_code: i32, stdout: &str, stderr: &str) -> Self {
        self.results.insert(
            command.to_string(),
            CommandOutput {
                exit_code,
                stdout: stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
            },
        );
        self
    }

    /// Commands executed so far, with their stdin
    pub fn calls(&self) -> Vec<(String, Option<Vec<u8>>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl CommandExecutor for MockCommandExecutor {
    async fn execute(&self, command: &str, stdin: Option<Vec<u8>>) -> Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), stdin));
        self.results.get(command).cloned().ok_or_else(|| {
            Error::execution(format!("Mock executor has no result for command: {command}"))
        })
    }
}
