//! Privileged input through a root shell.
//!
//! Commands run as `<shell> -c "<script>"`, e.g. `su -c "input text '1234'"`.
//! A missing shell, a non-zero exit, or a timeout all count as failure.

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::collaborators::PrivilegedInputSink;
use crate::error::CollaboratorError;

/// Default per-command timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest stderr excerpt carried into an error.
const MAX_STDERR_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct ShellPrivilegedInput {
    shell: String,
    timeout: Duration,
}

impl ShellPrivilegedInput {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, script: &str) -> Result<(), CollaboratorError> {
        let child = Command::new(&self.shell)
            .args(["-c", script])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => {
                    CollaboratorError::denied("root", format!("cannot start {}: {e}", self.shell))
                }
                _ => CollaboratorError::unavailable("privileged shell", e.to_string()),
            })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                CollaboratorError::failed(
                    "privileged shell",
                    format!("timed out after {:?}", self.timeout),
                )
            })?
            .map_err(|e| CollaboratorError::failed("privileged shell", e.to_string()))?;

        if output.status.success() {
            debug!(shell = %self.shell, "Privileged command succeeded");
            return Ok(());
        }

        let stderr: String = String::from_utf8_lossy(&output.stderr)
            .trim()
            .chars()
            .take(MAX_STDERR_CHARS)
            .collect();
        Err(CollaboratorError::failed(
            "privileged shell",
            format!(
                "exit code {}: {stderr}",
                output.status.code().unwrap_or(-1)
            ),
        ))
    }
}

#[async_trait]
impl PrivilegedInputSink for ShellPrivilegedInput {
    async fn type_text(&self, code: &str) -> Result<(), CollaboratorError> {
        self.run(&format!("input text {}", shell_quote(code))).await
    }

    async fn activate_agent(&self, agent_id: &str) -> Result<(), CollaboratorError> {
        let id = shell_quote(agent_id);
        self.run(&format!(
            "settings put secure enabled_accessibility_services {id} && \
             settings put secure accessibility_enabled 1"
        ))
        .await
    }
}

/// Single-quote `text` for a POSIX shell.
fn shell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}
