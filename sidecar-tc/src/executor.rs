//! Execution of generated command lists inside the sidecar container.

use std::{io, process::ExitStatus, sync::Arc};

use crate::command::SidecarCommand;

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("command exited with {}: {}", .0.status, .0.stderr.trim())]
    NonZero(ExecOutput),
}

/// Captured output of a finished exec.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl From<std::process::Output> for ExecOutput {
    fn from(value: std::process::Output) -> Self {
        Self {
            status: value.status,
            stdout: String::from_utf8_lossy(&value.stdout).to_string(),
            stderr: String::from_utf8_lossy(&value.stderr).to_string(),
        }
    }
}

/// Runs one [`SidecarCommand`] inside a target container.
///
/// Implementations only run the command and translate a non-zero exit or
/// transport failure into an [`ExecError`]; retry policy belongs to the
/// orchestration layer above.
#[async_trait::async_trait]
pub trait ExecCommandExecutor: Send + Sync {
    async fn exec(&self, container_id: &str, command: &SidecarCommand) -> Result<(), ExecError>;
}

#[async_trait::async_trait]
impl<E: ExecCommandExecutor + ?Sized> ExecCommandExecutor for Arc<E> {
    async fn exec(&self, container_id: &str, command: &SidecarCommand) -> Result<(), ExecError> {
        (**self).exec(container_id, command).await
    }
}

/// Executor backed by a container runtime binary on the host, i.e.
/// `docker exec <container> sh -c '<command>'`.
///
/// The token list is joined into a single shell line and handed to `sh -c`
/// inside the container, so the `&&` sequencing is interpreted there and the
/// whole list runs as one unit.
#[derive(Debug, Clone)]
pub struct RuntimeExecExecutor {
    runtime_binary: String,
}

impl RuntimeExecExecutor {
    pub fn new(runtime_binary: impl Into<String>) -> Self {
        Self { runtime_binary: runtime_binary.into() }
    }
}

impl Default for RuntimeExecExecutor {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait::async_trait]
impl ExecCommandExecutor for RuntimeExecExecutor {
    async fn exec(&self, container_id: &str, command: &SidecarCommand) -> Result<(), ExecError> {
        let shell_line = command.to_string();

        tracing::debug!(container = container_id, cmd = %shell_line, "running command in container");

        let output: ExecOutput = tokio::process::Command::new(&self.runtime_binary)
            .args(["exec", container_id, "sh", "-c", &shell_line])
            .output()
            .await?
            .into();

        if !output.status.success() {
            tracing::debug!(?output.stderr, ?output.status, "command returned non-zero status");
            return Err(ExecError::NonZero(output));
        }

        Ok(())
    }
}
