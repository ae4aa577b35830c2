use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::target::TargetDescriptor;

/// Remote command failure surfaced by [`ShellSession::run_check`].
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("`{command}` exited with status {status}: {stderr}")]
    Failed {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("file transfer to {remote} failed: {stderr}")]
    Upload { remote: String, stderr: String },
}

/// Captured output of one remote command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub status: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn joined_stdout(&self) -> String {
        self.stdout.join("\n")
    }

    pub fn joined_stderr(&self) -> String {
        self.stderr.join("\n")
    }
}

/// Remote shell channel to the device under test, driven through the system
/// `ssh`/`scp` binaries. Owned exclusively by the running test session.
#[derive(Debug, Clone)]
pub struct ShellSession {
    host: String,
    user: String,
    port: u16,
}

impl ShellSession {
    pub fn new(target: &TargetDescriptor) -> Self {
        Self {
            host: target.ssh.host.clone(),
            user: target.ssh.user.clone(),
            port: target.ssh.port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn destination(&self) -> String {
        format!("{user}@{host}", user = self.user, host = self.host)
    }

    fn base_ssh_args(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
        ]
    }

    /// Run a command on the target, capturing stdout/stderr lines and the
    /// exit status. A non-zero status is not an error here.
    pub async fn run(&self, command: &str) -> Result<CommandOutput> {
        debug!("run: {command}");

        let output = Command::new("ssh")
            .args(self.base_ssh_args())
            .arg("-p")
            .arg(self.port.to_string())
            .arg(self.destination())
            .arg(command)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to invoke ssh for `{command}`"))?;

        Ok(CommandOutput {
            stdout: split_lines(&output.stdout),
            stderr: split_lines(&output.stderr),
            status: output.status.code().unwrap_or(-1),
        })
    }

    /// Run a command and fail on non-zero exit status.
    pub async fn run_check(&self, command: &str) -> Result<Vec<String>> {
        let output = self.run(command).await?;
        if !output.success() {
            return Err(CommandError::Failed {
                command: command.to_string(),
                status: output.status,
                stderr: output.joined_stderr(),
            }
            .into());
        }
        Ok(output.stdout)
    }

    /// Copy a local file to a path on the target.
    pub async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        debug!("upload: {local} -> {remote}", local = local.display());

        let output = Command::new("scp")
            .args(self.base_ssh_args())
            .arg("-P")
            .arg(self.port.to_string())
            .arg(local)
            .arg(format!(
                "{destination}:{remote}",
                destination = self.destination()
            ))
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to invoke scp for {}", local.display()))?;

        if !output.status.success() {
            return Err(CommandError::Upload {
                remote: remote.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }

        Ok(())
    }
}

fn split_lines(raw: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(raw)
        .lines()
        .map(str::to_string)
        .collect()
}
