//! Remote command execution on managed hosts.

use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run `command` through the remote user's shell.
    async fn execute(&self, command: &str) -> Result<CommandOutput>;
}

/// Runs commands with the system `ssh` client, non-interactively.
#[derive(Debug, Clone)]
pub struct SshShell {
    hostname: String,
    username: String,
    identity: Option<PathBuf>,
    connect_timeout_secs: u32,
}

impl SshShell {
    pub fn new(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            username: username.into(),
            identity: None,
            connect_timeout_secs: 30,
        }
    }

    pub fn with_identity(mut self, identity: impl Into<PathBuf>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
        ];
        if let Some(identity) = &self.identity {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.push(format!("{}@{}", self.username, self.hostname));
        args.push(command.to_string());
        args
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn execute(&self, command: &str) -> Result<CommandOutput> {
        tracing::debug!("[{}] $ {}", self.hostname, command);
        let output = Command::new("ssh")
            .args(self.ssh_args(command))
            .output()
            .await
            .with_context(|| format!("Failed to run ssh to {}", self.hostname))?;

        Ok(CommandOutput {
            // killed by signal: no exit code
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
