//! Infrastructure broker adapter.

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;
use tracing::info;

use sat_shared::broker::{BrokerAction, BrokerRequest};

use crate::{host::ContentHost, shell::SshShell};

#[async_trait]
pub trait Broker: Send + Sync {
    /// Run a workflow and return its raw result (`{"data_out": {...}}` for
    /// provisioning workflows, anything or nothing for the rest).
    async fn execute(&self, request: &BrokerRequest) -> Result<Value>;

    /// Check out `count` hosts built by the request's workflow.
    async fn checkout(&self, request: &BrokerRequest, count: usize) -> Result<Vec<ContentHost>>;

    /// Release hosts back to the broker, which deprovisions them.
    async fn checkin(&self, hosts: &[ContentHost]) -> Result<()>;
}

#[derive(Deserialize)]
struct CheckedOutHost {
    name: String,
    hostname: String,
    #[serde(default, rename = "_broker_args")]
    broker_args: BTreeMap<String, Value>,
}

/// Drives the `broker` executable; results are read as JSON from stdout.
#[derive(Debug, Clone)]
pub struct BrokerCli {
    binary: PathBuf,
    ssh_username: String,
}

impl BrokerCli {
    pub fn new(binary: impl Into<PathBuf>, ssh_username: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            ssh_username: ssh_username.into(),
        }
    }

    async fn run(&self, args: Vec<String>) -> Result<String> {
        info!("broker {}", args.join(" "));
        let output = Command::new(&self.binary)
            .args(&args)
            .output()
            .await
            .with_context(|| format!("Failed to run {:?}", self.binary))?;

        if !output.status.success() {
            bail!(
                "broker {} failed (exit code: {:?}): {}",
                args.first().map(String::as_str).unwrap_or_default(),
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn host_from_record(&self, record: CheckedOutHost, blank: bool) -> ContentHost {
        let mut shell = SshShell::new(&record.hostname, &self.ssh_username);
        if let Some(key) = record.broker_args.get("auth").and_then(Value::as_str) {
            shell = shell.with_identity(key);
        }
        ContentHost::new(
            record.name,
            record.hostname,
            record.broker_args,
            blank,
            Arc::new(shell),
        )
    }
}

/// `--workflow name --key value ...`; non-string values are passed as JSON.
pub fn request_args(request: &BrokerRequest) -> Vec<String> {
    let mut args = match &request.action {
        BrokerAction::Workflow(name) => vec!["--workflow".to_string(), name.clone()],
        BrokerAction::JobTemplate(name) => vec!["--job-template".to_string(), name.clone()],
    };
    for (key, value) in &request.args {
        args.push(format!("--{key}"));
        args.push(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        });
    }
    args
}

#[async_trait]
impl Broker for BrokerCli {
    async fn execute(&self, request: &BrokerRequest) -> Result<Value> {
        let mut args = vec!["execute".to_string()];
        args.extend(request_args(request));
        args.extend(["--output-format".to_string(), "raw".to_string()]);

        let stdout = self.run(args).await?;
        if stdout.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(stdout.trim())
            .with_context(|| format!("Unparseable output from broker workflow {}", request.name()))
    }

    async fn checkout(&self, request: &BrokerRequest, count: usize) -> Result<Vec<ContentHost>> {
        let mut args = vec!["checkout".to_string()];
        args.extend(request_args(request));
        args.extend([
            "--count".to_string(),
            count.to_string(),
            "--output-format".to_string(),
            "json".to_string(),
        ]);

        let stdout = self.run(args).await?;
        let records: Vec<CheckedOutHost> = serde_json::from_str(stdout.trim())
            .with_context(|| format!("Unparseable checkout result for {}", request.name()))?;
        if records.len() != count {
            return Err(anyhow!(
                "Broker returned {} host(s) for {}, expected {}",
                records.len(),
                request.name(),
                count
            ));
        }

        let blank = request
            .get("blank")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Ok(records
            .into_iter()
            .map(|record| self.host_from_record(record, blank))
            .collect())
    }

    async fn checkin(&self, hosts: &[ContentHost]) -> Result<()> {
        if hosts.is_empty() {
            return Ok(());
        }
        let mut args = vec!["checkin".to_string()];
        args.extend(hosts.iter().map(|h| h.hostname.clone()));
        self.run(args).await?;
        Ok(())
    }
}
