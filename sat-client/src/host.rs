//! Handles for remote hosts: the satellite under test and checked-out VMs.

use std::{collections::BTreeMap, fmt, sync::Arc};

use anyhow::{Result, anyhow};
use serde_json::Value;
use tracing::{debug, info};

use crate::{
    api::ForemanApi,
    shell::{CommandOutput, RemoteShell},
};

/// Proxy for one satellite: REST API plus a shell on the box.
#[derive(Clone)]
pub struct Satellite {
    pub hostname: String,
    /// Broker inventory name; equals the hostname for instances we did not check out.
    pub name: String,
    pub version: String,
    pub is_stream: bool,
    api: Arc<dyn ForemanApi>,
    shell: Arc<dyn RemoteShell>,
}

impl fmt::Debug for Satellite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Satellite")
            .field("hostname", &self.hostname)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("is_stream", &self.is_stream)
            .finish()
    }
}

impl Satellite {
    pub fn new(
        hostname: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        is_stream: bool,
        api: Arc<dyn ForemanApi>,
        shell: Arc<dyn RemoteShell>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            name: name.into(),
            version: version.into(),
            is_stream,
            api,
            shell,
        }
    }

    pub fn api(&self) -> &Arc<dyn ForemanApi> {
        &self.api
    }

    pub fn shell(&self) -> &Arc<dyn RemoteShell> {
        &self.shell
    }

    /// Version string the broker expects for installer workflows.
    pub fn broker_version(&self) -> String {
        if self.is_stream {
            "stream".to_string()
        } else {
            self.version.clone()
        }
    }

    pub async fn execute(&self, command: &str) -> Result<CommandOutput> {
        let output = self.shell.execute(command).await?;
        debug!("[{}] exit {} for `{}`", self.hostname, output.status, command);
        Ok(output)
    }

    /// Set a global setting and return the value it had before.
    pub async fn update_setting(&self, name: &str, value: &Value) -> Result<Value> {
        let previous = self
            .api
            .search_settings(&format!("name={name}"))
            .await?
            .into_iter()
            .find(|s| s.name == name)
            .ok_or_else(|| anyhow!("Setting '{name}' not found"))?
            .value;
        self.api.update_setting(name, value).await?;
        info!("Setting {} changed from {} to {}", name, previous, value);
        Ok(previous)
    }

    /// Restart all satellite services through the maintenance CLI.
    pub async fn service_restart(&self) -> Result<CommandOutput> {
        self.execute("satellite-maintain service restart").await
    }

    pub async fn register_to_cdn(&self, username: &str, password: &str) -> Result<CommandOutput> {
        self.execute(&format!(
            "subscription-manager register --force --username='{username}' --password='{password}'"
        ))
        .await
    }

    pub async fn unregister(&self) -> Result<CommandOutput> {
        self.execute("subscription-manager unregister").await
    }
}

/// A VM checked out from the broker.
///
/// `blank` hosts were never configured by us, so their teardown does nothing
/// on the host itself. Fixtures clear the flag before releasing the VM.
#[derive(Clone)]
pub struct ContentHost {
    pub name: String,
    pub hostname: String,
    pub broker_args: BTreeMap<String, Value>,
    pub blank: bool,
    shell: Arc<dyn RemoteShell>,
}

impl fmt::Debug for ContentHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentHost")
            .field("name", &self.name)
            .field("hostname", &self.hostname)
            .field("blank", &self.blank)
            .finish()
    }
}

impl ContentHost {
    pub fn new(
        name: impl Into<String>,
        hostname: impl Into<String>,
        broker_args: BTreeMap<String, Value>,
        blank: bool,
        shell: Arc<dyn RemoteShell>,
    ) -> Self {
        Self {
            name: name.into(),
            hostname: hostname.into(),
            broker_args,
            blank,
            shell,
        }
    }

    pub fn broker_arg(&self, key: &str) -> Option<&str> {
        self.broker_args.get(key).and_then(Value::as_str)
    }

    pub async fn execute(&self, command: &str) -> Result<CommandOutput> {
        self.shell.execute(command).await
    }

    /// Host-side cleanup before the VM goes back to the broker.
    pub async fn teardown(&self) -> Result<()> {
        if self.blank {
            debug!("{} is blank, skipping host teardown", self.hostname);
            return Ok(());
        }
        info!("Unregistering {} before checkin", self.hostname);
        // an unregistered host answers non-zero; only a dead transport is an error
        self.execute("subscription-manager unregister").await?;
        Ok(())
    }
}
