use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BrokerAction {
    Workflow(String),
    JobTemplate(String),
}

/// A named broker workflow (or job template) plus its keyword arguments.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BrokerRequest {
    pub action: BrokerAction,
    pub args: BTreeMap<String, Value>,
}

impl BrokerRequest {
    pub fn workflow(name: impl Into<String>) -> Self {
        Self {
            action: BrokerAction::Workflow(name.into()),
            args: BTreeMap::new(),
        }
    }

    pub fn job_template(name: impl Into<String>) -> Self {
        Self {
            action: BrokerAction::JobTemplate(name.into()),
            args: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.args.insert(key.to_string(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        match &self.action {
            BrokerAction::Workflow(name) | BrokerAction::JobTemplate(name) => name,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.args.get(key)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DataOutError {
    #[error("broker output has no data_out section")]
    Missing,
    #[error("broker data_out has unexpected shape: {0}")]
    Shape(#[from] serde_json::Error),
}

/// Decode the `data_out` section of a provisioning workflow result.
pub fn data_out<T: DeserializeOwned>(output: &Value) -> Result<T, DataOutError> {
    let section = output.get("data_out").ok_or(DataOutError::Missing)?;
    Ok(serde_json::from_value(section.clone())?)
}

/// Artifacts of the workflow that wires a satellite into the provisioning VLAN.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProvisioningNetworkOutput {
    /// Interface address in CIDR form, e.g. `192.168.10.2/24`.
    pub provisioning_addr_ipv4: String,
    pub provisioning_gw_ipv4: String,
    pub provisioning_host_range_start: String,
    pub provisioning_host_range_end: String,
    #[serde(default)]
    pub provisioning_upstream_dns: Vec<String>,
}
