use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

pub const SETTINGS_PATH_ENV: &str = "SAT_FIXTURES_SETTINGS";
const DEFAULT_SETTINGS_PATH: &str = "settings.yaml";

fn default_scheme() -> String {
    "https".to_string()
}
fn default_admin_username() -> String {
    "admin".to_string()
}
fn default_admin_password() -> String {
    "changeme".to_string()
}
fn default_ssh_username() -> String {
    "root".to_string()
}
fn default_release() -> String {
    "stream".to_string()
}
fn default_rhel_version() -> u32 {
    9
}
fn default_poll_timeout() -> u64 {
    2500
}
fn default_poll_rate() -> u64 {
    5
}
fn default_publish_rate() -> u64 {
    15
}
fn default_publish_tries() -> u32 {
    10
}
fn default_broker_binary() -> String {
    "broker".to_string()
}
fn default_satellite_workflow() -> String {
    "deploy-satellite".to_string()
}
fn default_installer_workflow() -> String {
    "deploy-sat-ready-rhel".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct VersionSettings {
    #[serde(default = "default_release")]
    pub release: String,
    #[serde(default = "default_rhel_version")]
    pub rhel_version: u32,
    #[serde(default)]
    pub is_stream: bool,
}

impl Default for VersionSettings {
    fn default() -> Self {
        Self {
            release: default_release(),
            rhel_version: default_rhel_version(),
            is_stream: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
    #[serde(default = "default_ssh_username")]
    pub ssh_username: String,
    #[serde(default)]
    pub verify_ssl: bool,
    #[serde(default)]
    pub version: VersionSettings,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            hostname: None,
            scheme: default_scheme(),
            port: None,
            admin_username: default_admin_username(),
            admin_password: default_admin_password(),
            ssh_username: default_ssh_username(),
            verify_ssl: false,
            version: VersionSettings::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct ProvisioningSettings {
    #[serde(default)]
    pub vlan_id: u32,
    #[serde(default)]
    pub host_root_password: String,
    #[serde(default)]
    pub host_ssh_key_priv: String,
    #[serde(default)]
    pub host_ssh_key_pub: String,
}

/// Static network used by `provisioning_env` when no broker-built VLAN exists.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct VlanNetworkingSettings {
    #[serde(default)]
    pub subnet: String,
    #[serde(default)]
    pub netmask: String,
    #[serde(default)]
    pub gateway: String,
    #[serde(default)]
    pub dhcp_from: String,
    #[serde(default)]
    pub dhcp_to: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct RepoSettings {
    /// Satellite client repo URL per `rhelN` key.
    #[serde(default)]
    pub satclient_repo: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct SubscriptionSettings {
    #[serde(default)]
    pub rhn_username: String,
    #[serde(default)]
    pub rhn_password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct VmwareSettings {
    #[serde(default)]
    pub vcenter: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub datacenter: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TaskSettings {
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_poll_rate")]
    pub poll_rate_secs: u64,
    #[serde(default = "default_publish_rate")]
    pub publish_rate_secs: u64,
    #[serde(default = "default_publish_tries")]
    pub publish_max_tries: u32,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            poll_timeout_secs: default_poll_timeout(),
            poll_rate_secs: default_poll_rate(),
            publish_rate_secs: default_publish_rate(),
            publish_max_tries: default_publish_tries(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    #[serde(default = "default_broker_binary")]
    pub binary: String,
    #[serde(default = "default_satellite_workflow")]
    pub satellite_workflow: String,
    #[serde(default = "default_installer_workflow")]
    pub installer_workflow: String,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            binary: default_broker_binary(),
            satellite_workflow: default_satellite_workflow(),
            installer_workflow: default_installer_workflow(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LoggingSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub provisioning: ProvisioningSettings,
    #[serde(default)]
    pub vlan_networking: VlanNetworkingSettings,
    #[serde(default)]
    pub repos: RepoSettings,
    #[serde(default)]
    pub subscription: SubscriptionSettings,
    #[serde(default)]
    pub vmware: VmwareSettings,
    #[serde(default)]
    pub tasks: TaskSettings,
    #[serde(default)]
    pub broker: BrokerSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load from `$SAT_FIXTURES_SETTINGS`, else `./settings.yaml`. A missing
    /// file yields defaults.
    pub fn from_env() -> Result<Self> {
        let path = std::env::var(SETTINGS_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_PATH));

        if path.exists() {
            Self::load(&path)
        } else {
            warn!("Settings file {:?} not found, using defaults", path);
            Ok(Self::default())
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;
        let settings: Settings = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse settings file {:?}", path))?;
        info!("Settings loaded from: {:?}", path);
        Ok(settings)
    }

    /// Dotted-key lookup, e.g. `provisioning.vlan_id`. Missing keys and
    /// explicit nulls both read as `None`.
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut node = serde_json::to_value(self).ok()?;
        for part in key.split('.') {
            node = node.get_mut(part)?.take();
        }
        (!node.is_null()).then_some(node)
    }

    /// Dotted-key write. The result must still decode as `Settings`.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let mut root = serde_json::to_value(&*self).context("Failed to serialize settings")?;
        let (parents, leaf) = match key.rsplit_once('.') {
            Some((parents, leaf)) => (Some(parents), leaf),
            None => (None, key),
        };

        let mut node = &mut root;
        for part in parents.into_iter().flat_map(|p| p.split('.')) {
            node = node
                .get_mut(part)
                .ok_or_else(|| anyhow!("Unknown settings section '{part}' in '{key}'"))?;
        }
        let object = node
            .as_object_mut()
            .ok_or_else(|| anyhow!("Settings key '{key}' does not point into a section"))?;
        object.insert(leaf.to_string(), value.into());

        *self = serde_json::from_value(root)
            .with_context(|| format!("Invalid value for settings key '{key}'"))?;
        Ok(())
    }

    /// Base URL of the configured server, if any.
    pub fn server_url(&self) -> Option<String> {
        self.server
            .hostname
            .as_deref()
            .map(|host| server_url(&self.server, host))
    }
}

pub fn server_url(server: &ServerSettings, hostname: &str) -> String {
    match server.port {
        Some(port) => format!("{}://{}:{}", server.scheme, hostname, port),
        None => format!("{}://{}", server.scheme, hostname),
    }
}
