use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type EntityId = u64;

/// `{id, name}` pair the API embeds when one record points at another.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Reference {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Organization {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Location {
    pub id: EntityId,
    pub name: String,
}

/// Capsule: the proxy serving DNS/DHCP/TFTP/templates/discovery for a segment.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SmartProxy {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub locations: Vec<Reference>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Domain {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub dns_id: Option<EntityId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Subnet {
    pub id: EntityId,
    pub name: String,
    pub network: String,
    pub mask: String,
    #[serde(default)]
    pub gateway: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub dns_primary: Option<String>,
    #[serde(default)]
    pub dns_secondary: Option<String>,
    #[serde(default)]
    pub boot_mode: Option<String>,
    #[serde(default)]
    pub ipam: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: EntityId,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub product: Option<Reference>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ContentView {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub repository_ids: Vec<EntityId>,
    #[serde(default)]
    pub version_count: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ActivationKey {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub content_view_id: Option<EntityId>,
    #[serde(default)]
    pub environment: Option<Reference>,
}

/// One entry of an activation key's product content listing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProductContent {
    pub name: String,
    pub label: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ContentOverride {
    pub content_label: String,
    pub value: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct LifecycleEnvironment {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub library: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct OperatingSystem {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    pub major: String,
    #[serde(default)]
    pub minor: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Architecture {
    pub id: EntityId,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    pub id: EntityId,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Host {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub medium_id: Option<EntityId>,
    #[serde(default)]
    pub operatingsystem_id: Option<EntityId>,
    #[serde(default)]
    pub ptable_id: Option<EntityId>,
    #[serde(default)]
    pub domain_id: Option<EntityId>,
    #[serde(default)]
    pub architecture_id: Option<EntityId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HostGroup {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub pxe_loader: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ComputeResource {
    pub id: EntityId,
    pub name: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

/// A global product setting. `value` is whatever JSON the server stores,
/// including `null` for never-set entries.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Setting {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl Setting {
    /// Value as the string the API accepts back on update. Unset reads as "".
    pub fn value_string(&self) -> String {
        setting_value_string(&self.value)
    }
}

pub fn setting_value_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---- creation payloads ----

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct DomainSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_id: Option<EntityId>,
    pub location_ids: Vec<EntityId>,
    pub organization_ids: Vec<EntityId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct SubnetSpec {
    pub name: String,
    pub network: String,
    pub mask: String,
    pub gateway: String,
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_primary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_secondary: Option<String>,
    pub boot_mode: String,
    pub ipam: String,
    pub dhcp_id: EntityId,
    pub tftp_id: EntityId,
    pub template_id: EntityId,
    pub dns_id: EntityId,
    pub httpboot_id: EntityId,
    pub discovery_id: EntityId,
    pub remote_execution_proxy_ids: Vec<EntityId>,
    pub domain_ids: Vec<EntityId>,
    pub location_ids: Vec<EntityId>,
    pub organization_ids: Vec<EntityId>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ProductSpec {
    pub organization_id: EntityId,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RepositorySpec {
    pub product_id: EntityId,
    pub name: String,
    pub content_type: String,
    pub url: String,
}

/// Enable a Red Hat repository set and resolve the id of the enabled repo.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RedHatRepositorySpec {
    pub organization_id: EntityId,
    pub basearch: String,
    pub product: String,
    pub repo: String,
    pub reposet: String,
    pub releasever: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ContentViewSpec {
    pub organization_id: EntityId,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ActivationKeySpec {
    pub organization_id: EntityId,
    pub name: String,
    pub content_view_id: EntityId,
    pub environment_id: EntityId,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GroupParameter {
    pub name: String,
    pub parameter_type: String,
    pub value: String,
}

impl GroupParameter {
    pub fn string(name: &str, value: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            parameter_type: "string".to_string(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct HostGroupSpec {
    pub name: String,
    pub organization_ids: Vec<EntityId>,
    pub location_ids: Vec<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_source_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_view_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kickstart_repository_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifecycle_environment_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_resource_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_pass: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operatingsystem_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ptable_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pxe_loader: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub group_parameters_attributes: Vec<GroupParameter>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct HostSpec {
    pub name: String,
    pub organization_id: EntityId,
    pub location_id: EntityId,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ComputeResourceSpec {
    pub name: String,
    pub provider: String,
    pub url: String,
    pub user: String,
    pub password: String,
    pub datacenter: String,
    pub organization_ids: Vec<EntityId>,
    pub location_ids: Vec<EntityId>,
}

/// Entity kinds the fixtures delete on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Organization,
    Location,
    Domain,
    Subnet,
    Host,
    HostGroup,
    ComputeResource,
}

impl EntityKind {
    /// Collection path segment under `/api`.
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Organization => "organizations",
            EntityKind::Location => "locations",
            EntityKind::Domain => "domains",
            EntityKind::Subnet => "subnets",
            EntityKind::Host => "hosts",
            EntityKind::HostGroup => "hostgroups",
            EntityKind::ComputeResource => "compute_resources",
        }
    }
}
