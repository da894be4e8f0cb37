//! Typed surface of the satellite REST API used by the fixtures.

mod rest;

pub use rest::RestApi;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use sat_shared::entities::{
    ActivationKey, ActivationKeySpec, Architecture, ComputeResource, ComputeResourceSpec,
    ContentOverride, ContentView, ContentViewSpec, Domain, DomainSpec, EntityId, EntityKind, Host,
    HostGroup, HostGroupSpec, HostSpec, LifecycleEnvironment, Location, OperatingSystem,
    Organization, PartitionTable, Product, ProductContent, ProductSpec, RedHatRepositorySpec,
    Repository, RepositorySpec, Setting, SmartProxy, Subnet, SubnetSpec,
};
use sat_shared::task::{ForemanTask, TaskRef};

#[async_trait]
pub trait ForemanApi: Send + Sync {
    /// Server status document; used to check that an instance is reachable.
    async fn status(&self) -> Result<Value>;

    async fn create_organization(&self, name: &str) -> Result<Organization>;
    async fn create_location(&self, name: &str) -> Result<Location>;
    async fn delete(&self, kind: EntityKind, id: EntityId) -> Result<()>;

    /// The smart proxy that runs on the satellite itself.
    async fn default_smart_proxy(&self) -> Result<SmartProxy>;
    async fn update_smart_proxy_locations(
        &self,
        proxy_id: EntityId,
        location_ids: &[EntityId],
    ) -> Result<SmartProxy>;

    async fn create_domain(&self, spec: &DomainSpec) -> Result<Domain>;
    async fn create_subnet(&self, spec: &SubnetSpec) -> Result<Subnet>;
    async fn search_architectures(&self, query: &str) -> Result<Vec<Architecture>>;
    async fn search_partition_tables(&self, query: &str) -> Result<Vec<PartitionTable>>;
    async fn search_operating_systems(&self, query: &str) -> Result<Vec<OperatingSystem>>;
    async fn read_operating_system(&self, id: EntityId) -> Result<OperatingSystem>;
    async fn create_compute_resource(&self, spec: &ComputeResourceSpec) -> Result<ComputeResource>;
    async fn create_host(&self, spec: &HostSpec) -> Result<Host>;
    async fn create_host_group(&self, spec: &HostGroupSpec) -> Result<HostGroup>;
    async fn build_pxe_default(&self) -> Result<()>;

    async fn search_settings(&self, query: &str) -> Result<Vec<Setting>>;
    async fn update_setting(&self, name: &str, value: &Value) -> Result<Setting>;

    async fn library_environment(&self, organization_id: EntityId) -> Result<LifecycleEnvironment>;
    async fn create_product(&self, spec: &ProductSpec) -> Result<Product>;
    async fn create_repository(&self, spec: &RepositorySpec) -> Result<Repository>;
    async fn read_repository(&self, id: EntityId) -> Result<Repository>;
    /// Queue a sync and return without waiting for it.
    async fn sync_repository(&self, id: EntityId) -> Result<TaskRef>;
    /// Enable a Red Hat repository set and return the id of the enabled repo.
    async fn enable_red_hat_repository(&self, spec: &RedHatRepositorySpec) -> Result<EntityId>;
    async fn create_content_view(&self, spec: &ContentViewSpec) -> Result<ContentView>;
    async fn set_content_view_repositories(
        &self,
        content_view_id: EntityId,
        repository_ids: &[EntityId],
    ) -> Result<ContentView>;
    async fn publish_content_view(&self, content_view_id: EntityId) -> Result<TaskRef>;
    async fn search_content_views(
        &self,
        organization_id: EntityId,
        name: &str,
    ) -> Result<Vec<ContentView>>;
    async fn create_activation_key(&self, spec: &ActivationKeySpec) -> Result<ActivationKey>;
    /// Product content visible to the key, regardless of current overrides.
    async fn activation_key_product_content(&self, key_id: EntityId)
    -> Result<Vec<ProductContent>>;
    async fn activation_key_content_override(
        &self,
        key_id: EntityId,
        overrides: &[ContentOverride],
    ) -> Result<()>;

    async fn read_task(&self, id: &str) -> Result<ForemanTask>;
    async fn search_tasks(&self, query: &str) -> Result<Vec<ForemanTask>>;
}
