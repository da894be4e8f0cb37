use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tracing::debug;

use sat_shared::entities::{
    ActivationKey, ActivationKeySpec, Architecture, ComputeResource, ComputeResourceSpec,
    ContentOverride, ContentView, ContentViewSpec, Domain, DomainSpec, EntityId, EntityKind, Host,
    HostGroup, HostGroupSpec, HostSpec, LifecycleEnvironment, Location, OperatingSystem,
    Organization, PartitionTable, Product, ProductContent, ProductSpec, RedHatRepositorySpec,
    Repository, RepositorySpec, Setting, SmartProxy, Subnet, SubnetSpec,
};
use sat_shared::task::{ForemanTask, TaskRef};

use super::ForemanApi;
use crate::config::{ServerSettings, server_url};

#[derive(Deserialize)]
struct Results<T> {
    results: Vec<T>,
}

#[derive(Deserialize)]
struct RepositorySet {
    id: EntityId,
}

/// JSON-over-HTTPS client for one satellite, authenticated with basic auth.
#[derive(Clone)]
pub struct RestApi {
    client: Client,
    base_url: String,
    hostname: String,
    username: String,
    password: String,
}

impl RestApi {
    pub fn new(
        base_url: impl Into<String>,
        hostname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        verify_ssl: bool,
    ) -> Result<Self> {
        let client = if verify_ssl {
            Client::new()
        } else {
            // lab instances run with self-signed certificates
            Client::builder()
                .danger_accept_invalid_certs(true)
                .build()?
        };
        Ok(Self {
            client,
            base_url: base_url.into(),
            hostname: hostname.into(),
            username: username.into(),
            password: password.into(),
        })
    }

    pub fn from_settings(server: &ServerSettings, hostname: &str) -> Result<Self> {
        Self::new(
            server_url(server, hostname),
            hostname,
            &server.admin_username,
            &server.admin_password,
            server.verify_ssl,
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, what: &str) -> Result<T> {
        let response = self
            .authed(request)
            .send()
            .await
            .with_context(|| format!("{what}: request failed"))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{what}: server answered {status}: {body}");
        }
        response
            .json::<T>()
            .await
            .with_context(|| format!("{what}: unexpected response body"))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        debug!("GET {} {:?}", path, query);
        self.send(self.client.get(self.url(path)).query(query), &format!("GET {path}"))
            .await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        debug!("POST {}", path);
        self.send(self.client.post(self.url(path)).json(body), &format!("POST {path}"))
            .await
    }

    async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        debug!("PUT {}", path);
        self.send(self.client.put(self.url(path)).json(body), &format!("PUT {path}"))
            .await
    }

    async fn search<T: DeserializeOwned>(
        &self,
        path: &str,
        search: &str,
        extra: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let mut query = vec![("search", search.to_string()), ("per_page", "all".to_string())];
        query.extend(extra.iter().cloned());
        let page: Results<T> = self.get(path, &query).await?;
        Ok(page.results)
    }
}

#[async_trait]
impl ForemanApi for RestApi {
    async fn status(&self) -> Result<Value> {
        self.get("/api/status", &[]).await
    }

    async fn create_organization(&self, name: &str) -> Result<Organization> {
        self.post("/api/organizations", &json!({ "organization": { "name": name } }))
            .await
    }

    async fn create_location(&self, name: &str) -> Result<Location> {
        self.post("/api/locations", &json!({ "location": { "name": name } }))
            .await
    }

    async fn delete(&self, kind: EntityKind, id: EntityId) -> Result<()> {
        let path = format!("/api/{}/{}", kind.collection(), id);
        debug!("DELETE {}", path);
        let _: Value = self
            .send(self.client.delete(self.url(&path)), &format!("DELETE {path}"))
            .await?;
        Ok(())
    }

    async fn default_smart_proxy(&self) -> Result<SmartProxy> {
        let proxies: Vec<SmartProxy> = self
            .search("/api/smart_proxies", &format!("name = \"{}\"", self.hostname), &[])
            .await?;
        proxies
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No smart proxy named {} found", self.hostname))
    }

    async fn update_smart_proxy_locations(
        &self,
        proxy_id: EntityId,
        location_ids: &[EntityId],
    ) -> Result<SmartProxy> {
        self.put(
            &format!("/api/smart_proxies/{proxy_id}"),
            &json!({ "smart_proxy": { "location_ids": location_ids } }),
        )
        .await
    }

    async fn create_domain(&self, spec: &DomainSpec) -> Result<Domain> {
        self.post("/api/domains", &json!({ "domain": spec })).await
    }

    async fn create_subnet(&self, spec: &SubnetSpec) -> Result<Subnet> {
        self.post("/api/subnets", &json!({ "subnet": spec })).await
    }

    async fn search_architectures(&self, query: &str) -> Result<Vec<Architecture>> {
        self.search("/api/architectures", query, &[]).await
    }

    async fn search_partition_tables(&self, query: &str) -> Result<Vec<PartitionTable>> {
        self.search("/api/ptables", query, &[]).await
    }

    async fn search_operating_systems(&self, query: &str) -> Result<Vec<OperatingSystem>> {
        self.search("/api/operatingsystems", query, &[]).await
    }

    async fn read_operating_system(&self, id: EntityId) -> Result<OperatingSystem> {
        self.get(&format!("/api/operatingsystems/{id}"), &[]).await
    }

    async fn create_compute_resource(&self, spec: &ComputeResourceSpec) -> Result<ComputeResource> {
        self.post("/api/compute_resources", &json!({ "compute_resource": spec }))
            .await
    }

    async fn create_host(&self, spec: &HostSpec) -> Result<Host> {
        self.post("/api/hosts", &json!({ "host": spec })).await
    }

    async fn create_host_group(&self, spec: &HostGroupSpec) -> Result<HostGroup> {
        self.post("/api/hostgroups", &json!({ "hostgroup": spec })).await
    }

    async fn build_pxe_default(&self) -> Result<()> {
        let _: Value = self
            .post("/api/provisioning_templates/build_pxe_default", &json!({}))
            .await?;
        Ok(())
    }

    async fn search_settings(&self, query: &str) -> Result<Vec<Setting>> {
        self.search("/api/settings", query, &[]).await
    }

    async fn update_setting(&self, name: &str, value: &Value) -> Result<Setting> {
        self.put(
            &format!("/api/settings/{name}"),
            &json!({ "setting": { "value": value } }),
        )
        .await
    }

    async fn library_environment(&self, organization_id: EntityId) -> Result<LifecycleEnvironment> {
        let page: Results<LifecycleEnvironment> = self
            .get(
                &format!("/katello/api/organizations/{organization_id}/environments"),
                &[("library", "true".to_string())],
            )
            .await?;
        page.results
            .into_iter()
            .find(|env| env.library)
            .ok_or_else(|| anyhow!("Organization {organization_id} has no Library environment"))
    }

    async fn create_product(&self, spec: &ProductSpec) -> Result<Product> {
        self.post("/katello/api/products", spec).await
    }

    async fn create_repository(&self, spec: &RepositorySpec) -> Result<Repository> {
        self.post("/katello/api/repositories", spec).await
    }

    async fn read_repository(&self, id: EntityId) -> Result<Repository> {
        self.get(&format!("/katello/api/repositories/{id}"), &[]).await
    }

    async fn sync_repository(&self, id: EntityId) -> Result<TaskRef> {
        self.post(&format!("/katello/api/repositories/{id}/sync"), &json!({}))
            .await
    }

    async fn enable_red_hat_repository(&self, spec: &RedHatRepositorySpec) -> Result<EntityId> {
        let org = ("organization_id", spec.organization_id.to_string());

        let products: Vec<Product> = self
            .search(
                "/katello/api/products",
                &format!("name = \"{}\"", spec.product),
                &[org.clone()],
            )
            .await?;
        let product = products
            .first()
            .ok_or_else(|| anyhow!("Product '{}' not found", spec.product))?;

        let sets: Vec<RepositorySet> = self
            .search(
                "/katello/api/repository_sets",
                &format!("name = \"{}\"", spec.reposet),
                &[org.clone(), ("product_id", product.id.to_string())],
            )
            .await?;
        let set = sets
            .first()
            .ok_or_else(|| anyhow!("Repository set '{}' not found", spec.reposet))?;

        let path = format!("/katello/api/repository_sets/{}/enable", set.id);
        let response = self
            .authed(self.client.put(self.url(&path)).json(&json!({
                "basearch": spec.basearch,
                "releasever": spec.releasever,
                "product_id": product.id,
            })))
            .send()
            .await
            .with_context(|| format!("PUT {path}: request failed"))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            // enabling twice is not an error for our purposes
            if !body.contains("already been enabled") {
                bail!("PUT {path}: server answered {status}: {body}");
            }
        }

        let repos: Vec<Repository> = self
            .search(
                "/katello/api/repositories",
                &format!("name = \"{}\"", spec.repo),
                &[org],
            )
            .await?;
        repos
            .first()
            .map(|r| r.id)
            .ok_or_else(|| anyhow!("Enabled repository '{}' not found", spec.repo))
    }

    async fn create_content_view(&self, spec: &ContentViewSpec) -> Result<ContentView> {
        self.post("/katello/api/content_views", spec).await
    }

    async fn set_content_view_repositories(
        &self,
        content_view_id: EntityId,
        repository_ids: &[EntityId],
    ) -> Result<ContentView> {
        self.put(
            &format!("/katello/api/content_views/{content_view_id}"),
            &json!({ "repository_ids": repository_ids }),
        )
        .await
    }

    async fn publish_content_view(&self, content_view_id: EntityId) -> Result<TaskRef> {
        self.post(
            &format!("/katello/api/content_views/{content_view_id}/publish"),
            &json!({}),
        )
        .await
    }

    async fn search_content_views(
        &self,
        organization_id: EntityId,
        name: &str,
    ) -> Result<Vec<ContentView>> {
        let page: Results<ContentView> = self
            .get(
                "/katello/api/content_views",
                &[
                    ("organization_id", organization_id.to_string()),
                    ("name", name.to_string()),
                ],
            )
            .await?;
        Ok(page.results)
    }

    async fn create_activation_key(&self, spec: &ActivationKeySpec) -> Result<ActivationKey> {
        self.post("/katello/api/activation_keys", spec).await
    }

    async fn activation_key_product_content(
        &self,
        key_id: EntityId,
    ) -> Result<Vec<ProductContent>> {
        let page: Results<ProductContent> = self
            .get(
                &format!("/katello/api/activation_keys/{key_id}/product_content"),
                &[("content_access_mode_all", "1".to_string())],
            )
            .await?;
        Ok(page.results)
    }

    async fn activation_key_content_override(
        &self,
        key_id: EntityId,
        overrides: &[ContentOverride],
    ) -> Result<()> {
        let _: Value = self
            .put(
                &format!("/katello/api/activation_keys/{key_id}/content_override"),
                &json!({ "content_overrides": overrides }),
            )
            .await?;
        Ok(())
    }

    async fn read_task(&self, id: &str) -> Result<ForemanTask> {
        self.get(&format!("/foreman_tasks/api/tasks/{id}"), &[]).await
    }

    async fn search_tasks(&self, query: &str) -> Result<Vec<ForemanTask>> {
        self.search("/foreman_tasks/api/tasks", query, &[]).await
    }
}
