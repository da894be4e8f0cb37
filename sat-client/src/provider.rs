//! Where satellite handles come from.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tracing::{info, warn};

use sat_shared::broker::BrokerRequest;

use crate::{
    api::{ForemanApi, RestApi},
    broker::Broker,
    config::Settings,
    host::{ContentHost, Satellite},
    shell::{RemoteShell, SshShell},
};

#[async_trait]
pub trait SatelliteProvider: Send + Sync {
    /// Handle for an existing instance, verified to answer.
    async fn connect(&self, settings: &Settings, hostname: &str) -> Result<Satellite>;

    /// Handle for the configured instance, built without contacting it.
    fn from_settings(&self, settings: &Settings) -> Result<Satellite>;

    /// A fresh, disposable instance.
    async fn provision(&self, settings: &Settings) -> Result<Satellite>;

    /// The prepared instance pinned to a RHEL major, for installer runs.
    async fn installer_ready(&self, settings: &Settings, rhel_version: u32) -> Result<Satellite>;

    /// Tear down and hand back an instance obtained from `provision`.
    async fn release(&self, satellite: &Satellite) -> Result<()>;
}

/// Builds handles over the REST and ssh adapters and gets new instances from
/// the broker.
pub struct BrokerSatelliteProvider {
    broker: Arc<dyn Broker>,
}

impl BrokerSatelliteProvider {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }

    fn handle(settings: &Settings, hostname: &str, name: &str, version: &str) -> Result<Satellite> {
        let api: Arc<dyn ForemanApi> = Arc::new(RestApi::from_settings(&settings.server, hostname)?);
        let shell: Arc<dyn RemoteShell> =
            Arc::new(SshShell::new(hostname, &settings.server.ssh_username));
        Ok(Satellite::new(
            hostname,
            name,
            version,
            settings.server.version.is_stream,
            api,
            shell,
        ))
    }

    async fn checkout_one(&self, request: BrokerRequest, settings: &Settings) -> Result<Satellite> {
        let host = self
            .broker
            .checkout(&request, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Broker returned no host for {}", request.name()))?;
        info!("Checked out {} ({})", host.hostname, request.name());
        Self::handle(
            settings,
            &host.hostname,
            &host.name,
            &settings.server.version.release,
        )
    }
}

#[async_trait]
impl SatelliteProvider for BrokerSatelliteProvider {
    async fn connect(&self, settings: &Settings, hostname: &str) -> Result<Satellite> {
        let mut satellite = Self::handle(settings, hostname, hostname, &settings.server.version.release)?;
        let status = satellite
            .api()
            .status()
            .await
            .with_context(|| format!("Satellite {hostname} is not reachable"))?;
        if let Some(version) = status.get("version").and_then(|v| v.as_str()) {
            satellite.version = version.to_string();
        }
        Ok(satellite)
    }

    fn from_settings(&self, settings: &Settings) -> Result<Satellite> {
        let hostname = settings
            .server
            .hostname
            .as_deref()
            .ok_or_else(|| anyhow!("server.hostname is not configured"))?;
        Self::handle(settings, hostname, hostname, &settings.server.version.release)
    }

    async fn provision(&self, settings: &Settings) -> Result<Satellite> {
        let request = BrokerRequest::workflow(&settings.broker.satellite_workflow)
            .arg("deploy_sat_version", settings.server.version.release.as_str())
            .arg("deploy_rhel_version", settings.server.version.rhel_version);
        self.checkout_one(request, settings).await
    }

    async fn installer_ready(&self, settings: &Settings, rhel_version: u32) -> Result<Satellite> {
        let request = BrokerRequest::workflow(&settings.broker.installer_workflow)
            .arg("deploy_rhel_version", rhel_version);
        self.checkout_one(request, settings).await
    }

    async fn release(&self, satellite: &Satellite) -> Result<()> {
        if let Err(e) = satellite.unregister().await {
            warn!("Could not unregister {}: {:#}", satellite.hostname, e);
        }
        let host = ContentHost::new(
            &satellite.name,
            &satellite.hostname,
            Default::default(),
            false,
            satellite.shell().clone(),
        );
        self.broker.checkin(&[host]).await
    }
}
