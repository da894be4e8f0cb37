//! Discovery: taxonomy settings, the discovery image and PXE-less hosts.

use regex::Regex;
use serde_json::json;

use sat_client::host::{ContentHost, Satellite};
use sat_shared::{
    broker::BrokerRequest,
    entities::{
        Architecture, Domain, DomainSpec, EntityKind, HostGroup, HostGroupSpec, HostSpec,
        Location, OperatingSystem, Organization, PartitionTable, Subnet, SubnetSpec,
    },
    pxe::PxeLoader,
    repos::{DEFAULT_ARCHITECTURE, OsRelease, kickstart_repo, os_release_key},
};

use super::{
    DEFAULT_PARTITION_TABLE, module_location, module_org, module_target_sat, provisioning_host,
    session_location, session_provisioning_sat, session_sca_manifest_org,
};
use crate::{
    helpers::{FixtureError, FixtureResult, ensure_status, gen_alpha, gen_dns_label},
    scope::{FixtureContext, ResourceKind, ScopeLevel},
};

pub const IMPORT_DISK_IMAGE_WORKFLOW: &str = "import-disk-image";
pub const REMOVE_DISK_IMAGE_WORKFLOW: &str = "remove-disk-image";
pub const CONFIGURE_PXE_BOOT_TEMPLATE: &str = "configure-pxe-boot-rhv";

const DISCOVERY_IMAGE_DIR: &str = "/usr/share/foreman-discovery-image";
const PUB_DIR: &str = "/var/www/html/pub";
const PXE_GLOBAL_ENTRY: &str = "default_pxe_item_global";

/// Satellite with the discovery image installed and discovery turned on.
#[derive(Debug, Clone)]
pub struct DiscoverySat {
    pub sat: Satellite,
    /// File name of the discovery ISO published under `/pub`.
    pub iso: String,
}

/// Provisioning setup for discovered hosts in the discovery org/location.
#[derive(Debug, Clone)]
pub struct ProvisioningEnv {
    pub organization: Organization,
    pub location: Location,
    pub domain: Domain,
    pub subnet: Subnet,
    pub os: OperatingSystem,
    pub architecture: Architecture,
    pub ptable: PartitionTable,
    pub hostgroup: HostGroup,
}

/// Host group copying medium, OS, partition table, domain and architecture
/// from a freshly created host.
pub async fn module_discovery_hostgroup(ctx: &mut FixtureContext) -> FixtureResult<HostGroup> {
    let key = ResourceKind::DiscoveryHostGroup;
    if let Some(hostgroup) = ctx.cached(ScopeLevel::Module, &key)? {
        return Ok(hostgroup);
    }
    let sat = module_target_sat(ctx).await?;
    let org = module_org(ctx).await?;
    let location = module_location(ctx).await?;
    let api = sat.api().clone();

    let host = api
        .create_host(&HostSpec {
            name: gen_alpha(10).to_lowercase(),
            organization_id: org.id,
            location_id: location.id,
        })
        .await?;
    ctx.defer_delete(ScopeLevel::Module, api.clone(), EntityKind::Host, host.id, &host.name)?;

    let hostgroup = api
        .create_host_group(&HostGroupSpec {
            name: gen_alpha(12),
            organization_ids: vec![org.id],
            location_ids: vec![location.id],
            medium_id: host.medium_id,
            root_pass: Some(gen_alpha(10)),
            operatingsystem_id: host.operatingsystem_id,
            ptable_id: host.ptable_id,
            domain_id: host.domain_id,
            architecture_id: host.architecture_id,
            ..Default::default()
        })
        .await?;
    tracing::info!("Discovery host group {} from host {}", hostgroup.name, host.name);
    ctx.defer_delete(ScopeLevel::Module, api, EntityKind::HostGroup, hostgroup.id, &hostgroup.name)?;
    ctx.store(ScopeLevel::Module, key, hostgroup)
}

/// The module organization, set as `discovery_organization` until the module ends.
pub async fn discovery_org(ctx: &mut FixtureContext) -> FixtureResult<Organization> {
    let key = ResourceKind::DiscoveryOrganization;
    if let Some(org) = ctx.cached(ScopeLevel::Module, &key)? {
        return Ok(org);
    }
    let org = module_org(ctx).await?;
    let sat = module_target_sat(ctx).await?;
    ctx.guard_setting(ScopeLevel::Module, &sat, "discovery_organization", org.name.as_str())
        .await?;
    ctx.store(ScopeLevel::Module, key, org)
}

/// The module location, set as `discovery_location` until the module ends.
pub async fn discovery_location(ctx: &mut FixtureContext) -> FixtureResult<Location> {
    let key = ResourceKind::DiscoveryLocation;
    if let Some(location) = ctx.cached(ScopeLevel::Module, &key)? {
        return Ok(location);
    }
    let location = module_location(ctx).await?;
    let sat = module_target_sat(ctx).await?;
    ctx.guard_setting(ScopeLevel::Module, &sat, "discovery_location", location.name.as_str())
        .await?;
    ctx.store(ScopeLevel::Module, key, location)
}

/// Default PXE menu plus domain, subnet and host group for discovered hosts.
pub async fn provisioning_env(ctx: &mut FixtureContext) -> FixtureResult<ProvisioningEnv> {
    let key = ResourceKind::ProvisioningEnv;
    if let Some(env) = ctx.cached(ScopeLevel::Module, &key)? {
        return Ok(env);
    }
    let sat = module_target_sat(ctx).await?;
    let organization = discovery_org(ctx).await?;
    let location = discovery_location(ctx).await?;
    let api = sat.api().clone();

    let build = "hammer template build-pxe-default";
    ensure_status(build, sat.execute(build).await?)?;

    let rhel_version = ctx.settings().server.version.rhel_version;
    let os_key = os_release_key(rhel_version);
    let release: OsRelease = kickstart_repo(&os_key)
        .ok_or_else(|| FixtureError::LookupMiss(format!("no kickstart repository for '{os_key}'")))?
        .releasever
        .parse()
        .map_err(|e| FixtureError::Setup(format!("{e}")))?;
    let os = api
        .search_operating_systems(&format!(
            "family=Redhat and major={} and minor={}",
            release.major, release.minor
        ))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| FixtureError::LookupMiss(format!("Operating system Redhat {release} was not found")))?;
    let architecture = api
        .search_architectures(&format!("name={DEFAULT_ARCHITECTURE}"))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| FixtureError::LookupMiss(format!("Architecture {DEFAULT_ARCHITECTURE} was not found")))?;
    let ptable = api
        .search_partition_tables(&format!("name=\"{DEFAULT_PARTITION_TABLE}\""))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            FixtureError::LookupMiss(format!("Partition table '{DEFAULT_PARTITION_TABLE}' was not found"))
        })?;
    let proxy = api.default_smart_proxy().await?;
    let network = ctx.settings().vlan_networking.clone();

    let domain = api
        .create_domain(&DomainSpec {
            name: format!("{}.com", gen_dns_label(10)),
            dns_id: Some(proxy.id),
            location_ids: vec![location.id],
            organization_ids: vec![organization.id],
        })
        .await?;
    ctx.defer_delete(ScopeLevel::Module, api.clone(), EntityKind::Domain, domain.id, &domain.name)?;

    let subnet = api
        .create_subnet(&SubnetSpec {
            name: gen_alpha(10),
            network: network.subnet,
            mask: network.netmask,
            gateway: network.gateway,
            from: network.dhcp_from,
            to: network.dhcp_to,
            boot_mode: "DHCP".to_string(),
            ipam: "DHCP".to_string(),
            dhcp_id: proxy.id,
            tftp_id: proxy.id,
            template_id: proxy.id,
            dns_id: proxy.id,
            httpboot_id: proxy.id,
            discovery_id: proxy.id,
            remote_execution_proxy_ids: vec![proxy.id],
            domain_ids: vec![domain.id],
            location_ids: vec![location.id],
            organization_ids: vec![organization.id],
            ..Default::default()
        })
        .await?;
    ctx.defer_delete(ScopeLevel::Module, api.clone(), EntityKind::Subnet, subnet.id, &subnet.name)?;

    let hostgroup = api
        .create_host_group(&HostGroupSpec {
            name: gen_alpha(12),
            organization_ids: vec![organization.id],
            location_ids: vec![location.id],
            architecture_id: Some(architecture.id),
            domain_id: Some(domain.id),
            operatingsystem_id: Some(os.id),
            ptable_id: Some(ptable.id),
            subnet_id: Some(subnet.id),
            root_pass: Some(gen_alpha(10)),
            pxe_loader: Some(PxeLoader::default().pxe_loader().to_string()),
            ..Default::default()
        })
        .await?;
    ctx.defer_delete(ScopeLevel::Module, api, EntityKind::HostGroup, hostgroup.id, &hostgroup.name)?;
    tracing::info!(
        "Provisioning env for {}/{}: domain {}, subnet {}, host group {}",
        organization.name,
        location.name,
        domain.name,
        subnet.name,
        hostgroup.name
    );

    let env = ProvisioningEnv {
        organization,
        location,
        domain,
        subnet,
        os,
        architecture,
        ptable,
        hostgroup,
    };
    ctx.store(ScopeLevel::Module, key, env)
}

/// The provisioning satellite with the discovery image published and
/// discovery of new hosts into the session org/location switched on.
pub async fn session_discovery_sat(ctx: &mut FixtureContext) -> FixtureResult<DiscoverySat> {
    let key = ResourceKind::DiscoverySat;
    if let Some(disc) = ctx.cached(ScopeLevel::Session, &key)? {
        return Ok(disc);
    }
    let sat = session_provisioning_sat(ctx).await?.sat;
    let org = session_sca_manifest_org(ctx).await?;
    let location = session_location(ctx).await?;
    let subscription = ctx.settings().subscription.clone();

    // 1. Image package from the CDN
    let register = sat
        .register_to_cdn(&subscription.rhn_username, &subscription.rhn_password)
        .await?;
    ensure_status("subscription-manager register", register)?;
    let install = "yum -y --disableplugin=foreman-protector install foreman-discovery-image";
    let installed = sat.execute(install).await;
    if let Err(e) = sat.unregister().await {
        tracing::warn!("Could not unregister {}: {:#}", sat.hostname, e);
    }
    ensure_status(install, installed?)?;

    // 2. Publish the ISO for kexec
    let find = format!("find {DISCOVERY_IMAGE_DIR} -name \"foreman-discovery-image-*.iso\"");
    let found = ensure_status(&find, sat.execute(&find).await?)?;
    let iso_path = found
        .stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| FixtureError::LookupMiss(format!("no discovery ISO under {DISCOVERY_IMAGE_DIR}")))?
        .to_string();
    let iso = iso_path.rsplit('/').next().unwrap_or(&iso_path).to_string();
    let link = format!("ln -sf {iso_path} {PUB_DIR}/{iso}");
    ensure_status(&link, sat.execute(&link).await?)?;

    // 3. Boot unknown hosts into discovery
    let current = sat
        .api()
        .search_settings(&format!("name={PXE_GLOBAL_ENTRY}"))
        .await?
        .into_iter()
        .find(|s| s.name == PXE_GLOBAL_ENTRY)
        .ok_or_else(|| FixtureError::LookupMiss(format!("Setting {PXE_GLOBAL_ENTRY} was not found")))?;
    if current.value_string() != "discovery" {
        ctx.guard_setting(ScopeLevel::Session, &sat, PXE_GLOBAL_ENTRY, "discovery")
            .await?;
    }
    sat.api().build_pxe_default().await?;

    // 4. Where discovered hosts land, and auto-provisioning
    ctx.guard_setting(ScopeLevel::Session, &sat, "discovery_location", location.name.as_str())
        .await?;
    ctx.guard_setting(ScopeLevel::Session, &sat, "discovery_organization", org.name.as_str())
        .await?;
    ctx.guard_setting(ScopeLevel::Session, &sat, "discovery_auto", json!("true"))
        .await?;
    tracing::info!("Discovery enabled on {} with {}", sat.hostname, iso);

    ctx.store(ScopeLevel::Session, key, DiscoverySat { sat, iso })
}

/// A provisioning host that boots a discovery ISO remastered with its own
/// MAC address, so it discovers itself without PXE.
pub async fn pxeless_discovery_host(
    ctx: &mut FixtureContext,
    loader: PxeLoader,
) -> FixtureResult<ContentHost> {
    let host = provisioning_host(ctx, loader).await?;
    let disc = session_discovery_sat(ctx).await?;
    let sat = &disc.sat;
    let vlan_id = ctx.settings().provisioning.vlan_id;
    let firmware = host
        .broker_arg("target_vm_firmware")
        .unwrap_or(loader.vm_firmware())
        .to_string();
    let mac = host
        .broker_arg("provisioning_nic_mac_addr")
        .ok_or_else(|| {
            FixtureError::LookupMiss(format!("{} has no provisioning_nic_mac_addr", host.hostname))
        })?
        .to_string();

    // 1. Remaster the image with the host's identity baked in
    let remaster = format!(
        "cd {PUB_DIR} && discovery-remaster {} \"proxy.type=foreman proxy.url=https://{}:443 fdi.pxmac={} fdi.pxauto=1\"",
        disc.iso, sat.hostname, mac
    );
    let output = ensure_status(&remaster, sat.execute(&remaster).await?)?;
    let pattern = Regex::new(r"foreman-discovery-image\S+")
        .map_err(|e| FixtureError::Setup(format!("bad image pattern: {e}")))?;
    let fdi = pattern
        .find(&output.stdout)
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| {
            FixtureError::LookupMiss(format!("discovery-remaster printed no image name: {}", output.stdout.trim()))
        })?;

    // 2. Upload it as a disk image
    let image_name = format!("{}-{}", gen_alpha(8), disc.iso);
    let broker = ctx.broker().clone();
    broker
        .execute(
            &BrokerRequest::workflow(IMPORT_DISK_IMAGE_WORKFLOW)
                .arg("import_disk_image_name", image_name.as_str())
                .arg("import_disk_image_url", format!("https://{}/pub/{}", sat.hostname, fdi)),
        )
        .await?;
    {
        let broker = broker.clone();
        let image_name = image_name.clone();
        ctx.defer(ScopeLevel::Function, format!("remove disk image {image_name}"), move || async move {
            broker
                .execute(
                    &BrokerRequest::workflow(REMOVE_DISK_IMAGE_WORKFLOW)
                        .arg("remove_disk_image_name", image_name.as_str()),
                )
                .await?;
            Ok(())
        })?;
    }

    // 3. Boot the host from it
    let boot = BrokerRequest::job_template(CONFIGURE_PXE_BOOT_TEMPLATE)
        .arg("target_host", host.name.as_str())
        .arg("target_vlan_id", vlan_id)
        .arg("target_vm_firmware", firmware.as_str())
        .arg("target_boot_scenario", "pxeless_pre");
    broker
        .execute(&boot.clone().arg("target_vm_cd_iso", image_name.as_str()))
        .await?;
    tracing::info!("{} boots from {}", host.hostname, image_name);
    ctx.defer(ScopeLevel::Function, format!("detach {image_name} from {}", host.name), move || async move {
        broker.execute(&boot).await?;
        Ok(())
    })?;

    Ok(host)
}
