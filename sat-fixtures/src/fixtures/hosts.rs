//! Provisioning VMs from the broker and the host group that installs them.

use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use sat_client::host::ContentHost;
use sat_shared::{
    broker::BrokerRequest,
    entities::{EntityKind, GroupParameter, HostGroup, HostGroupSpec},
    pxe::PxeLoader,
};
use tempfile::NamedTempFile;

use super::{
    default_architecture, default_partitiontable, session_lce_library, session_location,
    session_provisioning_capsule, session_provisioning_rhel_content, session_provisioning_sat,
    session_sca_manifest_org,
};
use crate::{
    helpers::{FixtureError, FixtureResult, gen_alpha},
    scope::{FixtureContext, ResourceKind, ScopeLevel},
};

pub const PROVISIONING_HOST_WORKFLOW: &str = "deploy-configure-pxe-provisioning-host-rhv";
pub const DEFAULT_HOST_COUNT: usize = 2;

/// Private key for the provisioned VMs, on disk for the whole session.
pub async fn session_ssh_key_file(ctx: &mut FixtureContext) -> FixtureResult<PathBuf> {
    let key = ResourceKind::SshKeyFile;
    if let Some(file) = ctx.cached::<Arc<NamedTempFile>>(ScopeLevel::Session, &key)? {
        return Ok(file.path().to_path_buf());
    }
    let file = write_key_file(&ctx.settings().provisioning.host_ssh_key_priv)?;
    tracing::debug!("Wrote provisioning ssh key to {:?}", file.path());
    // dropped with the session cache, which removes the file
    let file = ctx.store(ScopeLevel::Session, key, Arc::new(file))?;
    Ok(file.path().to_path_buf())
}

fn write_key_file(private_key: &str) -> FixtureResult<NamedTempFile> {
    let io_error = |e: std::io::Error| FixtureError::Setup(format!("cannot write ssh key file: {e}"));
    let mut file = tempfile::Builder::new()
        .prefix("sat-fixtures-")
        .suffix(".key")
        .tempfile()
        .map_err(io_error)?;
    file.write_all(private_key.as_bytes()).map_err(io_error)?;
    file.flush().map_err(io_error)?;
    restrict_permissions(file.path()).map_err(io_error)?;
    Ok(file)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Resolve a requested loader key; no request means BIOS.
pub fn pxe_loader(param: Option<&str>) -> FixtureResult<PxeLoader> {
    match param {
        None => Ok(PxeLoader::default()),
        Some(key) => Ok(key.parse::<PxeLoader>()?),
    }
}

/// One blank VM on the provisioning VLAN, checked in after the test.
pub async fn provisioning_host(
    ctx: &mut FixtureContext,
    loader: PxeLoader,
) -> FixtureResult<ContentHost> {
    checkout_provisioning_hosts(ctx, loader, 1)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| FixtureError::Setup("broker returned no provisioning host".into()))
}

/// `count` blank VMs on the provisioning VLAN (two when not given).
pub async fn provision_multiple_hosts(
    ctx: &mut FixtureContext,
    loader: PxeLoader,
    count: Option<usize>,
) -> FixtureResult<Vec<ContentHost>> {
    checkout_provisioning_hosts(ctx, loader, count.unwrap_or(DEFAULT_HOST_COUNT)).await
}

async fn checkout_provisioning_hosts(
    ctx: &mut FixtureContext,
    loader: PxeLoader,
    count: usize,
) -> FixtureResult<Vec<ContentHost>> {
    ctx.scope(ScopeLevel::Function)?;
    let key_file = session_ssh_key_file(ctx).await?;
    let request = BrokerRequest::workflow(PROVISIONING_HOST_WORKFLOW)
        .arg("target_vlan_id", ctx.settings().provisioning.vlan_id)
        .arg("target_vm_firmware", loader.vm_firmware())
        .arg("target_vm_cd_iso", "")
        .arg("blank", true)
        .arg("target_memory", "6GiB")
        .arg("auth", key_file.display().to_string());

    let broker = ctx.broker().clone();
    let hosts = broker.checkout(&request, count).await?;
    tracing::info!(
        "Checked out {} ({} firmware)",
        hosts.iter().map(|h| h.hostname.as_str()).collect::<Vec<_>>().join(", "),
        loader.vm_firmware()
    );

    let checked_out = hosts.clone();
    ctx.defer(
        ScopeLevel::Function,
        format!("check in {} provisioning host(s)", hosts.len()),
        move || release_hosts(broker, checked_out),
    )?;
    Ok(hosts)
}

/// The flag goes back to non-blank first, so host teardown actually runs
/// before the VMs return to the broker.
async fn release_hosts(
    broker: Arc<dyn sat_client::broker::Broker>,
    mut hosts: Vec<ContentHost>,
) -> FixtureResult<()> {
    for host in &mut hosts {
        host.blank = false;
        if let Err(e) = host.teardown().await {
            tracing::warn!("Teardown of {} failed, checking it in anyway: {:#}", host.hostname, e);
        }
    }
    broker.checkin(&hosts).await?;
    Ok(())
}

/// Host group that PXE-installs RHEL `rhel_version` into the provisioning
/// subnet with `loader`.
pub async fn provisioning_hostgroup(
    ctx: &mut FixtureContext,
    loader: PxeLoader,
    rhel_version: u32,
) -> FixtureResult<HostGroup> {
    ctx.scope(ScopeLevel::Function)?;
    let spec = provisioning_hostgroup_spec(ctx, loader, rhel_version).await?;
    let api = session_provisioning_sat(ctx)
        .await?
        .sat
        .api()
        .clone();
    let hostgroup = api.create_host_group(&spec).await?;
    tracing::info!("Created host group {} ({})", hostgroup.name, loader.pxe_loader());
    ctx.defer_delete(ScopeLevel::Function, api, EntityKind::HostGroup, hostgroup.id, &hostgroup.name)?;
    Ok(hostgroup)
}

/// Everything a PXE host group references, without compute resource.
pub(crate) async fn provisioning_hostgroup_spec(
    ctx: &mut FixtureContext,
    loader: PxeLoader,
    rhel_version: u32,
) -> FixtureResult<HostGroupSpec> {
    let prov = session_provisioning_sat(ctx).await?;
    let org = session_sca_manifest_org(ctx).await?;
    let location = session_location(ctx).await?;
    let arch = default_architecture(ctx).await?;
    let ptable = default_partitiontable(ctx).await?;
    let capsule = session_provisioning_capsule(ctx).await?;
    let lce = session_lce_library(ctx).await?;
    let content = session_provisioning_rhel_content(ctx, rhel_version).await?;
    let provisioning = &ctx.settings().provisioning;

    Ok(HostGroupSpec {
        name: gen_alpha(12),
        organization_ids: vec![org.id],
        location_ids: vec![location.id],
        architecture_id: Some(arch.id),
        domain_id: Some(prov.domain.id),
        content_source_id: Some(capsule.id),
        content_view_id: Some(content.cv.id),
        kickstart_repository_id: Some(content.ksrepo.id),
        lifecycle_environment_id: Some(lce.id),
        root_pass: Some(provisioning.host_root_password.clone()),
        operatingsystem_id: Some(content.os.id),
        ptable_id: Some(ptable.id),
        subnet_id: Some(prov.subnet.id),
        pxe_loader: Some(loader.pxe_loader().to_string()),
        group_parameters_attributes: vec![
            GroupParameter::string("remote_execution_ssh_keys", provisioning.host_ssh_key_pub.clone()),
            GroupParameter::string("kt_activation_keys", content.ak.name.clone()),
        ],
        ..Default::default()
    })
}
