//! VMware compute resource provisioning.

use sat_shared::{
    entities::{ComputeResource, ComputeResourceSpec, EntityKind, HostGroup},
    pxe::PxeLoader,
};

use super::{
    provisioning_hostgroup_spec, session_location, session_provisioning_sat,
    session_sca_manifest_org,
};
use crate::{
    helpers::{FixtureResult, gen_alpha},
    scope::{FixtureContext, ResourceKind, ScopeLevel},
};

pub async fn session_vmware_cr(ctx: &mut FixtureContext) -> FixtureResult<ComputeResource> {
    let key = ResourceKind::VmwareComputeResource;
    if let Some(cr) = ctx.cached(ScopeLevel::Session, &key)? {
        return Ok(cr);
    }
    let prov = session_provisioning_sat(ctx).await?;
    let org = session_sca_manifest_org(ctx).await?;
    let location = session_location(ctx).await?;
    let vmware = ctx.settings().vmware.clone();

    let api = prov.sat.api().clone();
    let cr = api
        .create_compute_resource(&ComputeResourceSpec {
            name: gen_alpha(12),
            provider: "Vmware".to_string(),
            url: vmware.vcenter,
            user: vmware.username,
            password: vmware.password,
            datacenter: vmware.datacenter,
            organization_ids: vec![org.id],
            location_ids: vec![location.id],
        })
        .await?;
    tracing::info!("Created VMware compute resource {} ({:?})", cr.name, cr.url);
    ctx.defer_delete(ScopeLevel::Session, api, EntityKind::ComputeResource, cr.id, &cr.name)?;
    ctx.store(ScopeLevel::Session, key, cr)
}

/// Provisioning host group bound to the VMware compute resource. Hosts get
/// their ssh keys from the image, so only the activation key is passed.
pub async fn vmware_hostgroup(
    ctx: &mut FixtureContext,
    loader: PxeLoader,
    rhel_version: u32,
) -> FixtureResult<HostGroup> {
    ctx.scope(ScopeLevel::Function)?;
    let cr = session_vmware_cr(ctx).await?;
    let mut spec = provisioning_hostgroup_spec(ctx, loader, rhel_version).await?;
    spec.compute_resource_id = Some(cr.id);
    spec.group_parameters_attributes
        .retain(|p| p.name == "kt_activation_keys");

    let api = session_provisioning_sat(ctx)
        .await?
        .sat
        .api()
        .clone();
    let hostgroup = api.create_host_group(&spec).await?;
    ctx.defer_delete(ScopeLevel::Function, api, EntityKind::HostGroup, hostgroup.id, &hostgroup.name)?;
    Ok(hostgroup)
}
