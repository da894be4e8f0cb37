//! Organizations, locations and the defaults other fixtures build on.

use sat_shared::{
    entities::{Architecture, EntityKind, LifecycleEnvironment, Location, Organization, PartitionTable},
    repos::DEFAULT_ARCHITECTURE,
};

use super::{module_target_sat, session_target_sat};
use crate::{
    helpers::{FixtureError, FixtureResult, gen_alpha},
    scope::{FixtureContext, ResourceKind, ScopeLevel},
};

pub const DEFAULT_PARTITION_TABLE: &str = "Kickstart default";

async fn organization(ctx: &mut FixtureContext, level: ScopeLevel) -> FixtureResult<Organization> {
    let key = ResourceKind::Organization;
    if let Some(org) = ctx.cached(level, &key)? {
        return Ok(org);
    }
    let sat = match level {
        ScopeLevel::Session => session_target_sat(ctx).await?,
        _ => module_target_sat(ctx).await?,
    };

    let org = sat.api().create_organization(&gen_alpha(12)).await?;
    tracing::info!("Created {} organization {} ({})", level, org.name, org.id);
    ctx.defer_delete(level, sat.api().clone(), EntityKind::Organization, org.id, &org.name)?;
    ctx.store(level, key, org)
}

async fn location(ctx: &mut FixtureContext, level: ScopeLevel) -> FixtureResult<Location> {
    let key = ResourceKind::Location;
    if let Some(location) = ctx.cached(level, &key)? {
        return Ok(location);
    }
    let sat = match level {
        ScopeLevel::Session => session_target_sat(ctx).await?,
        _ => module_target_sat(ctx).await?,
    };

    let location = sat.api().create_location(&gen_alpha(12)).await?;
    tracing::info!("Created {} location {} ({})", level, location.name, location.id);
    ctx.defer_delete(level, sat.api().clone(), EntityKind::Location, location.id, &location.name)?;
    ctx.store(level, key, location)
}

/// Session organization that owns all provisioning content.
///
/// Content access runs in simple content access mode, so no manifest is
/// uploaded here.
pub async fn session_sca_manifest_org(ctx: &mut FixtureContext) -> FixtureResult<Organization> {
    organization(ctx, ScopeLevel::Session).await
}

pub async fn session_location(ctx: &mut FixtureContext) -> FixtureResult<Location> {
    location(ctx, ScopeLevel::Session).await
}

pub async fn module_org(ctx: &mut FixtureContext) -> FixtureResult<Organization> {
    organization(ctx, ScopeLevel::Module).await
}

pub async fn module_location(ctx: &mut FixtureContext) -> FixtureResult<Location> {
    location(ctx, ScopeLevel::Module).await
}

/// The Library environment of the session organization.
pub async fn session_lce_library(ctx: &mut FixtureContext) -> FixtureResult<LifecycleEnvironment> {
    let key = ResourceKind::LibraryEnvironment;
    if let Some(lce) = ctx.cached(ScopeLevel::Session, &key)? {
        return Ok(lce);
    }
    let sat = session_target_sat(ctx).await?;
    let org = session_sca_manifest_org(ctx).await?;
    let lce = sat.api().library_environment(org.id).await?;
    ctx.store(ScopeLevel::Session, key, lce)
}

pub async fn default_architecture(ctx: &mut FixtureContext) -> FixtureResult<Architecture> {
    let key = ResourceKind::DefaultArchitecture;
    if let Some(arch) = ctx.cached(ScopeLevel::Session, &key)? {
        return Ok(arch);
    }
    let sat = session_target_sat(ctx).await?;
    let arch = sat
        .api()
        .search_architectures(&format!("name={DEFAULT_ARCHITECTURE}"))
        .await?
        .into_iter()
        .find(|a| a.name == DEFAULT_ARCHITECTURE)
        .ok_or_else(|| {
            FixtureError::LookupMiss(format!("Architecture {DEFAULT_ARCHITECTURE} was not found"))
        })?;
    ctx.store(ScopeLevel::Session, key, arch)
}

pub async fn default_partitiontable(ctx: &mut FixtureContext) -> FixtureResult<PartitionTable> {
    let key = ResourceKind::DefaultPartitionTable;
    if let Some(ptable) = ctx.cached(ScopeLevel::Session, &key)? {
        return Ok(ptable);
    }
    let sat = session_target_sat(ctx).await?;
    let ptable = sat
        .api()
        .search_partition_tables(&format!("name=\"{DEFAULT_PARTITION_TABLE}\""))
        .await?
        .into_iter()
        .find(|p| p.name == DEFAULT_PARTITION_TABLE)
        .ok_or_else(|| {
            FixtureError::LookupMiss(format!(
                "Partition table '{DEFAULT_PARTITION_TABLE}' was not found"
            ))
        })?;
    ctx.store(ScopeLevel::Session, key, ptable)
}
