//! RHEL installation content: synced repositories, a published content view
//! and an activation key that enables the client repository.

use sat_client::task::PollConfig;
use sat_shared::{
    entities::{
        ActivationKey, ActivationKeySpec, ContentOverride, ContentView, ContentViewSpec,
        EntityId, OperatingSystem, ProductSpec, RedHatRepositorySpec, Repository, RepositorySpec,
    },
    repos::{
        DEFAULT_ARCHITECTURE, OsRelease, RepoDefinition, content_repo, kickstart_repo,
        os_release_key, repo_keys_for,
    },
    task::TaskRef,
};

use super::{ProvisioningType, session_lce_library, session_provisioning_sat, session_sca_manifest_org};
use crate::{
    helpers::{FixtureError, FixtureResult, gen_alpha, wait_search_success, wait_task_success},
    scope::{FixtureContext, ResourceKind, ScopeLevel},
};

/// Everything a host group needs to install one RHEL major.
#[derive(Debug, Clone)]
pub struct RhelContent {
    pub os: OperatingSystem,
    pub ak: ActivationKey,
    /// Kickstart tree the installer boots from.
    pub ksrepo: Repository,
    pub cv: ContentView,
}

fn red_hat_repo(organization_id: EntityId, def: &RepoDefinition) -> RedHatRepositorySpec {
    RedHatRepositorySpec {
        organization_id,
        basearch: DEFAULT_ARCHITECTURE.to_string(),
        product: def.product.to_string(),
        repo: def.name.to_string(),
        reposet: def.reposet.to_string(),
        releasever: def.releasever.to_string(),
    }
}

fn missing_repo(kind: &str, key: &str) -> FixtureError {
    FixtureError::LookupMiss(format!("no {kind} repository is defined for '{key}'"))
}

/// Content for installing RHEL `rhel_version` from the provisioning satellite.
///
/// Nothing is returned before every repository sync and the content view
/// publish have reported success.
pub async fn session_provisioning_rhel_content(
    ctx: &mut FixtureContext,
    rhel_version: u32,
) -> FixtureResult<RhelContent> {
    let provisioning_type = ctx.provisioning_type();
    let key = ResourceKind::RhelContent {
        rhel_version,
        provisioning_type,
    };
    if let Some(content) = ctx.cached(ScopeLevel::Session, &key)? {
        return Ok(content);
    }
    let prov = session_provisioning_sat(ctx).await?;
    let org = session_sca_manifest_org(ctx).await?;
    let lce = session_lce_library(ctx).await?;

    let repo_name = format!("rhel{rhel_version}");
    let client_url = ctx
        .settings()
        .repos
        .satclient_repo
        .get(&repo_name)
        .cloned()
        .ok_or_else(|| {
            FixtureError::LookupMiss(format!("repos.satclient_repo.{repo_name} is not configured"))
        })?;
    let sync_budget = PollConfig::sync(&ctx.settings().tasks);
    let publish_budget = PollConfig::publish(&ctx.settings().tasks);
    let api = prov.sat.api().clone();

    // 1. Content view and the custom client repository
    let content_view = api
        .create_content_view(&ContentViewSpec {
            organization_id: org.id,
            name: gen_alpha(12),
        })
        .await?;
    let product = api
        .create_product(&ProductSpec {
            organization_id: org.id,
            name: format!("{repo_name}_{}", gen_alpha(8)),
        })
        .await?;
    let client_repo = api
        .create_repository(&RepositorySpec {
            product_id: product.id,
            name: gen_alpha(12),
            content_type: "yum".to_string(),
            url: client_url,
        })
        .await?;
    tracing::info!("Created client repo {} in product {}", client_repo.name, product.name);

    let mut syncs: Vec<TaskRef> = vec![api.sync_repository(client_repo.id).await?];
    let mut repository_ids = vec![client_repo.id];
    let mut kickstart_repos = Vec::new();

    // 2. Red Hat repositories: kickstart always, content unless discovering
    for key in repo_keys_for(rhel_version) {
        let kickstart = kickstart_repo(&key).ok_or_else(|| missing_repo("kickstart", &key))?;
        let mut enabled = vec![(true, kickstart)];
        if provisioning_type != ProvisioningType::Discovery {
            enabled.push((false, content_repo(&key).ok_or_else(|| missing_repo("content", &key))?));
        }

        for (is_kickstart, def) in enabled {
            let id = api.enable_red_hat_repository(&red_hat_repo(org.id, def)).await?;
            let repo = api.read_repository(id).await?;
            tracing::info!("Enabled {} ({})", def.name, repo.id);
            syncs.push(api.sync_repository(repo.id).await?);
            repository_ids.push(repo.id);
            if is_kickstart {
                kickstart_repos.push(repo);
            }
        }
        api.set_content_view_repositories(content_view.id, &repository_ids)
            .await?;
    }

    // 3. Every sync must succeed before the content is used
    for task in &syncs {
        wait_task_success(api.as_ref(), &task.id, &sync_budget).await?;
    }
    tracing::info!("{} repository sync(s) finished", syncs.len());

    // 4. Operating system the kickstart tree installs
    let os_key = os_release_key(rhel_version);
    let release: OsRelease = kickstart_repo(&os_key)
        .ok_or_else(|| missing_repo("kickstart", &os_key))?
        .releasever
        .parse()
        .map_err(|e| FixtureError::Setup(format!("{e}")))?;
    let os_id = api
        .search_operating_systems(&format!(
            "family=Redhat and major={} and minor={}",
            release.major, release.minor
        ))
        .await?
        .first()
        .map(|os| os.id)
        .ok_or_else(|| {
            FixtureError::LookupMiss(format!(
                "Operating system RHEL {release} was not found; the kickstart repo sync may have failed"
            ))
        })?;
    let os = api.read_operating_system(os_id).await?;

    // 5. Publish
    let publish = api.publish_content_view(content_view.id).await?;
    wait_search_success(
        api.as_ref(),
        &format!("Actions::Katello::ContentView::Publish and id = {}", publish.id),
        &publish_budget,
    )
    .await?;
    let cv = api
        .search_content_views(org.id, &content_view.name)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            FixtureError::LookupMiss(format!("Content view {} vanished after publish", content_view.name))
        })?;
    tracing::info!("Published content view {} (version {})", cv.name, cv.version_count);

    // 6. Activation key with the client repository enabled
    let ak = api
        .create_activation_key(&ActivationKeySpec {
            organization_id: org.id,
            name: gen_alpha(12),
            content_view_id: cv.id,
            environment_id: lce.id,
        })
        .await?;
    let client_label = api
        .activation_key_product_content(ak.id)
        .await?
        .into_iter()
        .find(|c| c.name == client_repo.name)
        .map(|c| c.label)
        .ok_or_else(|| {
            FixtureError::LookupMiss(format!(
                "Repository {} is not in the product content of activation key {}",
                client_repo.name, ak.name
            ))
        })?;
    api.activation_key_content_override(
        ak.id,
        &[ContentOverride {
            content_label: client_label,
            value: "1".to_string(),
        }],
    )
    .await?;

    let ksrepo = kickstart_repos
        .into_iter()
        .next()
        .ok_or_else(|| missing_repo("kickstart", &repo_name))?;
    let content = RhelContent { os, ak, ksrepo, cv };
    ctx.store(ScopeLevel::Session, key, content)
}
