//! Which satellite a test runs against.

use std::{fmt, str::FromStr};

use sat_client::host::Satellite;

use crate::{
    helpers::{FixtureError, FixtureResult},
    scope::{FixtureContext, ResourceKind, ScopeLevel},
};

/// How the satellite under test is resolved for a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TargetStrategy {
    /// The shared session instance.
    #[default]
    Default,
    /// A fresh instance owned by the scope, released when it closes.
    Destructive,
    /// The installer-ready instance; becomes the configured server.
    Sanity,
}

impl TargetStrategy {
    /// Strategy for a test carrying these markers. Any marker mentioning
    /// `sanity` (`sanity`, `e2e_sanity`) selects the sanity instance, and
    /// `destructive` wins over both.
    pub fn from_markers<'a>(markers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut strategy = TargetStrategy::Default;
        for marker in markers {
            if marker == "destructive" {
                return TargetStrategy::Destructive;
            }
            if marker.contains("sanity") {
                strategy = TargetStrategy::Sanity;
            }
        }
        strategy
    }
}

impl fmt::Display for TargetStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TargetStrategy::Default => "default",
            TargetStrategy::Destructive => "destructive",
            TargetStrategy::Sanity => "sanity",
        })
    }
}

impl FromStr for TargetStrategy {
    type Err = FixtureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => Ok(TargetStrategy::Default),
            "destructive" => Ok(TargetStrategy::Destructive),
            "sanity" => Ok(TargetStrategy::Sanity),
            other => Err(FixtureError::LookupMiss(format!(
                "unknown target strategy '{other}'"
            ))),
        }
    }
}

/// The session's shared satellite.
///
/// With `server.hostname` set, connect to it and fall back to a handle built
/// from settings if it does not answer. Without it, provision one for the
/// session and release it when the session closes.
pub async fn default_sat(ctx: &mut FixtureContext) -> FixtureResult<Satellite> {
    let key = ResourceKind::DefaultSat;
    if let Some(sat) = ctx.cached(ScopeLevel::Session, &key)? {
        return Ok(sat);
    }

    let sat = match ctx.settings().server.hostname.clone() {
        Some(hostname) => match ctx.provider().connect(ctx.settings(), &hostname).await {
            Ok(sat) => {
                tracing::info!("Connected to {} (version {})", sat.hostname, sat.version);
                sat
            }
            Err(e) => {
                tracing::warn!("Could not reach {}: {:#}; using configured handle", hostname, e);
                ctx.provider().from_settings(ctx.settings())?
            }
        },
        None => {
            tracing::info!("server.hostname is not set, provisioning a satellite for the session");
            let sat = ctx.provider().provision(ctx.settings()).await?;
            defer_release(ctx, ScopeLevel::Session, &sat)?;
            sat
        }
    };

    ctx.store(ScopeLevel::Session, key, sat)
}

/// The satellite under test for `level`, resolved through `strategy`.
pub async fn target_sat(
    ctx: &mut FixtureContext,
    level: ScopeLevel,
    strategy: TargetStrategy,
) -> FixtureResult<Satellite> {
    let key = ResourceKind::TargetSat(strategy);
    if let Some(sat) = ctx.cached(level, &key)? {
        return Ok(sat);
    }

    let sat = match strategy {
        TargetStrategy::Default => default_sat(ctx).await?,
        TargetStrategy::Destructive => {
            // make sure there is somewhere to hand it back before asking for one
            ctx.scope(level)?;
            let sat = ctx.provider().provision(ctx.settings()).await?;
            tracing::info!("Provisioned disposable satellite {} for {} scope", sat.hostname, level);
            defer_release(ctx, level, &sat)?;
            sat
        }
        TargetStrategy::Sanity => {
            let rhel_version = ctx.settings().server.version.rhel_version;
            let sat = ctx
                .provider()
                .installer_ready(ctx.settings(), rhel_version)
                .await?;
            ctx.settings_mut()
                .set("server.hostname", sat.hostname.as_str())
                .map_err(|e| FixtureError::Setup(format!("{e:#}")))?;
            tracing::info!("Installer-ready satellite {} is now server.hostname", sat.hostname);
            sat
        }
    };

    ctx.store(level, key, sat)
}

/// `target_sat` at session level with the context's strategy.
pub async fn session_target_sat(ctx: &mut FixtureContext) -> FixtureResult<Satellite> {
    let strategy = ctx.strategy();
    target_sat(ctx, ScopeLevel::Session, strategy).await
}

/// `target_sat` at module level with the context's strategy.
pub async fn module_target_sat(ctx: &mut FixtureContext) -> FixtureResult<Satellite> {
    let strategy = ctx.strategy();
    target_sat(ctx, ScopeLevel::Module, strategy).await
}

fn defer_release(ctx: &mut FixtureContext, level: ScopeLevel, sat: &Satellite) -> FixtureResult<()> {
    let provider = ctx.provider().clone();
    let sat = sat.clone();
    ctx.defer(level, format!("release satellite {}", sat.hostname), move || async move {
        provider.release(&sat).await?;
        tracing::info!("Released {}", sat.hostname);
        Ok(())
    })
}
