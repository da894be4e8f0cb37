//! The fixture context: settings, backends and the stack of open scopes.

use std::{future::Future, panic::AssertUnwindSafe, sync::Arc};

use futures::{FutureExt, future::BoxFuture};
use serde_json::Value;

use sat_client::{
    api::ForemanApi,
    broker::{Broker, BrokerCli},
    config::Settings,
    host::Satellite,
    provider::{BrokerSatelliteProvider, SatelliteProvider},
    util::logging::init_logging,
};
use sat_shared::entities::{EntityId, EntityKind};

use super::{ResourceKind, Scope, ScopeLevel, SettingGuard, panic_message};
use crate::{
    fixtures::{ProvisioningType, TargetStrategy},
    helpers::{FixtureError, FixtureResult},
};

/// Everything a fixture needs to resolve its upstreams.
///
/// Scopes nest strictly: a session holds modules, a module holds classes,
/// and so on. Each level is open at most once at a time.
pub struct FixtureContext {
    settings: Settings,
    strategy: TargetStrategy,
    provisioning_type: ProvisioningType,
    provider: Arc<dyn SatelliteProvider>,
    broker: Arc<dyn Broker>,
    scopes: Vec<Scope>,
}

impl FixtureContext {
    pub fn new(
        settings: Settings,
        provider: Arc<dyn SatelliteProvider>,
        broker: Arc<dyn Broker>,
    ) -> Self {
        Self {
            settings,
            strategy: TargetStrategy::default(),
            provisioning_type: ProvisioningType::default(),
            provider,
            broker,
            scopes: Vec::new(),
        }
    }

    /// Context over the real broker CLI, with logging set up from settings.
    pub fn from_settings(settings: Settings) -> Self {
        init_logging(&settings.logging.level);
        let broker: Arc<dyn Broker> = Arc::new(BrokerCli::new(
            &settings.broker.binary,
            &settings.server.ssh_username,
        ));
        let provider = Arc::new(BrokerSatelliteProvider::new(broker.clone()));
        Self::new(settings, provider, broker)
    }

    pub fn with_strategy(mut self, strategy: TargetStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// What the session provisions for. Fixed for the whole run, so the
    /// provisioning network is only ever set up once.
    pub fn with_provisioning_type(mut self, provisioning_type: ProvisioningType) -> Self {
        self.provisioning_type = provisioning_type;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn strategy(&self) -> TargetStrategy {
        self.strategy
    }

    pub fn provisioning_type(&self) -> ProvisioningType {
        self.provisioning_type
    }

    pub fn provider(&self) -> &Arc<dyn SatelliteProvider> {
        &self.provider
    }

    pub fn broker(&self) -> &Arc<dyn Broker> {
        &self.broker
    }

    pub fn is_open(&self, level: ScopeLevel) -> bool {
        self.scopes.iter().any(|s| s.level() == level)
    }

    pub fn scope(&self, level: ScopeLevel) -> FixtureResult<&Scope> {
        self.scopes
            .iter()
            .find(|s| s.level() == level)
            .ok_or(FixtureError::ScopeNotOpen(level))
    }

    fn scope_mut(&mut self, level: ScopeLevel) -> FixtureResult<&mut Scope> {
        self.scopes
            .iter_mut()
            .find(|s| s.level() == level)
            .ok_or(FixtureError::ScopeNotOpen(level))
    }

    /// Open a scope below every scope that is already open.
    pub fn open(&mut self, level: ScopeLevel, name: impl Into<String>) -> FixtureResult<()> {
        let name = name.into();
        if let Some(inner) = self.scopes.last().filter(|s| s.level() >= level) {
            return Err(FixtureError::Setup(format!(
                "cannot open {level} scope '{name}' while {} scope '{}' is open",
                inner.level(),
                inner.name()
            )));
        }
        tracing::debug!("Opening {} scope '{}'", level, name);
        self.scopes.push(Scope::new(level, name));
        Ok(())
    }

    /// Close `level` and every scope nested in it, innermost first.
    pub async fn close(&mut self, level: ScopeLevel) -> FixtureResult<()> {
        if !self.is_open(level) {
            return Err(FixtureError::ScopeNotOpen(level));
        }
        let mut failures = Vec::new();
        while self.scopes.last().is_some_and(|s| s.level() >= level) {
            if let Some(scope) = self.scopes.pop() {
                failures.extend(scope.close().await);
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(FixtureError::Teardown(failures))
        }
    }

    /// Close whatever is still open.
    pub async fn close_all(&mut self) -> FixtureResult<()> {
        match self.scopes.first().map(Scope::level) {
            Some(outermost) => self.close(outermost).await,
            None => Ok(()),
        }
    }

    pub fn cached<T: Clone + 'static>(
        &self,
        level: ScopeLevel,
        kind: &ResourceKind,
    ) -> FixtureResult<Option<T>> {
        let hit = self.scope(level)?.get(kind)?;
        if hit.is_some() {
            tracing::debug!("Reusing {:?} from {} scope", kind, level);
        }
        Ok(hit)
    }

    /// Memoize `value` in `level` and hand it back.
    pub fn store<T: Clone + Send + Sync + 'static>(
        &mut self,
        level: ScopeLevel,
        kind: ResourceKind,
        value: T,
    ) -> FixtureResult<T> {
        self.scope_mut(level)?.insert(kind, value.clone());
        Ok(value)
    }

    pub fn defer<F, Fut>(
        &mut self,
        level: ScopeLevel,
        label: impl Into<String>,
        run: F,
    ) -> FixtureResult<()>
    where
        F: FnOnce() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FixtureResult<()>> + Send + 'static,
    {
        self.scope_mut(level)?.defer(label, run);
        Ok(())
    }

    /// Register deletion of a created entity when `level` closes.
    pub fn defer_delete(
        &mut self,
        level: ScopeLevel,
        api: Arc<dyn ForemanApi>,
        kind: EntityKind,
        id: EntityId,
        name: &str,
    ) -> FixtureResult<()> {
        self.defer(level, format!("delete {kind:?} {name} ({id})"), move || async move {
            api.delete(kind, id).await?;
            tracing::info!("Deleted {:?} {}", kind, id);
            Ok(())
        })
    }

    /// Set a global setting for the lifetime of `level` and return the value
    /// it had before. The prior value is restored when the scope closes.
    pub async fn guard_setting(
        &mut self,
        level: ScopeLevel,
        satellite: &Satellite,
        name: &str,
        value: impl Into<Value>,
    ) -> FixtureResult<Value> {
        // fail before touching the server if nothing could restore it
        self.scope(level)?;
        let guard = SettingGuard::acquire(satellite, name, value.into()).await?;
        let previous = guard.previous().clone();
        self.defer(level, format!("restore setting {name}"), move || guard.release())?;
        Ok(previous)
    }

    /// Run `body` inside a fresh scope and close it on every exit path.
    ///
    /// A failed body wins over teardown failures, which are only logged. A
    /// panicking body is resumed after teardown has run.
    pub async fn run_in<R, F>(&mut self, level: ScopeLevel, name: &str, body: F) -> FixtureResult<R>
    where
        F: for<'a> FnOnce(&'a mut FixtureContext) -> BoxFuture<'a, FixtureResult<R>>,
    {
        self.open(level, name)?;
        let outcome = AssertUnwindSafe(body(self)).catch_unwind().await;
        let closed = self.close(level).await;

        match outcome {
            Ok(Ok(value)) => closed.map(|()| value),
            Ok(Err(e)) => {
                if let Err(teardown) = closed {
                    tracing::error!("'{}' failed ({}); teardown also failed: {}", name, e, teardown);
                }
                Err(e)
            }
            Err(panic) => {
                tracing::error!("'{}' {}", name, panic_message(panic.as_ref()));
                if let Err(teardown) = closed {
                    tracing::error!("Teardown after panic in '{}' failed: {}", name, teardown);
                }
                std::panic::resume_unwind(panic)
            }
        }
    }

    /// [`run_in`](Self::run_in) at function level: one test body.
    pub async fn run_test<R, F>(&mut self, name: &str, body: F) -> FixtureResult<R>
    where
        F: for<'a> FnOnce(&'a mut FixtureContext) -> BoxFuture<'a, FixtureResult<R>>,
    {
        self.run_in(ScopeLevel::Function, name, body).await
    }
}
