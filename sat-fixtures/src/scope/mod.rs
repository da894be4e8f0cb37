//! Scopes, memoization keys and teardown stacks.
//!
//! A scope caches every fixture built inside it and remembers how to undo
//! what it created. Closing a scope runs its teardown steps newest first.

mod context;
mod guard;

pub use context::*;
pub use guard::*;

use std::{any::Any, collections::HashMap, fmt, future::Future, panic::AssertUnwindSafe};

use futures::{FutureExt, future::BoxFuture};

use crate::{
    fixtures::{ProvisioningType, TargetStrategy},
    helpers::{FixtureError, FixtureResult, TeardownFailure},
};

/// Lifetimes a fixture can be bound to, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScopeLevel {
    Session,
    Module,
    Class,
    Function,
}

impl fmt::Display for ScopeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScopeLevel::Session => "session",
            ScopeLevel::Module => "module",
            ScopeLevel::Class => "class",
            ScopeLevel::Function => "function",
        })
    }
}

/// Memoization key. Parameters that change the built resource are part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    DefaultSat,
    TargetSat(TargetStrategy),
    Organization,
    Location,
    LibraryEnvironment,
    DefaultArchitecture,
    DefaultPartitionTable,
    ProvisioningCapsule,
    ProvisioningSat,
    RhelContent {
        rhel_version: u32,
        provisioning_type: ProvisioningType,
    },
    SshKeyFile,
    VmwareComputeResource,
    DiscoveryHostGroup,
    DiscoveryOrganization,
    DiscoveryLocation,
    ProvisioningEnv,
    DiscoverySat,
}

type TeardownFn = Box<dyn FnOnce() -> BoxFuture<'static, FixtureResult<()>> + Send + Sync>;

struct TeardownStep {
    label: String,
    run: TeardownFn,
}

/// One open scope: its cache and its pending teardown steps.
pub struct Scope {
    level: ScopeLevel,
    name: String,
    cache: HashMap<ResourceKind, Box<dyn Any + Send + Sync>>,
    teardowns: Vec<TeardownStep>,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("level", &self.level)
            .field("name", &self.name)
            .field("cached", &self.cache.keys().collect::<Vec<_>>())
            .field("teardowns", &self.teardown_labels())
            .finish()
    }
}

impl Scope {
    pub fn new(level: ScopeLevel, name: impl Into<String>) -> Self {
        Self {
            level,
            name: name.into(),
            cache: HashMap::new(),
            teardowns: Vec::new(),
        }
    }

    pub fn level(&self) -> ScopeLevel {
        self.level
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cached value for `kind`. Asking for the wrong type is a setup error.
    pub fn get<T: Clone + 'static>(&self, kind: &ResourceKind) -> FixtureResult<Option<T>> {
        match self.cache.get(kind) {
            None => Ok(None),
            Some(value) => value.downcast_ref::<T>().cloned().map(Some).ok_or_else(|| {
                FixtureError::Setup(format!(
                    "{kind:?} in {} scope holds a different type",
                    self.level
                ))
            }),
        }
    }

    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, kind: ResourceKind, value: T) {
        self.cache.insert(kind, Box::new(value));
    }

    pub fn defer<F, Fut>(&mut self, label: impl Into<String>, run: F)
    where
        F: FnOnce() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FixtureResult<()>> + Send + 'static,
    {
        self.teardowns.push(TeardownStep {
            label: label.into(),
            run: Box::new(move || run().boxed()),
        });
    }

    pub fn teardown_labels(&self) -> Vec<&str> {
        self.teardowns.iter().map(|t| t.label.as_str()).collect()
    }

    /// Run every teardown step newest first. A failing or panicking step is
    /// recorded and the rest still run. The cache is dropped afterwards.
    pub async fn close(mut self) -> Vec<TeardownFailure> {
        let scope = format!("{} {}", self.level, self.name);
        tracing::info!("Closing {} ({} teardown step(s))", scope, self.teardowns.len());

        let mut failures = Vec::new();
        while let Some(step) = self.teardowns.pop() {
            tracing::debug!("[{}] teardown: {}", scope, step.label);
            let message = match AssertUnwindSafe((step.run)()).catch_unwind().await {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };
            tracing::error!("[{}] teardown '{}' failed: {}", scope, step.label, message);
            failures.push(TeardownFailure {
                scope: scope.clone(),
                step: step.label,
                message,
            });
        }
        failures
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}
