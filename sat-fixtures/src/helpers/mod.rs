//! Helper utilities shared by the fixtures

mod commands;
mod names;
mod tasks;

pub use commands::*;
pub use names::*;
pub use tasks::*;

use std::{fmt, time::Duration};

use sat_shared::{broker::DataOutError, pxe::UnknownPxeLoader, task::TaskResult};

use crate::scope::ScopeLevel;

/// One teardown step that did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeardownFailure {
    pub scope: String,
    pub step: String,
    pub message: String,
}

impl fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.scope, self.step, self.message)
    }
}

/// Error type for fixture setup and teardown
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Remote call failed: {0:#}")]
    Remote(#[from] anyhow::Error),

    #[error("Task {task} finished with result '{result}'")]
    TaskFailed { task: String, result: TaskResult },

    #[error("Timeout after {waited:?} waiting for {target}")]
    TaskTimeout { target: String, waited: Duration },

    #[error("Lookup failed: {0}")]
    LookupMiss(String),

    #[error("Command `{command}` exited with status {status}: {stderr}")]
    Command {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("No {0:?} scope is open")]
    ScopeNotOpen(ScopeLevel),

    #[error("{} teardown step(s) failed: {}", .0.len(), join_failures(.0))]
    Teardown(Vec<TeardownFailure>),
}

fn join_failures(failures: &[TeardownFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<UnknownPxeLoader> for FixtureError {
    fn from(e: UnknownPxeLoader) -> Self {
        FixtureError::LookupMiss(e.to_string())
    }
}

impl From<DataOutError> for FixtureError {
    fn from(e: DataOutError) -> Self {
        FixtureError::Setup(e.to_string())
    }
}

pub type FixtureResult<T> = Result<T, FixtureError>;
