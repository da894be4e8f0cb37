//! Waiting for asynchronous server tasks.
//!
//! A task goes `submitted -> polling -> {success, failure, timeout}`. Only
//! `success` lets a caller continue; the other two are reported as outcomes
//! so the caller decides how to fail. Nothing here cancels the remote task.

use std::{future::Future, time::Duration};

use anyhow::Result;
use tokio::time::Instant;
use tracing::info;

use sat_shared::task::{ForemanTask, TaskResult};

use crate::{
    api::ForemanApi,
    config::TaskSettings,
    util::polling::{WaitConfig, WaitError, wait_for_result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub timeout: Duration,
    pub rate: Duration,
}

impl PollConfig {
    pub fn new(timeout: Duration, rate: Duration) -> Self {
        Self { timeout, rate }
    }

    pub fn from_tries(rate: Duration, max_tries: u32) -> Self {
        Self {
            timeout: rate.saturating_mul(max_tries),
            rate,
        }
    }

    /// Budget for repository syncs.
    pub fn sync(settings: &TaskSettings) -> Self {
        Self::new(
            Duration::from_secs(settings.poll_timeout_secs),
            Duration::from_secs(settings.poll_rate_secs),
        )
    }

    /// Budget for content view publishes.
    pub fn publish(settings: &TaskSettings) -> Self {
        Self::from_tries(
            Duration::from_secs(settings.publish_rate_secs),
            settings.publish_max_tries,
        )
    }

    fn attempts(&self) -> u32 {
        if self.rate.is_zero() {
            return 1;
        }
        let attempts = self.timeout.as_secs_f64() / self.rate.as_secs_f64();
        (attempts.ceil() as u32).max(1)
    }

    fn wait_config(&self, description: String) -> WaitConfig {
        WaitConfig::with_description(description)
            .max_attempts(self.attempts())
            .interval(self.rate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success(ForemanTask),
    Failure(ForemanTask),
    Timeout { target: String, waited: Duration },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }

    fn from_finished(task: ForemanTask) -> Self {
        if task.result == TaskResult::Success {
            TaskOutcome::Success(task)
        } else {
            TaskOutcome::Failure(task)
        }
    }
}

/// Poll one task by id until it finishes or the budget runs out.
pub async fn poll_task(api: &dyn ForemanApi, task_id: &str, config: &PollConfig) -> Result<TaskOutcome> {
    info!("Waiting for task {} (timeout {:?})", task_id, config.timeout);
    poll_until(config, &format!("task {task_id}"), task_id, || async move {
        let task = api.read_task(task_id).await?;
        Ok(task.is_finished().then_some(task))
    })
    .await
}

/// Poll a task search until every match has finished; the outcome is that of
/// the first match. No match within the budget counts as a timeout.
pub async fn poll_task_search(
    api: &dyn ForemanApi,
    query: &str,
    config: &PollConfig,
) -> Result<TaskOutcome> {
    info!("Waiting for tasks matching '{}'", query);
    poll_until(config, &format!("tasks '{query}'"), query, || async move {
        let tasks = api.search_tasks(query).await?;
        let done = !tasks.is_empty() && tasks.iter().all(ForemanTask::is_finished);
        Ok(if done { tasks.into_iter().next() } else { None })
    })
    .await
}

/// A timeout reports the time actually spent polling, not the budget.
async fn poll_until<F, Fut>(
    config: &PollConfig,
    description: &str,
    target: &str,
    probe: F,
) -> Result<TaskOutcome>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<ForemanTask>>>,
{
    let started = Instant::now();
    match wait_for_result(config.wait_config(description.to_string()), probe).await {
        Ok(task) => Ok(TaskOutcome::from_finished(task)),
        Err(WaitError::Timeout { .. }) => Ok(TaskOutcome::Timeout {
            target: target.to_string(),
            waited: started.elapsed(),
        }),
        Err(WaitError::Check(e)) => Err(e),
    }
}
