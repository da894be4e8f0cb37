//! Hard success checks on top of task polling.

use sat_client::{
    api::ForemanApi,
    task::{PollConfig, TaskOutcome, poll_task, poll_task_search},
};
use sat_shared::task::ForemanTask;

use super::{FixtureError, FixtureResult};

/// Only a `success` outcome passes. Failure and timeout abort the fixture.
pub fn ensure_success(outcome: TaskOutcome) -> FixtureResult<ForemanTask> {
    match outcome {
        TaskOutcome::Success(task) => Ok(task),
        TaskOutcome::Failure(task) => {
            tracing::error!("Task {} ({:?}) ended with {}", task.id, task.label, task.result);
            Err(FixtureError::TaskFailed {
                task: task.label.unwrap_or(task.id),
                result: task.result,
            })
        }
        TaskOutcome::Timeout { target, waited } => {
            tracing::error!("Gave up on {} after {:?}", target, waited);
            Err(FixtureError::TaskTimeout { target, waited })
        }
    }
}

pub async fn wait_task_success(
    api: &dyn ForemanApi,
    task_id: &str,
    config: &PollConfig,
) -> FixtureResult<ForemanTask> {
    ensure_success(poll_task(api, task_id, config).await?)
}

pub async fn wait_search_success(
    api: &dyn ForemanApi,
    query: &str,
    config: &PollConfig,
) -> FixtureResult<ForemanTask> {
    ensure_success(poll_task_search(api, query, config).await?)
}
