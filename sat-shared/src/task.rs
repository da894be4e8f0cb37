use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Planning,
    Planned,
    Scheduled,
    Running,
    Paused,
    Stopped,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskResult {
    Pending,
    Success,
    Warning,
    Error,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for TaskResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskResult::Pending => "pending",
            TaskResult::Success => "success",
            TaskResult::Warning => "warning",
            TaskResult::Error => "error",
            TaskResult::Cancelled => "cancelled",
            TaskResult::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Handle returned by any call that queues work on the server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TaskRef {
    pub id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ForemanTask {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    pub state: TaskState,
    pub result: TaskResult,
}

impl ForemanTask {
    /// A paused task is an error the server stopped on, so it is finished too.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, TaskState::Stopped | TaskState::Paused)
    }

    pub fn succeeded(&self) -> bool {
        self.is_finished() && self.result == TaskResult::Success
    }
}
