use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, Result};
use crate::task::{Category, TaskId, TaskState};

/// How a task resolved. Produced once, when the task reaches a terminal state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: TaskId,
    pub category: Category,
    pub state: TaskState,
    pub result: Option<String>,
    pub error: Option<String>,
    /// Cancelled locally after the cancel timeout; the remote job may still run.
    pub forced: bool,
    pub finished_at: DateTime<Utc>,
}

impl TaskOutcome {
    /// `Failed` becomes `RemoteFailure`; completed and cancelled outcomes pass through.
    pub fn into_result(self) -> Result<TaskOutcome> {
        if self.state == TaskState::Failed {
            let message = self
                .error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(MonitorError::RemoteFailure(message));
        }
        Ok(self)
    }
}
