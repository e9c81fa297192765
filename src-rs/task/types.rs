use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::dedup::LogDeduplicator;
use crate::backend::RemoteStatus;
use crate::error::MonitorError;
use crate::result::TaskOutcome;

pub type TaskId = String;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Research,
    Automation,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Research, Category::Automation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Research => "research",
            Category::Automation => "automation",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = MonitorError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "research" => Ok(Category::Research),
            "automation" => Ok(Category::Automation),
            other => Err(MonitorError::InvalidCategory(other.to_string())),
        }
    }
}

/// Local lifecycle of a tracked task.
///
/// ```text
/// Submitted --first poll--> Polling --completed/failed/cancelled--> terminal
/// Submitted|Polling --cancel()--> Cancelling --any terminal report--> terminal
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Submitted,
    Polling,
    Completed,
    Failed,
    Cancelling,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed | TaskState::Cancelled)
    }

    /// State after a successful poll reporting `reported`.
    pub fn advance(self, reported: RemoteStatus) -> TaskState {
        if self.is_terminal() {
            return self;
        }
        match reported {
            RemoteStatus::Completed => TaskState::Completed,
            RemoteStatus::Failed => TaskState::Failed,
            RemoteStatus::Cancelled => TaskState::Cancelled,
            RemoteStatus::Submitted | RemoteStatus::Running | RemoteStatus::Unknown => match self {
                TaskState::Cancelling => TaskState::Cancelling,
                _ => TaskState::Polling,
            },
        }
    }

    /// State after the caller asks for cancellation, if the request applies.
    pub fn on_cancel(self) -> Option<TaskState> {
        match self {
            TaskState::Submitted | TaskState::Polling => Some(TaskState::Cancelling),
            _ => None,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TaskState::Submitted => "submitted",
            TaskState::Polling => "polling",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Cancelling => "cancelling",
            TaskState::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: String,
    pub description: String,
    pub substep: String,
}

impl LogEvent {
    /// Deduplication key: the rendered `timestamp: text` line.
    pub fn identity(&self) -> String {
        format!("{}: {}", self.timestamp, self.description)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "seconds", rename_all = "lowercase")]
pub enum Eta {
    Calculating,
    Remaining(f64),
    Completed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub status: RemoteStatus,
    pub percent: u8,
    pub elapsed_seconds: f64,
    pub eta: Eta,
    pub latest_log_description: String,
    pub latest_log_substep: String,
    pub result_count: u64,
    pub success_ratio_percent: u32,
    pub result: Option<String>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct MonitorEvent {
    pub category: Category,
    pub task_id: TaskId,
    pub kind: MonitorEventKind,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEventKind {
    StateChanged { from: TaskState, to: TaskState },
    Progress(ProgressSummary),
    Log(LogEvent),
    PollFailed { message: String },
    /// The cancel request never reached the backend; the task keeps running.
    CancelFailed { message: String },
    Finished(TaskOutcome),
}

#[derive(Debug)]
pub struct Task {
    pub id: TaskId,
    pub category: Category,
    pub submitted_at: DateTime<Utc>,
    pub started: Instant,
    pub state: TaskState,
    pub last_snapshot: Option<ProgressSummary>,
    pub seen_log_keys: LogDeduplicator,
    pub log: Vec<LogEvent>,
    pub last_poll_error: Option<String>,
    pub cancel_requested_at: Option<Instant>,
    pub outcome: Option<TaskOutcome>,
}

impl Task {
    pub fn new(id: TaskId, category: Category) -> Self {
        Self {
            id,
            category,
            submitted_at: Utc::now(),
            started: Instant::now(),
            state: TaskState::Submitted,
            last_snapshot: None,
            seen_log_keys: LogDeduplicator::new(),
            log: Vec::new(),
            last_poll_error: None,
            cancel_requested_at: None,
            outcome: None,
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.started.elapsed()
    }
}
