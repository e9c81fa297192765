use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::reports::Entry;
use crate::task::{Category, JobRequest, LogEvent, TaskId};

/// Status string reported by the backend for a job.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    #[serde(alias = "pending")]
    Submitted,
    Running,
    Completed,
    Failed,
    Cancelled,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawLogEntry {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, alias = "desc")]
    pub description: Option<String>,
    #[serde(default)]
    pub substep: Option<String>,
    /// Free-text line; takes precedence over `description` when rendered.
    #[serde(default)]
    pub log: Option<String>,
}

impl RawLogEntry {
    pub fn display_text(&self) -> &str {
        self.log
            .as_deref()
            .filter(|line| !line.is_empty())
            .or(self.description.as_deref())
            .unwrap_or("")
    }

    pub fn to_event(&self) -> LogEvent {
        LogEvent {
            timestamp: self.timestamp.clone().unwrap_or_default(),
            description: self.display_text().to_string(),
            substep: self.substep.clone().unwrap_or_default(),
        }
    }
}

/// One raw status payload returned by a poll.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default)]
    pub status: RemoteStatus,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub log: Vec<RawLogEntry>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default, alias = "totalResultsFound")]
    pub total_results_found: Option<u64>,
    #[serde(default, alias = "successfulQueries")]
    pub successful_queries: Option<u64>,
    #[serde(default, alias = "totalQueries")]
    pub total_queries: Option<u64>,
}

impl StatusSnapshot {
    pub fn result_text(&self) -> Option<String> {
        match &self.result {
            None | Some(Value::Null) => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubmitResponse {
    #[serde(default, alias = "taskId")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListingResponse {
    #[serde(default, alias = "reports")]
    pub entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub detail: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorResponse {
    pub fn message(self) -> Option<String> {
        match self.detail {
            Some(Value::String(text)) => Some(text),
            Some(other) => Some(other.to_string()),
            None => self.error,
        }
    }
}

/// One command the automation service proposes for a research goal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub category: String,
    pub command: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SuggestionsResponse {
    #[serde(default)]
    pub suggestions: Vec<Suggestion>,
}

/// The job-execution service: accepts submissions and reports status.
#[async_trait]
pub trait JobBackend: Send + Sync {
    async fn submit(&self, request: &JobRequest) -> Result<TaskId>;

    async fn status(&self, category: Category, task_id: &str) -> Result<StatusSnapshot>;

    /// Fire-and-forget; the effect is only observed through later polls.
    async fn cancel(&self, category: Category, task_id: &str) -> Result<()>;

    /// Safe automation commands for `research_goal`.
    async fn suggestions(&self, research_goal: &str) -> Result<Vec<Suggestion>>;
}
