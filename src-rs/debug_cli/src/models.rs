use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct CLIConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub project_name: Option<String>,
    pub model: Option<String>,
    pub mode: Option<String>,
    pub watch_interval_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct ResearchSubmit {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AutomationSubmit {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub task_id: String,
    pub category: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelResponse {
    pub cancel_requested: bool,
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", content = "seconds", rename_all = "lowercase")]
pub enum Eta {
    Calculating,
    Remaining(f64),
    Completed,
}

#[derive(Debug, Deserialize)]
pub struct Summary {
    pub status: String,
    pub percent: u8,
    pub elapsed_seconds: f64,
    pub eta: Eta,
    pub latest_log_description: String,
    pub result_count: u64,
    pub success_ratio_percent: u32,
}

#[derive(Debug, Deserialize)]
pub struct LogLine {
    pub timestamp: String,
    pub description: String,
    pub substep: String,
}

#[derive(Debug, Deserialize)]
pub struct Outcome {
    pub state: String,
    pub result: Option<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub forced: bool,
}

#[derive(Debug, Deserialize)]
pub struct TaskView {
    pub task_id: String,
    pub category: String,
    pub state: String,
    pub summary: Option<Summary>,
    pub outcome: Option<Outcome>,
    pub last_poll_error: Option<String>,
    pub log: Vec<LogLine>,
    pub next_log_offset: usize,
}

impl TaskView {
    pub fn is_terminal(&self) -> bool {
        matches!(self.state.as_str(), "completed" | "failed" | "cancelled")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct Listing {
    pub path: String,
    pub entries: Vec<ReportEntry>,
    pub parent_path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Selection {
    Listing(Listing),
    Preview(String),
}

#[derive(Debug, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub category: String,
    pub command: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
    pub detail: Option<Value>,
}
