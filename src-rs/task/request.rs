use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::types::Category;
use crate::error::{MonitorError, Result};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improvement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_results: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctx_window: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_docs_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_depth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents_base_dir: Option<String>,
    /// Keys the backend accepts that are not modelled above; forwarded as-is.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResearchRequest {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AutomationRequest {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_goal: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AutomationRequest {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            ..Self::default()
        }
    }
}

/// A job submission. The variant decides which category slot it occupies.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum JobRequest {
    Research(ResearchRequest),
    Automation(AutomationRequest),
}

impl JobRequest {
    pub fn category(&self) -> Category {
        match self {
            JobRequest::Research(_) => Category::Research,
            JobRequest::Automation(_) => Category::Automation,
        }
    }

    /// Rejects submissions missing their required field before any network call.
    pub fn validate(&self) -> Result<()> {
        match self {
            JobRequest::Research(req) if req.query.trim().is_empty() => Err(
                MonitorError::SubmissionRejected("research query is required".to_string()),
            ),
            JobRequest::Automation(req) if req.command.trim().is_empty() => Err(
                MonitorError::SubmissionRejected("automation command is required".to_string()),
            ),
            _ => Ok(()),
        }
    }

    /// Parses a caller-supplied JSON body for `category`.
    pub fn from_json(category: Category, body: Value) -> Result<Self> {
        let parsed = match category {
            Category::Research => serde_json::from_value(body).map(JobRequest::Research),
            Category::Automation => serde_json::from_value(body).map(JobRequest::Automation),
        };
        parsed.map_err(|err| MonitorError::SubmissionRejected(format!("invalid {category} payload: {err}")))
    }
}

impl From<ResearchRequest> for JobRequest {
    fn from(req: ResearchRequest) -> Self {
        JobRequest::Research(req)
    }
}

impl From<AutomationRequest> for JobRequest {
    fn from(req: AutomationRequest) -> Self {
        JobRequest::Automation(req)
    }
}
