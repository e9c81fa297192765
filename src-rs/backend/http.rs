use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode, Url};

use super::types::{
    ErrorResponse, JobBackend, ListingResponse, StatusSnapshot, SubmitResponse, Suggestion,
    SuggestionsResponse,
};
use crate::config::DEFAULT_BACKEND_URL;
use crate::error::{MonitorError, Result};
use crate::reports::{file_name, Download, Entry, ReportStore};
use crate::task::{Category, JobRequest, TaskId};

pub struct HttpBackendConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

/// Talks to the job-execution and report-storage services over HTTP.
pub struct HttpBackend {
    cfg: HttpBackendConfig,
    client: Client,
}

impl HttpBackend {
    pub fn new(mut cfg: HttpBackendConfig) -> Result<Self> {
        if cfg.base_url.trim().is_empty() {
            cfg.base_url = DEFAULT_BACKEND_URL.to_string();
        }
        if cfg.timeout.is_zero() {
            cfg.timeout = Duration::from_secs(30);
        }
        let client = Client::builder()
            .timeout(cfg.timeout)
            .default_headers(default_headers(cfg.token.as_deref()))
            .build()
            .map_err(|err| MonitorError::Config(format!("http client: {err}")))?;
        Ok(Self { cfg, client })
    }

    pub fn base_url(&self) -> &str {
        &self.cfg.base_url
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.cfg.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// `prefix` with `path` appended as a single percent-encoded segment.
    fn report_url(&self, prefix: &str, path: &str) -> Result<Url> {
        let mut url = Url::parse(&self.url(prefix))
            .map_err(|err| MonitorError::Config(format!("invalid backend url: {err}")))?;
        url.path_segments_mut()
            .map_err(|_| MonitorError::Config("backend url cannot be a base".to_string()))?
            .push(path);
        Ok(url)
    }
}

fn default_headers(token: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(token) = token {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", token)) {
            headers.insert(AUTHORIZATION, value);
        }
    }
    headers
}

fn submit_path(category: Category) -> &'static str {
    match category {
        Category::Research => "api/research",
        Category::Automation => "api/automation/execute",
    }
}

fn status_path(category: Category, task_id: &str) -> String {
    format!("api/{}/status/{}", category.as_str(), task_id)
}

fn cancel_path(category: Category, task_id: &str) -> String {
    format!("api/{}/cancel/{}", category.as_str(), task_id)
}

/// `filename=` from a `Content-Disposition` header, if the server sent one.
fn attachment_name(resp: &Response) -> Option<String> {
    resp.headers()
        .get(CONTENT_DISPOSITION)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|part| part.trim().strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

async fn error_message(resp: Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorResponse>(&body)
        .ok()
        .and_then(ErrorResponse::message)
        .unwrap_or_else(|| format!("http {}: {}", status.as_u16(), body))
}

async fn ensure_success(resp: Response, what: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = error_message(resp).await;
    if status == StatusCode::NOT_FOUND {
        Err(MonitorError::NotFound(format!("{what}: {message}")))
    } else {
        Err(MonitorError::Transport(format!("{what}: {message}")))
    }
}

#[async_trait]
impl JobBackend for HttpBackend {
    async fn submit(&self, request: &JobRequest) -> Result<TaskId> {
        let category = request.category();
        let resp = self
            .client
            .post(self.url(submit_path(category)))
            .json(request)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(MonitorError::SubmissionRejected(error_message(resp).await));
        }

        let body: SubmitResponse = resp
            .json()
            .await
            .map_err(|err| MonitorError::SubmissionRejected(format!("invalid submit response: {err}")))?;
        match body.task_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => Ok(id),
            None => Err(MonitorError::SubmissionRejected(
                body.error
                    .or(body.detail)
                    .unwrap_or_else(|| "backend returned no task id".to_string()),
            )),
        }
    }

    async fn status(&self, category: Category, task_id: &str) -> Result<StatusSnapshot> {
        let resp = self
            .client
            .get(self.url(&status_path(category, task_id)))
            .send()
            .await?;
        let resp = ensure_success(resp, "status").await?;
        resp.json::<StatusSnapshot>()
            .await
            .map_err(|err| MonitorError::Transport(format!("invalid status payload: {err}")))
    }

    async fn cancel(&self, category: Category, task_id: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.url(&cancel_path(category, task_id)))
            .send()
            .await?;
        ensure_success(resp, "cancel").await?;
        Ok(())
    }

    async fn suggestions(&self, research_goal: &str) -> Result<Vec<Suggestion>> {
        let resp = self
            .client
            .get(self.url("api/automation/suggestions"))
            .query(&[("research_goal", research_goal)])
            .send()
            .await?;
        let resp = ensure_success(resp, "suggestions").await?;
        let body: SuggestionsResponse = resp
            .json()
            .await
            .map_err(|err| MonitorError::Transport(format!("invalid suggestions payload: {err}")))?;
        Ok(body.suggestions)
    }
}

#[async_trait]
impl ReportStore for HttpBackend {
    async fn list(&self, path: &str) -> Result<Vec<Entry>> {
        let resp = self
            .client
            .get(self.url("api/reports"))
            .query(&[("path", path)])
            .send()
            .await?;
        let resp = ensure_success(resp, "list reports").await?;
        let listing: ListingResponse = resp
            .json()
            .await
            .map_err(|err| MonitorError::Transport(format!("invalid listing: {err}")))?;
        Ok(listing.entries)
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        let url = self.report_url("api/reports", path)?;
        let resp = self.client.get(url).send().await?;
        let resp = ensure_success(resp, "read report").await?;
        Ok(resp.text().await?)
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let url = self.report_url("api/delete", path)?;
        let resp = self.client.delete(url).send().await?;
        ensure_success(resp, "delete report").await?;
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Download> {
        let url = self.report_url("api/download", path)?;
        let resp = self.client.get(url).send().await?;
        let resp = ensure_success(resp, "download report").await?;
        let name = attachment_name(&resp).unwrap_or_else(|| file_name(path));
        let bytes = resp.bytes().await?;
        Ok(Download {
            file_name: name,
            bytes: bytes.to_vec(),
        })
    }
}
