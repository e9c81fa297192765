use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::MonitorError;
use crate::reports::{Entry, Listing, Selection, ROOT};
use crate::task::{Category, JobRequest, TaskView};
use crate::workbench::Workbench;

pub struct ApiError(MonitorError);

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            MonitorError::AlreadyRunning(_) => StatusCode::CONFLICT,
            MonitorError::SubmissionRejected(_) | MonitorError::InvalidCategory(_) => {
                StatusCode::BAD_REQUEST
            }
            MonitorError::NotFound(_) => StatusCode::NOT_FOUND,
            MonitorError::Transport(_) | MonitorError::TransientPollFailure(_) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({"error": self.0.to_string()}))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize, Default)]
pub struct ViewQuery {
    pub log_offset: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ReportsQuery {
    pub path: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SuggestionsQuery {
    pub research_goal: Option<String>,
}

pub async fn handle_health() -> Json<Value> {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

pub async fn handle_submit(
    State(workbench): State<Arc<Workbench>>,
    Path(category): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<Value> {
    let category: Category = category.parse()?;
    let request = JobRequest::from_json(category, body)?;
    let handle = workbench.submit(request).await?;
    Ok(Json(json!({
        "task_id": handle.id(),
        "category": handle.category(),
        "state": handle.state(),
    })))
}

pub async fn handle_cancel(
    State(workbench): State<Arc<Workbench>>,
    Path(category): Path<String>,
) -> ApiResult<Value> {
    let category: Category = category.parse()?;
    let requested = workbench.cancel(category).await?;
    Ok(Json(json!({
        "category": category,
        "cancel_requested": requested,
        "state": workbench.registry.state(category),
    })))
}

pub async fn handle_view(
    State(workbench): State<Arc<Workbench>>,
    Path(category): Path<String>,
    Query(query): Query<ViewQuery>,
) -> ApiResult<TaskView> {
    let category: Category = category.parse()?;
    workbench
        .task_view(category, query.log_offset.unwrap_or(0))
        .map(Json)
        .ok_or_else(|| MonitorError::NotFound(format!("no {category} job has been submitted")).into())
}

pub async fn handle_reports(
    State(workbench): State<Arc<Workbench>>,
    Query(query): Query<ReportsQuery>,
) -> ApiResult<Listing> {
    let path = query.path.unwrap_or_else(|| ROOT.to_string());
    Ok(Json(workbench.list_reports(&path).await?))
}

pub async fn handle_report_content(
    State(workbench): State<Arc<Workbench>>,
    Path(path): Path<String>,
) -> Result<String, ApiError> {
    Ok(workbench.open_report(path.trim_start_matches('/')).await?)
}

pub async fn handle_report_delete(
    State(workbench): State<Arc<Workbench>>,
    Path(path): Path<String>,
) -> ApiResult<Listing> {
    Ok(Json(workbench.delete_report(path.trim_start_matches('/')).await?))
}

pub async fn handle_report_open(
    State(workbench): State<Arc<Workbench>>,
    Json(entry): Json<Entry>,
) -> ApiResult<Selection> {
    Ok(Json(workbench.open_entry(&entry).await?))
}

pub async fn handle_report_download(
    State(workbench): State<Arc<Workbench>>,
    Path(path): Path<String>,
) -> Result<Response, ApiError> {
    let download = workbench.download_report(path.trim_start_matches('/')).await?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        download.file_name.replace('"', "")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        download.bytes,
    )
        .into_response())
}

pub async fn handle_suggestions(
    State(workbench): State<Arc<Workbench>>,
    Query(query): Query<SuggestionsQuery>,
) -> ApiResult<Value> {
    let suggestions = workbench
        .automation_suggestions(query.research_goal.as_deref())
        .await?;
    Ok(Json(json!({ "suggestions": suggestions })))
}
