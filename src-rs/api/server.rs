use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tracing::info;

use crate::api::handlers::{
    handle_cancel, handle_health, handle_report_content, handle_report_delete,
    handle_report_download, handle_report_open, handle_reports, handle_submit, handle_suggestions,
    handle_view,
};
use crate::error::{MonitorError, Result};
use crate::workbench::Workbench;

pub fn router(workbench: Arc<Workbench>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/jobs/:category", get(handle_view).post(handle_submit))
        .route("/jobs/:category/cancel", post(handle_cancel))
        .route("/automation/suggestions", get(handle_suggestions))
        .route("/reports", get(handle_reports))
        .route(
            "/reports/*path",
            get(handle_report_content).delete(handle_report_delete),
        )
        .route("/browse/open", post(handle_report_open))
        .route("/downloads/*path", get(handle_report_download))
        .with_state(workbench)
}

pub struct GatewayServer {
    pub port: u16,
    pub workbench: Arc<Workbench>,
}

impl GatewayServer {
    pub fn new(port: u16, workbench: Arc<Workbench>) -> Self {
        Self { port, workbench }
    }

    pub async fn start(&self) -> Result<()> {
        let app = router(self.workbench.clone());
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!(%addr, "gateway listening");
        axum::Server::bind(&addr)
            .serve(app.into_make_service())
            .await
            .map_err(|err| MonitorError::Transport(err.to_string()))
    }
}
