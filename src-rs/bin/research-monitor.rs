use std::process::ExitCode;
use std::sync::Arc;

use research_monitor_rs::api::server::GatewayServer;
use research_monitor_rs::helpers::env_port;
use research_monitor_rs::{MonitorConfig, Workbench};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = MonitorConfig::from_env();
    let port = env_port("PORT", 8080);
    info!(backend = %config.backend_url, port, "starting research monitor");

    let workbench = match Workbench::new(config) {
        Ok(workbench) => Arc::new(workbench),
        Err(err) => {
            error!(error = %err, "failed to build workbench");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = workbench.reports.refresh().await {
        warn!(error = %err, "initial report listing failed");
    }

    let server = GatewayServer::new(port, workbench.clone());
    let result = server.start().await;
    workbench.shutdown();
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "server error");
            ExitCode::FAILURE
        }
    }
}
