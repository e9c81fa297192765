use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{HttpBackend, HttpBackendConfig};
use crate::config::MonitorConfig;
use crate::error::Result;

pub fn env_or(key: &str, fallback: &str) -> String {
    env_opt(key).unwrap_or_else(|| fallback.to_string())
}

pub fn env_opt(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}

pub fn env_millis(key: &str, fallback: Duration) -> Duration {
    env_opt(key)
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(fallback)
}

pub fn env_secs(key: &str, fallback: Duration) -> Duration {
    env_opt(key)
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(fallback)
}

pub fn env_port(key: &str, fallback: u16) -> u16 {
    env_opt(key)
        .and_then(|raw| raw.parse::<u16>().ok())
        .unwrap_or(fallback)
}

pub fn build_backend(cfg: &MonitorConfig) -> Result<Arc<HttpBackend>> {
    cfg.validate()?;
    let backend = HttpBackend::new(HttpBackendConfig {
        base_url: cfg.backend_url.clone(),
        token: cfg.token.clone(),
        timeout: cfg.request_timeout,
    })?;
    Ok(Arc::new(backend))
}
