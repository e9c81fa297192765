use std::time::Duration;

use crate::error::{MonitorError, Result};
use crate::helpers::{env_millis, env_opt, env_or, env_secs};
use crate::task::{Category, MonitorSettings};

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

#[derive(Clone, Debug)]
pub struct MonitorConfig {
    pub backend_url: String,
    pub token: Option<String>,
    pub research_poll_interval: Duration,
    pub automation_poll_interval: Duration,
    /// How long a task may sit in `Cancelling` before it is resolved locally.
    pub cancel_timeout: Duration,
    pub request_timeout: Duration,
    pub event_buffer: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            token: None,
            research_poll_interval: Duration::from_secs(1),
            automation_poll_interval: Duration::from_secs(2),
            cancel_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            event_buffer: 256,
        }
    }
}

impl MonitorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend_url: env_or("RESEARCH_MONITOR_BACKEND_URL", DEFAULT_BACKEND_URL),
            token: env_opt("RESEARCH_MONITOR_TOKEN"),
            research_poll_interval: env_millis(
                "RESEARCH_MONITOR_RESEARCH_POLL_MS",
                defaults.research_poll_interval,
            ),
            automation_poll_interval: env_millis(
                "RESEARCH_MONITOR_AUTOMATION_POLL_MS",
                defaults.automation_poll_interval,
            ),
            cancel_timeout: env_secs("RESEARCH_MONITOR_CANCEL_TIMEOUT_SECS", defaults.cancel_timeout),
            request_timeout: env_secs(
                "RESEARCH_MONITOR_REQUEST_TIMEOUT_SECS",
                defaults.request_timeout,
            ),
            event_buffer: defaults.event_buffer,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend_url.trim().is_empty() {
            return Err(MonitorError::Config("backend url is empty".to_string()));
        }
        if self.research_poll_interval.is_zero() || self.automation_poll_interval.is_zero() {
            return Err(MonitorError::Config("poll interval must be positive".to_string()));
        }
        if self.event_buffer == 0 {
            return Err(MonitorError::Config("event buffer must be positive".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self, category: Category) -> Duration {
        match category {
            Category::Research => self.research_poll_interval,
            Category::Automation => self.automation_poll_interval,
        }
    }

    pub fn monitor_settings(&self, category: Category) -> MonitorSettings {
        MonitorSettings {
            poll_interval: self.poll_interval(category),
            cancel_timeout: self.cancel_timeout,
        }
    }
}
