use thiserror::Error;

use crate::task::Category;

#[derive(Debug, Error)]
pub enum MonitorError {
    /// The backend (or local validation) declined the job at creation.
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    /// A non-terminal task already occupies the category.
    #[error("a {0} job is already running")]
    AlreadyRunning(Category),

    #[error("status poll failed: {0}")]
    TransientPollFailure(String),

    /// The backend reported `status=failed`.
    #[error("job failed: {0}")]
    RemoteFailure(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unknown category '{0}'")]
    InvalidCategory(String),

    #[error("monitor stopped before the task resolved")]
    MonitorStopped,

    #[error("config error: {0}")]
    Config(String),
}

impl MonitorError {
    pub fn is_already_running(&self) -> bool {
        matches!(self, MonitorError::AlreadyRunning(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, MonitorError::SubmissionRejected(_))
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        MonitorError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
