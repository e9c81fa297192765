pub mod config;
pub mod error;
pub mod helpers;
pub mod result;
pub mod workbench;

#[path = "backend/lib.rs"]
pub mod backend;
#[path = "task/lib.rs"]
pub mod task;
#[path = "reports/lib.rs"]
pub mod reports;
#[path = "api/lib.rs"]
pub mod api;

#[cfg(test)]
mod test_support;

pub use config::MonitorConfig;
pub use error::{MonitorError, Result};
pub use result::TaskOutcome;
pub use workbench::Workbench;
