pub use crate::error::{MonitorError, Result};
pub use crate::task::{Category, JobRequest, TaskHandle, TaskState, TaskView};
pub use crate::workbench::Workbench;

pub mod handlers;
pub mod server;

pub use server::{router, GatewayServer};
