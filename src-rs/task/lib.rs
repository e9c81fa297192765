pub mod dedup;
pub mod monitor;
pub mod normalizer;
pub mod registry;
pub mod request;
pub mod types;

pub use dedup::LogDeduplicator;
pub use monitor::{MonitorSettings, SharedTask, TaskMonitor};
pub use normalizer::{estimate_eta, normalize, success_ratio};
pub use registry::{TaskHandle, TaskRegistry, TaskView};
pub use request::{AutomationRequest, JobRequest, ResearchRequest};
pub use types::{
    Category, Eta, LogEvent, MonitorEvent, MonitorEventKind, ProgressSummary, Task, TaskId,
    TaskState,
};
