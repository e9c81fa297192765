use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::backend::{JobBackend, Suggestion};
use crate::config::MonitorConfig;
use crate::error::Result;
use crate::helpers::build_backend;
use crate::reports::{DirectoryBrowser, Download, Entry, Listing, ReportStore, Selection};
use crate::task::{
    Category, JobRequest, MonitorEvent, ProgressSummary, TaskHandle, TaskRegistry, TaskView,
};

/// Goal used for suggestions when the caller gives none.
pub const DEFAULT_RESEARCH_GOAL: &str = "General research automation";

/// Research and automation monitors plus the report browser, behind one facade.
pub struct Workbench {
    pub config: MonitorConfig,
    pub registry: TaskRegistry,
    pub reports: Arc<DirectoryBrowser>,
    jobs: Arc<dyn JobBackend>,
}

impl Workbench {
    pub fn new(config: MonitorConfig) -> Result<Self> {
        let backend = build_backend(&config)?;
        Ok(Self::with_backends(config, backend.clone(), backend))
    }

    pub fn with_backends(
        config: MonitorConfig,
        jobs: Arc<dyn JobBackend>,
        reports: Arc<dyn ReportStore>,
    ) -> Self {
        let settings: HashMap<_, _> = Category::ALL
            .iter()
            .map(|category| (*category, config.monitor_settings(*category)))
            .collect();
        let browser = Arc::new(DirectoryBrowser::new(reports));
        let registry = TaskRegistry::new(jobs.clone(), settings, config.event_buffer)
            .with_report_browser(browser.clone());
        Self {
            config,
            registry,
            reports: browser,
            jobs,
        }
    }

    pub async fn submit(&self, request: JobRequest) -> Result<TaskHandle> {
        self.registry.submit(request).await
    }

    pub async fn cancel(&self, category: Category) -> Result<bool> {
        self.registry.cancel(category).await
    }

    pub fn current_summary(&self, category: Category) -> Option<ProgressSummary> {
        self.registry.current_summary(category)
    }

    pub fn task_view(&self, category: Category, log_offset: usize) -> Option<TaskView> {
        self.registry.view(category, log_offset)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.registry.subscribe()
    }

    pub async fn list_reports(&self, path: &str) -> Result<Listing> {
        self.reports.list(path).await
    }

    pub async fn open_report(&self, path: &str) -> Result<String> {
        self.reports.read_file(path).await
    }

    /// Folder entries list, file entries preview.
    pub async fn open_entry(&self, entry: &Entry) -> Result<Selection> {
        self.reports.open(entry).await
    }

    pub async fn download_report(&self, path: &str) -> Result<Download> {
        self.reports.download(path).await
    }

    pub async fn automation_suggestions(&self, research_goal: Option<&str>) -> Result<Vec<Suggestion>> {
        let goal = research_goal
            .map(str::trim)
            .filter(|goal| !goal.is_empty())
            .unwrap_or(DEFAULT_RESEARCH_GOAL);
        self.jobs.suggestions(goal).await
    }

    pub async fn delete_report(&self, path: &str) -> Result<Listing> {
        self.reports.remove(path).await
    }

    pub fn shutdown(&self) {
        self.registry.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::RemoteStatus;
    use crate::task::{ResearchRequest, TaskState};
    use crate::test_support::{snapshot, FakeBackend, FakeReportStore, ScriptStep};

    #[tokio::test(start_paused = true)]
    async fn completed_research_refreshes_report_listing() {
        let backend = Arc::new(FakeBackend::with_script(vec![ScriptStep::Snapshot(snapshot(
            RemoteStatus::Completed,
            100,
            &[("t0", "Done")],
        ))]));
        let store = Arc::new(FakeReportStore::new());
        store.put_folder(".", vec![FakeReportStore::file("report.md", "report.md")]);
        let workbench = Workbench::with_backends(MonitorConfig::default(), backend, store.clone());

        let mut handle = workbench
            .submit(ResearchRequest::new("rust").into())
            .await
            .unwrap();
        handle.wait().await.unwrap();

        let latest = workbench.reports.latest().unwrap();
        assert_eq!(latest.entries.len(), 1);
        assert_eq!(
            workbench.task_view(Category::Research, 0).map(|v| v.state),
            Some(TaskState::Completed)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn outcome_waits_for_report_refresh() {
        let backend = Arc::new(FakeBackend::with_script(vec![ScriptStep::Snapshot(snapshot(
            RemoteStatus::Completed,
            100,
            &[],
        ))]));
        let store = Arc::new(FakeReportStore::new());
        store.set_list_delay(Duration::from_secs(5));
        let workbench = Workbench::with_backends(MonitorConfig::default(), backend, store.clone());

        let mut handle = workbench
            .submit(ResearchRequest::new("rust").into())
            .await
            .unwrap();
        handle.wait().await.unwrap();
        assert_eq!(store.list_calls("."), 1);
    }

    #[tokio::test]
    async fn suggestions_fall_back_to_general_goal() {
        let backend = Arc::new(FakeBackend::with_script(vec![]));
        let store = Arc::new(FakeReportStore::new());
        let workbench = Workbench::with_backends(MonitorConfig::default(), backend, store);

        let suggestions = workbench.automation_suggestions(Some("  ")).await.unwrap();
        assert_eq!(suggestions[0].command, "ls -la");
        assert!(suggestions[0].description.ends_with(DEFAULT_RESEARCH_GOAL));
        let suggestions = workbench.automation_suggestions(Some("protein folding")).await.unwrap();
        assert!(suggestions[0].description.ends_with("protein folding"));
    }

    #[tokio::test]
    async fn open_entry_navigates_or_previews() {
        let backend = Arc::new(FakeBackend::with_script(vec![]));
        let store = Arc::new(FakeReportStore::new());
        store.put_folder("alpha", vec![FakeReportStore::file("r.md", "alpha/r.md")]);
        store.put_file("alpha/r.md", "# R");
        let workbench = Workbench::with_backends(MonitorConfig::default(), backend, store);

        let folder = FakeReportStore::folder("alpha", "alpha");
        assert!(matches!(
            workbench.open_entry(&folder).await.unwrap(),
            Selection::Listing(listing) if listing.entries.len() == 1
        ));
        let file = FakeReportStore::file("r.md", "alpha/r.md");
        assert_eq!(
            workbench.open_entry(&file).await.unwrap(),
            Selection::Preview("# R".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_polling() {
        let backend = Arc::new(FakeBackend::with_script(vec![ScriptStep::Snapshot(snapshot(
            RemoteStatus::Running,
            10,
            &[],
        ))]));
        let store = Arc::new(FakeReportStore::new());
        let workbench = Workbench::with_backends(MonitorConfig::default(), backend.clone(), store);

        workbench.submit(ResearchRequest::new("rust").into()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        workbench.shutdown();
        let calls = backend.status_calls();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(backend.status_calls(), calls);
        assert_eq!(workbench.current_summary(Category::Research).map(|s| s.percent), Some(10));
    }
}
