use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use super::monitor::{lock_task, MonitorSettings, SharedTask, TaskMonitor};
use super::request::JobRequest;
use super::types::{
    Category, LogEvent, MonitorEvent, MonitorEventKind, ProgressSummary, Task, TaskId, TaskState,
};
use crate::backend::JobBackend;
use crate::error::{MonitorError, Result};
use crate::reports::DirectoryBrowser;
use crate::result::TaskOutcome;

struct Tracked {
    task: SharedTask,
    outcome: watch::Receiver<Option<TaskOutcome>>,
    handle: JoinHandle<()>,
}

impl Tracked {
    fn is_finished(&self) -> bool {
        lock_task(&self.task).state.is_terminal()
    }
}

enum Slot {
    /// A submission is in flight; `previous` is restored if it fails.
    Submitting { previous: Option<Tracked> },
    Tracking(Tracked),
}

/// Caller-side handle to one submitted task.
#[derive(Clone)]
pub struct TaskHandle {
    id: TaskId,
    category: Category,
    task: SharedTask,
    outcome: watch::Receiver<Option<TaskOutcome>>,
}

impl TaskHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn state(&self) -> TaskState {
        lock_task(&self.task).state
    }

    pub fn summary(&self) -> Option<ProgressSummary> {
        lock_task(&self.task).last_snapshot.clone()
    }

    /// Resolves once the task is terminal. A `Failed` task yields `RemoteFailure`.
    pub async fn wait(&mut self) -> Result<TaskOutcome> {
        let outcome = {
            let resolved = self
                .outcome
                .wait_for(Option::is_some)
                .await
                .map_err(|_| MonitorError::MonitorStopped)?;
            (*resolved).clone()
        };
        outcome.ok_or(MonitorError::MonitorStopped)?.into_result()
    }
}

/// Point-in-time copy of a tracked task, with the log paged from an offset.
#[derive(Clone, Debug, Serialize)]
pub struct TaskView {
    pub task_id: TaskId,
    pub category: Category,
    pub state: TaskState,
    pub submitted_at: DateTime<Utc>,
    pub summary: Option<ProgressSummary>,
    pub outcome: Option<TaskOutcome>,
    pub last_poll_error: Option<String>,
    pub log: Vec<LogEvent>,
    pub next_log_offset: usize,
}

impl TaskView {
    fn from_task(task: &Task, log_offset: usize) -> Self {
        let start = log_offset.min(task.log.len());
        Self {
            task_id: task.id.clone(),
            category: task.category,
            state: task.state,
            submitted_at: task.submitted_at,
            summary: task.last_snapshot.clone(),
            outcome: task.outcome.clone(),
            last_poll_error: task.last_poll_error.clone(),
            log: task.log[start..].to_vec(),
            next_log_offset: task.log.len(),
        }
    }
}

/// Holds at most one live task per category.
pub struct TaskRegistry {
    backend: Arc<dyn JobBackend>,
    settings: HashMap<Category, MonitorSettings>,
    slots: Mutex<HashMap<Category, Slot>>,
    events: broadcast::Sender<MonitorEvent>,
    browser: Option<Arc<DirectoryBrowser>>,
}

impl TaskRegistry {
    pub fn new(
        backend: Arc<dyn JobBackend>,
        settings: HashMap<Category, MonitorSettings>,
        event_buffer: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            backend,
            settings,
            slots: Mutex::new(HashMap::new()),
            events,
            browser: None,
        }
    }

    /// Research completions refresh `browser`.
    pub fn with_report_browser(mut self, browser: Arc<DirectoryBrowser>) -> Self {
        self.browser = Some(browser);
        self
    }

    pub async fn submit(&self, request: JobRequest) -> Result<TaskHandle> {
        let category = request.category();
        let reservation = self.reserve(category)?;
        request.validate()?;

        let task_id = match self.backend.submit(&request).await {
            Ok(task_id) => task_id,
            Err(err) => {
                warn!(category = %category, error = %err, "submission failed");
                return Err(err);
            }
        };
        info!(category = %category, task_id = %task_id, "job submitted");

        let task = Arc::new(Mutex::new(Task::new(task_id.clone(), category)));
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let mut monitor = TaskMonitor::new(
            task.clone(),
            self.backend.clone(),
            self.events.clone(),
            outcome_tx,
            self.monitor_settings(category),
        );
        if category == Category::Research {
            if let Some(browser) = &self.browser {
                monitor = monitor.with_refresh(browser.clone());
            }
        }
        let handle = monitor.spawn();

        reservation.commit(Tracked {
            task: task.clone(),
            outcome: outcome_rx.clone(),
            handle,
        });
        Ok(TaskHandle {
            id: task_id,
            category,
            task,
            outcome: outcome_rx,
        })
    }

    /// Requests cancellation of the live task in `category`. Returns whether a
    /// request was issued; the task only turns `Cancelled` once a poll confirms
    /// it or the cancel timeout expires.
    ///
    /// If the backend never receives the request the task goes back to its
    /// previous state, subscribers get `CancelFailed`, and the error is returned.
    pub async fn cancel(&self, category: Category) -> Result<bool> {
        let Some(shared) = self.live_task(category) else {
            return Ok(false);
        };
        let (task_id, from) = {
            let mut task = lock_task(&shared);
            let Some(next) = task.state.on_cancel() else {
                return Ok(false);
            };
            let from = task.state;
            task.state = next;
            task.cancel_requested_at = Some(Instant::now());
            (task.id.clone(), from)
        };
        info!(category = %category, task_id = %task_id, "cancel requested");
        self.emit(
            category,
            &task_id,
            MonitorEventKind::StateChanged {
                from,
                to: TaskState::Cancelling,
            },
        );

        let Err(err) = self.backend.cancel(category, &task_id).await else {
            return Ok(true);
        };
        warn!(category = %category, task_id = %task_id, error = %err, "cancel request failed");
        let reverted = {
            let mut task = lock_task(&shared);
            if task.state == TaskState::Cancelling {
                task.state = from;
                task.cancel_requested_at = None;
                true
            } else {
                false
            }
        };
        if reverted {
            self.emit(
                category,
                &task_id,
                MonitorEventKind::StateChanged {
                    from: TaskState::Cancelling,
                    to: from,
                },
            );
        }
        self.emit(
            category,
            &task_id,
            MonitorEventKind::CancelFailed {
                message: err.to_string(),
            },
        );
        Err(err)
    }

    /// Latest known summary, without triggering a poll.
    pub fn current_summary(&self, category: Category) -> Option<ProgressSummary> {
        self.with_tracked(category, |tracked| lock_task(&tracked.task).last_snapshot.clone())
            .flatten()
    }

    pub fn state(&self, category: Category) -> Option<TaskState> {
        self.with_tracked(category, |tracked| lock_task(&tracked.task).state)
    }

    pub fn is_active(&self, category: Category) -> bool {
        let slots = self.lock_slots();
        match slots.get(&category) {
            Some(Slot::Submitting { .. }) => true,
            Some(Slot::Tracking(tracked)) => !tracked.is_finished(),
            None => false,
        }
    }

    pub fn view(&self, category: Category, log_offset: usize) -> Option<TaskView> {
        self.with_tracked(category, |tracked| {
            TaskView::from_task(&lock_task(&tracked.task), log_offset)
        })
    }

    pub fn outcome(&self, category: Category) -> Option<TaskOutcome> {
        self.with_tracked(category, |tracked| (*tracked.outcome.borrow()).clone())
            .flatten()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.events.subscribe()
    }

    /// Stops every monitor loop. Tasks keep their last known state.
    pub fn shutdown(&self) {
        let slots = self.lock_slots();
        for slot in slots.values() {
            let tracked = match slot {
                Slot::Tracking(tracked) => Some(tracked),
                Slot::Submitting { previous } => previous.as_ref(),
            };
            if let Some(tracked) = tracked {
                tracked.handle.abort();
            }
        }
    }

    fn emit(&self, category: Category, task_id: &str, kind: MonitorEventKind) {
        let _ = self.events.send(MonitorEvent {
            category,
            task_id: task_id.to_string(),
            kind,
        });
    }

    fn monitor_settings(&self, category: Category) -> MonitorSettings {
        self.settings.get(&category).copied().unwrap_or(MonitorSettings {
            poll_interval: std::time::Duration::from_secs(1),
            cancel_timeout: std::time::Duration::from_secs(30),
        })
    }

    fn live_task(&self, category: Category) -> Option<SharedTask> {
        let slots = self.lock_slots();
        match slots.get(&category) {
            Some(Slot::Tracking(tracked)) if !tracked.is_finished() => Some(tracked.task.clone()),
            _ => None,
        }
    }

    fn with_tracked<T>(&self, category: Category, f: impl FnOnce(&Tracked) -> T) -> Option<T> {
        let slots = self.lock_slots();
        match slots.get(&category)? {
            Slot::Tracking(tracked) => Some(f(tracked)),
            Slot::Submitting { previous } => previous.as_ref().map(f),
        }
    }

    fn reserve(&self, category: Category) -> Result<Reservation<'_>> {
        let mut slots = self.lock_slots();
        let previous = match slots.remove(&category) {
            None => None,
            Some(Slot::Tracking(tracked)) if tracked.is_finished() => Some(tracked),
            Some(occupied) => {
                slots.insert(category, occupied);
                return Err(MonitorError::AlreadyRunning(category));
            }
        };
        slots.insert(category, Slot::Submitting { previous });
        Ok(Reservation {
            registry: self,
            category,
            committed: false,
        })
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<Category, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Holds a category slot while a submission is in flight. Dropping it without
/// committing (error or caller gave up) puts the previous occupant back.
struct Reservation<'a> {
    registry: &'a TaskRegistry,
    category: Category,
    committed: bool,
}

impl Reservation<'_> {
    fn commit(mut self, tracked: Tracked) {
        self.registry
            .lock_slots()
            .insert(self.category, Slot::Tracking(tracked));
        self.committed = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        let mut slots = self.registry.lock_slots();
        if let Some(Slot::Submitting { previous }) = slots.remove(&self.category) {
            if let Some(previous) = previous {
                slots.insert(self.category, Slot::Tracking(previous));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::backend::RemoteStatus;
    use crate::reports::DirectoryBrowser;
    use crate::task::{AutomationRequest, Eta, ResearchRequest};
    use crate::test_support::{running, snapshot, FakeBackend, FakeReportStore, ScriptStep};

    fn settings(cancel_timeout: Duration) -> HashMap<Category, MonitorSettings> {
        HashMap::from([
            (
                Category::Research,
                MonitorSettings {
                    poll_interval: Duration::from_secs(1),
                    cancel_timeout,
                },
            ),
            (
                Category::Automation,
                MonitorSettings {
                    poll_interval: Duration::from_secs(2),
                    cancel_timeout,
                },
            ),
        ])
    }

    fn registry(backend: Arc<FakeBackend>) -> TaskRegistry {
        TaskRegistry::new(backend, settings(Duration::from_secs(30)), 64)
    }

    fn research(query: &str) -> JobRequest {
        ResearchRequest::new(query).into()
    }

    async fn tick(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn second_submit_in_same_category_is_rejected() {
        let backend = Arc::new(FakeBackend::with_script(vec![ScriptStep::Snapshot(running(5, &[]))]));
        let registry = registry(backend.clone());

        let first = registry.submit(research("rust async runtimes")).await.unwrap();
        let err = registry.submit(research("another topic")).await.err().unwrap();
        assert!(err.is_already_running());
        assert_eq!(backend.submit_calls(), 1);
        assert_eq!(registry.view(Category::Research, 0).unwrap().task_id, first.id());

        let automation = registry
            .submit(AutomationRequest::new("collect citations").into())
            .await
            .unwrap();
        assert_eq!(automation.category(), Category::Automation);
        assert!(registry
            .submit(AutomationRequest::new("again").into())
            .await
            .err()
            .unwrap()
            .is_already_running());
    }

    #[tokio::test(start_paused = true)]
    async fn research_job_runs_to_completion() {
        let mut done = snapshot(RemoteStatus::Completed, 100, &[]);
        done.result = Some(serde_json::Value::String("report text".to_string()));
        let backend = Arc::new(FakeBackend::with_script(vec![
            ScriptStep::Snapshot(running(10, &[("t0", "Starting")])),
            ScriptStep::Snapshot(running(55, &[("t0", "Starting"), ("t1", "Fetching sources")])),
            ScriptStep::Snapshot(done),
        ]));
        let store = Arc::new(FakeReportStore::new());
        let browser = Arc::new(DirectoryBrowser::new(store.clone()));
        let registry = registry(backend.clone()).with_report_browser(browser.clone());
        let mut events = registry.subscribe();

        let mut handle = registry.submit(research("rust async runtimes")).await.unwrap();
        assert_eq!(handle.state(), TaskState::Submitted);
        assert!(registry.current_summary(Category::Research).is_none());

        tick(1001).await;
        let summary = registry.current_summary(Category::Research).unwrap();
        assert_eq!(summary.percent, 10);
        assert_eq!(summary.latest_log_description, "Starting");
        assert_eq!(handle.state(), TaskState::Polling);
        assert_eq!(registry.view(Category::Research, 0).unwrap().log.len(), 1);

        tick(1000).await;
        let view = registry.view(Category::Research, 1).unwrap();
        assert_eq!(view.summary.as_ref().map(|s| s.percent), Some(55));
        assert_eq!(view.log.len(), 1);
        assert_eq!(view.log[0].description, "Fetching sources");
        assert_eq!(view.next_log_offset, 2);

        let outcome = handle.wait().await.unwrap();
        assert_eq!(outcome.state, TaskState::Completed);
        assert_eq!(outcome.result.as_deref(), Some("report text"));
        assert!(!outcome.forced);
        assert_eq!(registry.current_summary(Category::Research).unwrap().eta, Eta::Completed);
        assert!(!registry.is_active(Category::Research));
        assert_eq!(store.list_calls("."), 1);
        assert!(browser.latest().is_some());

        let mut log_lines = Vec::new();
        let mut finished = 0;
        while let Ok(event) = events.try_recv() {
            match event.kind {
                MonitorEventKind::Log(line) => log_lines.push(line.description),
                MonitorEventKind::Finished(_) => finished += 1,
                _ => {}
            }
        }
        assert_eq!(log_lines, vec!["Starting", "Fetching sources"]);
        assert_eq!(finished, 1);

        let calls = backend.status_calls();
        tick(5000).await;
        assert_eq!(backend.status_calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn automation_completion_does_not_refresh_reports() {
        let backend = Arc::new(FakeBackend::with_script(vec![ScriptStep::Snapshot(snapshot(
            RemoteStatus::Completed,
            100,
            &[],
        ))]));
        let store = Arc::new(FakeReportStore::new());
        let registry = registry(backend).with_report_browser(Arc::new(DirectoryBrowser::new(store.clone())));

        let mut handle = registry
            .submit(AutomationRequest::new("tidy sources").into())
            .await
            .unwrap();
        handle.wait().await.unwrap();
        assert_eq!(store.list_calls("."), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_cancel_stops_polling() {
        let backend = Arc::new(FakeBackend::with_script(vec![
            ScriptStep::Snapshot(running(10, &[])),
            ScriptStep::Snapshot(running(20, &[])),
            ScriptStep::Snapshot(snapshot(RemoteStatus::Cancelled, 20, &[])),
        ]));
        let registry = registry(backend.clone());
        let handle = registry.submit(research("topic")).await.unwrap();

        tick(1001).await;
        assert_eq!(handle.state(), TaskState::Polling);
        assert!(registry.cancel(Category::Research).await.unwrap());
        assert_eq!(handle.state(), TaskState::Cancelling);
        assert_eq!(backend.cancelled_ids(), vec![handle.id().to_string()]);
        assert!(!registry.cancel(Category::Research).await.unwrap());

        tick(1000).await;
        assert_eq!(handle.state(), TaskState::Cancelling);

        tick(1000).await;
        assert_eq!(handle.state(), TaskState::Cancelled);
        assert_eq!(backend.status_calls(), 3);

        tick(10_000).await;
        assert_eq!(backend.status_calls(), 3);
        assert!(!registry.is_active(Category::Research));
    }

    #[tokio::test(start_paused = true)]
    async fn unconfirmed_cancel_is_forced_after_timeout() {
        let backend = Arc::new(FakeBackend::with_script(vec![ScriptStep::Snapshot(running(40, &[]))]));
        let registry = TaskRegistry::new(backend.clone(), settings(Duration::from_secs(3)), 64);
        let mut handle = registry.submit(research("topic")).await.unwrap();

        tick(1001).await;
        assert!(registry.cancel(Category::Research).await.unwrap());

        let outcome = handle.wait().await.unwrap();
        assert_eq!(outcome.state, TaskState::Cancelled);
        assert!(outcome.forced);
        let calls = backend.status_calls();
        tick(5000).await;
        assert_eq!(backend.status_calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn undelivered_cancel_reverts_and_notifies() {
        let backend = Arc::new(FakeBackend::with_script(vec![ScriptStep::Snapshot(running(40, &[]))]));
        let registry = TaskRegistry::new(backend.clone(), settings(Duration::from_secs(3)), 64);
        let mut events = registry.subscribe();
        let handle = registry.submit(research("topic")).await.unwrap();

        tick(1001).await;
        backend.fail_next_cancel("backend unreachable");
        let err = registry.cancel(Category::Research).await.unwrap_err();
        assert!(matches!(err, MonitorError::Transport(ref msg) if msg.contains("unreachable")));
        assert_eq!(handle.state(), TaskState::Polling);
        assert!(backend.cancelled_ids().is_empty());

        tick(10_000).await;
        assert_eq!(handle.state(), TaskState::Polling);
        assert!(registry.outcome(Category::Research).is_none());

        let mut cancel_failures = 0;
        while let Ok(event) = events.try_recv() {
            if let MonitorEventKind::CancelFailed { message } = event.kind {
                assert!(message.contains("unreachable"));
                cancel_failures += 1;
            }
        }
        assert_eq!(cancel_failures, 1);

        assert!(registry.cancel(Category::Research).await.unwrap());
        assert_eq!(handle.state(), TaskState::Cancelling);
    }

    #[tokio::test]
    async fn cancel_without_task_is_noop() {
        let backend = Arc::new(FakeBackend::with_script(vec![]));
        let registry = registry(backend.clone());
        assert!(!registry.cancel(Category::Automation).await.unwrap());
        assert!(backend.cancelled_ids().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_submission_leaves_slot_free() {
        let backend = Arc::new(FakeBackend::with_script(vec![ScriptStep::Snapshot(running(1, &[]))]));
        let registry = registry(backend.clone());

        backend.reject_next("Research query is required.");
        let err = registry.submit(research("topic")).await.err().unwrap();
        assert!(matches!(err, MonitorError::SubmissionRejected(ref msg) if msg.contains("required")));
        assert!(!registry.is_active(Category::Research));
        assert!(registry.view(Category::Research, 0).is_none());

        assert!(registry.submit(research("topic")).await.is_ok());
    }

    #[tokio::test]
    async fn blank_query_never_reaches_backend() {
        let backend = Arc::new(FakeBackend::with_script(vec![]));
        let registry = registry(backend.clone());
        let err = registry.submit(research("  ")).await.err().unwrap();
        assert!(err.is_rejected());
        assert_eq!(backend.submit_calls(), 0);
        assert!(!registry.is_active(Category::Research));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_failure_keeps_state_and_retries_on_schedule() {
        let backend = Arc::new(FakeBackend::with_script(vec![
            ScriptStep::Fail("connection refused".to_string()),
            ScriptStep::Snapshot(running(30, &[])),
        ]));
        let registry = registry(backend.clone());
        let handle = registry.submit(research("topic")).await.unwrap();

        tick(1001).await;
        assert_eq!(handle.state(), TaskState::Submitted);
        let view = registry.view(Category::Research, 0).unwrap();
        assert!(view.last_poll_error.is_some());
        assert!(view.summary.is_none());

        tick(1000).await;
        assert_eq!(handle.state(), TaskState::Polling);
        assert_eq!(handle.summary().map(|s| s.percent), Some(30));
        assert_eq!(backend.status_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn finished_task_is_replaced_by_next_submission() {
        let backend = Arc::new(FakeBackend::with_script(vec![ScriptStep::Snapshot(snapshot(
            RemoteStatus::Failed,
            60,
            &[],
        ))]));
        let registry = registry(backend.clone());

        let mut first = registry.submit(research("one")).await.unwrap();
        assert!(matches!(first.wait().await, Err(MonitorError::RemoteFailure(_))));
        assert_eq!(registry.state(Category::Research), Some(TaskState::Failed));
        assert_eq!(registry.outcome(Category::Research).map(|o| o.state), Some(TaskState::Failed));

        let second = registry.submit(research("two")).await.unwrap();
        assert_ne!(second.id(), first.id());
        assert_eq!(registry.state(Category::Research), Some(TaskState::Submitted));
    }
}
