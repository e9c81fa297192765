use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::normalizer::normalize;
use super::types::{Category, MonitorEvent, MonitorEventKind, Task, TaskState};
use crate::backend::JobBackend;
use crate::error::MonitorError;
use crate::reports::DirectoryBrowser;
use crate::result::TaskOutcome;

pub type SharedTask = Arc<Mutex<Task>>;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub fn lock_task(task: &SharedTask) -> MutexGuard<'_, Task> {
    task.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Copy, Debug)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub cancel_timeout: Duration,
}

#[derive(Debug, PartialEq, Eq)]
pub enum PollStep {
    Continue,
    Finished,
}

/// Drives one task from submission to a terminal state.
///
/// Polls run sequentially inside a single spawned loop, so a slow poll makes
/// the ticker skip instead of stacking requests.
pub struct TaskMonitor {
    task: SharedTask,
    backend: Arc<dyn JobBackend>,
    events: broadcast::Sender<MonitorEvent>,
    outcome: watch::Sender<Option<TaskOutcome>>,
    browser: Option<Arc<DirectoryBrowser>>,
    settings: MonitorSettings,
}

impl TaskMonitor {
    pub fn new(
        task: SharedTask,
        backend: Arc<dyn JobBackend>,
        events: broadcast::Sender<MonitorEvent>,
        outcome: watch::Sender<Option<TaskOutcome>>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            task,
            backend,
            events,
            outcome,
            browser: None,
            settings,
        }
    }

    /// Refresh `browser` whenever the task completes.
    pub fn with_refresh(mut self, browser: Arc<DirectoryBrowser>) -> Self {
        self.browser = Some(browser);
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) {
        let period = self.settings.poll_interval.max(MIN_POLL_INTERVAL);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if self.cancel_expired() {
                self.force_cancelled().await;
                break;
            }
            if self.poll_once().await == PollStep::Finished {
                break;
            }
        }

        {
            let task = lock_task(&self.task);
            debug!(category = %task.category, task_id = %task.id, state = %task.state, "monitor stopped");
        }
    }

    pub async fn poll_once(&self) -> PollStep {
        let (category, task_id) = {
            let task = lock_task(&self.task);
            if task.state.is_terminal() {
                return PollStep::Finished;
            }
            (task.category, task.id.clone())
        };

        let snapshot = match self.backend.status(category, &task_id).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                self.record_poll_failure(category, &task_id, err);
                return PollStep::Continue;
            }
        };

        let (fresh_logs, summary, from, to, outcome) = {
            let mut task = lock_task(&self.task);
            if task.state.is_terminal() {
                return PollStep::Finished;
            }
            let summary = normalize(&snapshot, task.elapsed());
            let fresh_logs = task.seen_log_keys.filter_new(&snapshot.log);
            task.log.extend(fresh_logs.iter().cloned());
            task.last_snapshot = Some(summary.clone());
            task.last_poll_error = None;

            let from = task.state;
            let to = from.advance(snapshot.status);
            task.state = to;
            let outcome = if to.is_terminal() {
                let outcome = build_outcome(&task, false);
                task.outcome = Some(outcome.clone());
                Some(outcome)
            } else {
                None
            };
            (fresh_logs, summary, from, to, outcome)
        };

        debug!(
            category = %category,
            task_id = %task_id,
            percent = summary.percent,
            new_log_lines = fresh_logs.len(),
            "polled status"
        );
        for event in fresh_logs {
            self.emit(category, &task_id, MonitorEventKind::Log(event));
        }
        self.emit(category, &task_id, MonitorEventKind::Progress(summary));
        if from != to {
            info!(category = %category, task_id = %task_id, from = %from, to = %to, "task state changed");
            self.emit(category, &task_id, MonitorEventKind::StateChanged { from, to });
        }

        match outcome {
            Some(outcome) => {
                self.finish(outcome).await;
                PollStep::Finished
            }
            None => PollStep::Continue,
        }
    }

    fn record_poll_failure(&self, category: Category, task_id: &str, err: MonitorError) {
        let failure = MonitorError::TransientPollFailure(err.to_string());
        warn!(category = %category, task_id = %task_id, error = %failure, "status poll failed; retrying next tick");
        lock_task(&self.task).last_poll_error = Some(failure.to_string());
        self.emit(
            category,
            task_id,
            MonitorEventKind::PollFailed {
                message: failure.to_string(),
            },
        );
    }

    fn cancel_expired(&self) -> bool {
        let task = lock_task(&self.task);
        task.state == TaskState::Cancelling
            && task
                .cancel_requested_at
                .map_or(false, |at| at.elapsed() >= self.settings.cancel_timeout)
    }

    async fn force_cancelled(&self) {
        let (category, task_id, outcome) = {
            let mut task = lock_task(&self.task);
            task.state = TaskState::Cancelled;
            let outcome = build_outcome(&task, true);
            task.outcome = Some(outcome.clone());
            (task.category, task.id.clone(), outcome)
        };
        warn!(
            category = %category,
            task_id = %task_id,
            "cancel not confirmed in time; marked cancelled locally, remote job may still be running"
        );
        self.emit(
            category,
            &task_id,
            MonitorEventKind::StateChanged {
                from: TaskState::Cancelling,
                to: TaskState::Cancelled,
            },
        );
        self.finish(outcome).await;
    }

    /// Refreshes reports for a completed task before anyone waiting on the
    /// outcome is woken.
    async fn finish(&self, outcome: TaskOutcome) {
        let category = outcome.category;
        let task_id = outcome.task_id.clone();

        if outcome.state == TaskState::Completed {
            if let Some(browser) = &self.browser {
                if let Err(err) = browser.refresh().await {
                    warn!(task_id = %task_id, error = %err, "report listing refresh failed");
                }
            }
        }

        self.emit(category, &task_id, MonitorEventKind::Finished(outcome.clone()));
        self.outcome.send_replace(Some(outcome));
    }

    fn emit(&self, category: Category, task_id: &str, kind: MonitorEventKind) {
        let _ = self.events.send(MonitorEvent {
            category,
            task_id: task_id.to_string(),
            kind,
        });
    }
}

fn build_outcome(task: &Task, forced: bool) -> TaskOutcome {
    let summary = task.last_snapshot.as_ref();
    TaskOutcome {
        task_id: task.id.clone(),
        category: task.category,
        state: task.state,
        result: summary.and_then(|s| s.result.clone()),
        error: summary.and_then(|s| s.error.clone()),
        forced,
        finished_at: Utc::now(),
    }
}
