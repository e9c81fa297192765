use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{JobBackend, RawLogEntry, RemoteStatus, StatusSnapshot, Suggestion};
use crate::error::{MonitorError, Result};
use crate::reports::{file_name, Download, Entry, EntryKind, ReportStore};
use crate::task::{Category, JobRequest, TaskId};

#[derive(Clone)]
pub enum ScriptStep {
    Snapshot(StatusSnapshot),
    Fail(String),
}

pub fn snapshot(status: RemoteStatus, progress: u8, log: &[(&str, &str)]) -> StatusSnapshot {
    StatusSnapshot {
        status,
        progress: Some(f64::from(progress)),
        log: log
            .iter()
            .map(|(ts, desc)| RawLogEntry {
                timestamp: Some(ts.to_string()),
                description: Some(desc.to_string()),
                substep: None,
                log: None,
            })
            .collect(),
        ..StatusSnapshot::default()
    }
}

pub fn running(progress: u8, log: &[(&str, &str)]) -> StatusSnapshot {
    snapshot(RemoteStatus::Running, progress, log)
}

/// Replays a scripted sequence of status responses; the last step repeats.
pub struct FakeBackend {
    script: Mutex<VecDeque<ScriptStep>>,
    status_delay: Duration,
    next_id: AtomicUsize,
    submits: AtomicUsize,
    status_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    cancels: Mutex<Vec<String>>,
    reject_next: Mutex<Option<String>>,
    fail_cancel: Mutex<Option<String>>,
}

impl FakeBackend {
    pub fn with_script(steps: Vec<ScriptStep>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            status_delay: Duration::ZERO,
            next_id: AtomicUsize::new(1),
            submits: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            cancels: Mutex::new(Vec::new()),
            reject_next: Mutex::new(None),
            fail_cancel: Mutex::new(None),
        }
    }

    pub fn with_status_delay(mut self, delay: Duration) -> Self {
        self.status_delay = delay;
        self
    }

    pub fn reject_next(&self, reason: &str) {
        *self.reject_next.lock().unwrap() = Some(reason.to_string());
    }

    pub fn fail_next_cancel(&self, reason: &str) {
        *self.fail_cancel.lock().unwrap() = Some(reason.to_string());
    }

    pub fn submit_calls(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn cancelled_ids(&self) -> Vec<String> {
        self.cancels.lock().unwrap().clone()
    }

    fn next_step(&self) -> Option<ScriptStep> {
        let mut script = self.script.lock().unwrap();
        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        }
    }
}

#[async_trait]
impl JobBackend for FakeBackend {
    async fn submit(&self, request: &JobRequest) -> Result<TaskId> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.reject_next.lock().unwrap().take() {
            return Err(MonitorError::SubmissionRejected(reason));
        }
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{}-{}", request.category(), n))
    }

    async fn status(&self, _category: Category, _task_id: &str) -> Result<StatusSnapshot> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.status_delay.is_zero() {
            tokio::time::sleep(self.status_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.next_step() {
            Some(ScriptStep::Snapshot(snapshot)) => Ok(snapshot),
            Some(ScriptStep::Fail(message)) => Err(MonitorError::Transport(message)),
            None => Ok(running(0, &[])),
        }
    }

    async fn cancel(&self, _category: Category, task_id: &str) -> Result<()> {
        if let Some(reason) = self.fail_cancel.lock().unwrap().take() {
            return Err(MonitorError::Transport(reason));
        }
        self.cancels.lock().unwrap().push(task_id.to_string());
        Ok(())
    }

    async fn suggestions(&self, research_goal: &str) -> Result<Vec<Suggestion>> {
        Ok(vec![Suggestion {
            category: "files".to_string(),
            command: "ls -la".to_string(),
            description: format!("List files for {research_goal}"),
        }])
    }
}

#[derive(Default)]
pub struct FakeReportStore {
    folders: Mutex<HashMap<String, Vec<Entry>>>,
    files: Mutex<HashMap<String, String>>,
    list_calls: Mutex<Vec<String>>,
    list_delay: Mutex<Duration>,
    removed: Mutex<Vec<String>>,
}

impl FakeReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(name: &str, path: &str) -> Entry {
        Entry {
            name: name.to_string(),
            path: path.to_string(),
            kind: EntryKind::File,
        }
    }

    pub fn folder(name: &str, path: &str) -> Entry {
        Entry {
            name: name.to_string(),
            path: path.to_string(),
            kind: EntryKind::Folder,
        }
    }

    pub fn put_folder(&self, path: &str, entries: Vec<Entry>) {
        self.folders.lock().unwrap().insert(path.to_string(), entries);
    }

    pub fn put_file(&self, path: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
    }

    /// Each `list` sleeps this long before it is recorded and answered.
    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = delay;
    }

    pub fn list_calls(&self, path: &str) -> usize {
        self.list_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.as_str() == path)
            .count()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReportStore for FakeReportStore {
    async fn list(&self, path: &str) -> Result<Vec<Entry>> {
        let delay = *self.list_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.list_calls.lock().unwrap().push(path.to_string());
        Ok(self
            .folders
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default())
    }

    async fn read_file(&self, path: &str) -> Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| MonitorError::NotFound(path.to_string()))
    }

    async fn remove(&self, path: &str) -> Result<()> {
        if self.files.lock().unwrap().remove(path).is_none() {
            return Err(MonitorError::NotFound(path.to_string()));
        }
        for entries in self.folders.lock().unwrap().values_mut() {
            entries.retain(|entry| entry.path != path);
        }
        self.removed.lock().unwrap().push(path.to_string());
        Ok(())
    }

    async fn download(&self, path: &str) -> Result<Download> {
        let content = self.read_file(path).await?;
        Ok(Download {
            file_name: file_name(path),
            bytes: content.into_bytes(),
        })
    }
}
