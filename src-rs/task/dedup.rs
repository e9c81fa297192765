use std::collections::HashSet;

use super::types::LogEvent;
use crate::backend::RawLogEntry;

/// Tracks which log lines of one task were already surfaced.
///
/// The backend replays the full log on every poll, so each pass is compared
/// against what earlier passes emitted. Emission follows server order.
#[derive(Debug, Default)]
pub struct LogDeduplicator {
    seen: HashSet<String>,
}

impl LogDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter_new(&mut self, entries: &[RawLogEntry]) -> Vec<LogEvent> {
        let fresh: Vec<LogEvent> = entries
            .iter()
            .map(RawLogEntry::to_event)
            .filter(|event| !self.seen.contains(&event.identity()))
            .collect();
        for event in &fresh {
            self.seen.insert(event.identity());
        }
        fresh
    }

}
