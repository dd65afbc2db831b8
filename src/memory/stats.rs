use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::event::LogRecord;
use super::log::{EventLog, read_records};
use crate::error::LogError;

/// Counts across both log files. The `by_*` breakdowns cover live events
/// only; `total_events` includes tombstoned ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub total_events: usize,
    pub live_events: usize,
    pub tombstoned: usize,
    /// Live but past their TTL; the next sweep buries them.
    pub expired_pending: usize,
    pub global_events: usize,
    pub project_events: usize,
    pub sessions: usize,
    pub by_type: BTreeMap<String, usize>,
    pub by_scope: BTreeMap<String, usize>,
    pub by_source: BTreeMap<String, usize>,
}

impl EventLog {
    pub fn stats(&self) -> Result<MemoryStats, LogError> {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> Result<MemoryStats, LogError> {
        let mut stats = MemoryStats::default();
        let mut events = Vec::new();
        let mut dead = HashSet::new();

        for (index, path) in self.files().into_iter().enumerate() {
            let mut in_file = 0;
            for record in read_records(path)? {
                match record {
                    LogRecord::Event(event) => {
                        in_file += 1;
                        events.push(event);
                    }
                    LogRecord::Tombstone(t) => {
                        dead.insert(t.target_id);
                    }
                }
            }
            // `files()` lists the global log first.
            if index == 0 {
                stats.global_events = in_file;
            } else {
                stats.project_events += in_file;
            }
        }

        stats.total_events = events.len();
        let mut sessions = HashSet::new();
        for event in events.iter().filter(|e| !dead.contains(&e.id)) {
            stats.live_events += 1;
            if event.is_expired(now) {
                stats.expired_pending += 1;
            }
            if let Some(session) = &event.session_id {
                sessions.insert(session.as_str());
            }
            *stats.by_type.entry(event.memory_type.to_string()).or_default() += 1;
            *stats.by_scope.entry(event.scope.to_string()).or_default() += 1;
            *stats.by_source.entry(event.source.to_string()).or_default() += 1;
        }
        stats.tombstoned = stats.total_events - stats.live_events;
        stats.sessions = sessions.len();
        Ok(stats)
    }
}
