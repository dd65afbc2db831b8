use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::event::LogRecord;
use super::log::{EventLog, append_record, read_records, tombstone_for};
use crate::error::{LogError, WardenError};
use crate::state::{StateStore, stable_key, update_json};

const EXPIRED_REASON: &str = "ttl expired";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub examined: usize,
    pub tombstoned: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SweepState {
    last_run_at: Option<DateTime<Utc>>,
    last_report: SweepReport,
}

/// Append a tombstone for every expired event that does not have one yet.
/// Running it twice in a row writes nothing the second time.
pub fn sweep(log: &EventLog, now: DateTime<Utc>) -> Result<SweepReport, LogError> {
    let mut report = SweepReport::default();
    for path in log.files() {
        let records = read_records(path)?;
        let buried: HashSet<&str> = records
            .iter()
            .filter_map(|r| match r {
                LogRecord::Tombstone(t) => Some(t.target_id.as_str()),
                LogRecord::Event(_) => None,
            })
            .collect();
        for record in &records {
            let LogRecord::Event(event) = record else {
                continue;
            };
            report.examined += 1;
            if event.is_expired(now) && !buried.contains(event.id.as_str()) {
                append_record(path, &tombstone_for(&event.id, EXPIRED_REASON, now))?;
                report.tombstoned += 1;
            }
        }
    }
    Ok(report)
}

/// Sweep when `interval` has passed since the last run, or when forced.
/// The run is claimed in the state store first so concurrent callers do not
/// both sweep. Returns `None` when not due.
pub fn run_if_due(
    log: &EventLog,
    store: &dyn StateStore,
    interval: Duration,
    now: DateTime<Utc>,
    force: bool,
) -> Result<Option<SweepReport>, WardenError> {
    let files: Vec<String> = log
        .files()
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    let parts: Vec<&str> = files.iter().map(String::as_str).collect();
    let key = stable_key("memory-sweep", &parts);

    let claimed = update_json(store, &key, |state: &mut SweepState| {
        let due = force || state.last_run_at.is_none_or(|last| now - last >= interval);
        if due {
            state.last_run_at = Some(now);
        }
        due
    })?;
    if !claimed.value {
        return Ok(None);
    }

    let report = sweep(log, now)?;
    update_json(store, &key, |state: &mut SweepState| {
        state.last_report = report;
    })?;

    if report.tombstoned > 0 {
        tracing::info!(
            examined = report.examined,
            tombstoned = report.tombstoned,
            "memory sweep complete"
        );
    }
    Ok(Some(report))
}
