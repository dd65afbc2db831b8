//! Related memories handed to the agent before a tool runs.

use chrono::{DateTime, Utc};

use super::budget::{TokenBudget, select_within_budget};
use super::event::{MemoryEvent, MemorySource};
use super::log::EventLog;
use super::redact::truncate_chars;
use crate::error::LogError;

const MAX_LINE_CHARS: usize = 150;

/// The arbiter's own bookkeeping (decisions, oracle consultations) would
/// only echo the current request back.
fn is_recallable(event: &MemoryEvent) -> bool {
    !matches!(event.source, MemorySource::Arbiter | MemorySource::Judge)
}

/// Best related events within `budget`, at most `limit`. An empty query
/// recalls nothing.
pub fn recall(
    log: &EventLog,
    query: &str,
    session_id: Option<&str>,
    budget: &TokenBudget,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<Vec<MemoryEvent>, LogError> {
    if query.trim().is_empty() || limit == 0 {
        return Ok(Vec::new());
    }
    let mut candidates = log.live_events()?;
    candidates.retain(is_recallable);
    let mut found = select_within_budget(&candidates, query, session_id, None, budget, now);
    found.truncate(limit);
    Ok(found)
}

/// Numbered digest suitable for a system message.
pub fn format_recall(events: &[MemoryEvent]) -> Option<String> {
    if events.is_empty() {
        return None;
    }
    let mut lines = vec!["Related memories:".to_string()];
    for (n, event) in events.iter().enumerate() {
        let content = event.content.replace('\n', " ");
        lines.push(format!(
            "{}. [{}] {}",
            n + 1,
            event.memory_type,
            truncate_chars(&content, MAX_LINE_CHARS)
        ));
    }
    Some(lines.join("\n"))
}
