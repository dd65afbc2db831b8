//! Moving proven knowledge to a wider scope.
//!
//! A session event that keeps paying off becomes shared with the project; a
//! shared event that holds up across projects, or states a preference,
//! follows the user everywhere. Promotion appends a copy in the wider scope
//! and then a tombstone for the original, so history is never rewritten.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Value, json};

use super::event::{MemoryEvent, MemoryScope, MemoryType};
use super::log::EventLog;
use crate::error::LogError;

pub const PROMOTED_TAG: &str = "promoted";
/// Tags a user sets to promote an event on the next pass.
const EXPLICIT_TAGS: &[&str] = &["explicit", "important"];

const REUSE_THRESHOLD: u64 = 2;
const SUCCESS_THRESHOLD: f64 = 0.8;
const CROSS_PROJECT_THRESHOLD: u64 = 2;

/// Usage figures kept in an event's metadata by whoever tracks them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UsageStats {
    pub reuse_count: u64,
    pub success_rate: f64,
    pub cross_project_success: u64,
}

impl UsageStats {
    pub fn from_event(event: &MemoryEvent) -> Self {
        let count = |key: &str| event.metadata.get(key).and_then(Value::as_u64).unwrap_or(0);
        Self {
            reuse_count: count("reuse_count"),
            success_rate: event
                .metadata
                .get("success_rate")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            cross_project_success: count("cross_project_success"),
        }
    }
}

pub struct PromotionRule;

impl PromotionRule {
    pub fn to_shared(event: &MemoryEvent, stats: &UsageStats) -> bool {
        stats.reuse_count >= REUSE_THRESHOLD
            || stats.success_rate >= SUCCESS_THRESHOLD
            || event
                .tags
                .iter()
                .any(|tag| EXPLICIT_TAGS.contains(&tag.as_str()))
    }

    pub fn to_user(event: &MemoryEvent, stats: &UsageStats) -> bool {
        stats.cross_project_success >= CROSS_PROJECT_THRESHOLD
            || event.memory_type == MemoryType::Preference
    }

    /// Where `event` should live next, if anywhere.
    pub fn target(event: &MemoryEvent) -> Option<MemoryScope> {
        let stats = UsageStats::from_event(event);
        match event.scope {
            MemoryScope::Session if Self::to_shared(event, &stats) => Some(MemoryScope::Shared),
            MemoryScope::Shared if Self::to_user(event, &stats) => Some(MemoryScope::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PromotionReport {
    pub session_to_shared: usize,
    pub shared_to_user: usize,
}

fn promoted_copy(event: &MemoryEvent, target: MemoryScope, now: DateTime<Utc>) -> MemoryEvent {
    let mut copy = event.clone();
    copy.id = uuid::Uuid::now_v7().to_string();
    copy.scope = target;
    if let Some(session) = copy.session_id.take() {
        copy.metadata.insert("promoted_from_session".into(), json!(session));
    }
    if !copy.tags.iter().any(|t| t == PROMOTED_TAG) {
        copy.tags.push(PROMOTED_TAG.into());
    }
    copy.metadata.insert("promoted_from".into(), json!(event.id));
    copy.metadata.insert("promoted_at".into(), json!(now));
    copy
}

/// One promotion pass over the live events. Each event moves at most one
/// step per pass.
pub fn promote(log: &EventLog, now: DateTime<Utc>) -> Result<PromotionReport, LogError> {
    let mut report = PromotionReport::default();
    for event in log.live_events()? {
        let Some(target) = PromotionRule::target(&event) else {
            continue;
        };
        let copy = promoted_copy(&event, target, now);
        // Copy first: a crash in between leaves a duplicate, never a loss.
        log.append_event(&copy)?;
        log.bury(&event, &format!("promoted to {target}"), now)?;
        tracing::debug!(from = %event.id, to = %copy.id, %target, "event promoted");
        match target {
            MemoryScope::Shared => report.session_to_shared += 1,
            MemoryScope::User => report.shared_to_user += 1,
            MemoryScope::Session => {}
        }
    }
    Ok(report)
}
