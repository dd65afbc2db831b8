use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MemoryType {
    Observation,
    Decision,
    Preference,
    Workflow,
    Error,
    Research,
}

impl MemoryType {
    pub const ALL: [Self; 6] = [
        Self::Observation,
        Self::Decision,
        Self::Preference,
        Self::Workflow,
        Self::Error,
        Self::Research,
    ];

    /// Scope used when the writer does not pick one.
    pub const fn default_scope(self) -> MemoryScope {
        match self {
            Self::Observation | Self::Error | Self::Research => MemoryScope::Session,
            Self::Decision | Self::Workflow => MemoryScope::Shared,
            Self::Preference => MemoryScope::User,
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum MemoryScope {
    /// Visible only to the session that wrote it.
    Session,
    /// Follows the user across projects.
    User,
    /// Visible to every session of the project.
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MemorySource {
    Host,
    Arbiter,
    Judge,
    Enforcer,
    Recorder,
    User,
}

/// One durable record. Never mutated after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEvent {
    pub id: String,
    pub content: String,
    pub memory_type: MemoryType,
    pub scope: MemoryScope,
    pub source: MemorySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub importance_score: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_days: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl MemoryEvent {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.ttl_days
            .map(|days| self.created_at + Duration::days(i64::from(days)))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|at| at <= now)
    }
}

/// Marks an earlier event as excluded from retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tombstone {
    pub id: String,
    pub target_id: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// One line of the log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum LogRecord {
    Event(MemoryEvent),
    Tombstone(Tombstone),
}

/// What a writer hands to [`EventLog::append`](super::EventLog::append).
/// Identity, timestamp, redaction and scoring are filled in by the log.
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub content: String,
    pub memory_type: MemoryType,
    pub scope: MemoryScope,
    pub source: MemorySource,
    pub session_id: Option<String>,
    pub ttl_days: Option<u32>,
    pub tags: Vec<String>,
    pub metadata: Map<String, Value>,
    pub outcome_impact: f64,
    pub novelty: f64,
}

impl EventDraft {
    pub fn new(memory_type: MemoryType, source: MemorySource, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            memory_type,
            scope: memory_type.default_scope(),
            source,
            session_id: None,
            ttl_days: None,
            tags: Vec::new(),
            metadata: Map::new(),
            outcome_impact: 0.5,
            novelty: 0.5,
        }
    }

    pub fn with_scope(mut self, scope: MemoryScope) -> Self {
        self.scope = scope;
        self
    }

    /// Attach the session. Without one, a session-scoped draft is widened
    /// to `shared` so it can still be written.
    pub fn for_session(mut self, session_id: Option<String>) -> Self {
        if session_id.is_none() && self.scope == MemoryScope::Session {
            self.scope = MemoryScope::Shared;
        }
        self.session_id = session_id;
        self
    }

    pub fn with_ttl_days(mut self, ttl_days: Option<u32>) -> Self {
        self.ttl_days = ttl_days;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_outcome_impact(mut self, impact: f64) -> Self {
        self.outcome_impact = impact.clamp(0.0, 1.0);
        self
    }

    pub fn with_novelty(mut self, novelty: f64) -> Self {
        self.novelty = novelty.clamp(0.0, 1.0);
        self
    }
}
