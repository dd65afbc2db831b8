use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;

use super::event::{EventDraft, LogRecord, MemoryEvent, MemoryScope, MemoryType, Tombstone};
use super::redact::{redact, redact_value};
use super::scoring::{ScoringContext, importance_score};
use super::search::{SearchScope, rank};
use crate::config::Config;
use crate::error::LogError;

pub const LOG_FILE: &str = "events.jsonl";

/// Append-only JSON-lines event log.
///
/// `user`-scoped events go to the global log; `session` and `shared` events
/// go to the project log when one is attached, else to the global log.
#[derive(Debug, Clone)]
pub struct EventLog {
    global: PathBuf,
    project: Option<PathBuf>,
}

impl EventLog {
    pub fn new(global_dir: &Path, project_dir: Option<&Path>) -> Self {
        Self {
            global: global_dir.join(LOG_FILE),
            project: project_dir.map(|dir| dir.join(LOG_FILE)),
        }
    }

    pub fn from_config(config: &Config, project: Option<&Path>) -> Self {
        let project_dir = project.map(|p| config.project_memory_dir(p));
        Self::new(&config.global_memory_dir(), project_dir.as_deref())
    }

    pub fn path_for(&self, scope: MemoryScope) -> &Path {
        match (scope, &self.project) {
            (MemoryScope::Session | MemoryScope::Shared, Some(project)) => project,
            _ => &self.global,
        }
    }

    /// Every backing file, global first.
    pub fn files(&self) -> Vec<&Path> {
        let mut files = vec![self.global.as_path()];
        if let Some(project) = &self.project {
            files.push(project);
        }
        files
    }

    pub fn append(&self, draft: EventDraft) -> Result<MemoryEvent, LogError> {
        self.append_at(draft, Utc::now())
    }

    /// Redact, score and persist one event. Returns the stored form.
    pub fn append_at(
        &self,
        draft: EventDraft,
        now: DateTime<Utc>,
    ) -> Result<MemoryEvent, LogError> {
        if draft.scope == MemoryScope::Session && draft.session_id.is_none() {
            return Err(LogError::MissingSession);
        }
        let importance = importance_score(draft.memory_type, &ScoringContext::from_draft(&draft));

        let mut metadata = serde_json::Value::Object(draft.metadata);
        redact_value(&mut metadata);
        let metadata = match metadata {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };

        let event = MemoryEvent {
            id: uuid::Uuid::now_v7().to_string(),
            content: redact(&draft.content).into_owned(),
            memory_type: draft.memory_type,
            scope: draft.scope,
            source: draft.source,
            session_id: draft.session_id,
            importance_score: importance,
            created_at: now,
            ttl_days: draft.ttl_days,
            tags: draft.tags.iter().map(|t| redact(t).into_owned()).collect(),
            metadata,
        };

        let path = self.path_for(event.scope);
        append_record(path, &LogRecord::Event(event.clone()))?;
        tracing::debug!(
            id = %event.id,
            memory_type = %event.memory_type,
            path = %path.display(),
            "event appended"
        );
        Ok(event)
    }

    /// Persist an already-built event verbatim, e.g. a promoted copy.
    pub(super) fn append_event(&self, event: &MemoryEvent) -> Result<(), LogError> {
        append_record(self.path_for(event.scope), &LogRecord::Event(event.clone()))
    }

    /// Exclude `event` from retrieval by appending a tombstone next to it.
    pub(super) fn bury(
        &self,
        event: &MemoryEvent,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), LogError> {
        append_record(self.path_for(event.scope), &tombstone_for(&event.id, reason, now))
    }

    /// Every event across both files, in file order, tombstoned ones included.
    pub fn read_all(&self) -> Result<Vec<MemoryEvent>, LogError> {
        let mut events = Vec::new();
        for path in self.files() {
            events.extend(read_records(path)?.into_iter().filter_map(|r| match r {
                LogRecord::Event(e) => Some(e),
                LogRecord::Tombstone(_) => None,
            }));
        }
        Ok(events)
    }

    /// Events still eligible for retrieval.
    pub fn live_events(&self) -> Result<Vec<MemoryEvent>, LogError> {
        let mut events = Vec::new();
        let mut dead = HashSet::new();
        for path in self.files() {
            for record in read_records(path)? {
                match record {
                    LogRecord::Event(e) => events.push(e),
                    LogRecord::Tombstone(t) => {
                        dead.insert(t.target_id);
                    }
                }
            }
        }
        events.retain(|e| !dead.contains(&e.id));
        Ok(events)
    }

    pub fn search(
        &self,
        query: &str,
        scope: &SearchScope,
        kind: Option<MemoryType>,
        limit: usize,
    ) -> Result<Vec<MemoryEvent>, LogError> {
        self.search_at(query, scope, kind, limit, Utc::now())
    }

    pub fn search_at(
        &self,
        query: &str,
        scope: &SearchScope,
        kind: Option<MemoryType>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<MemoryEvent>, LogError> {
        let hits = rank(self.live_events()?, query, scope, kind, limit, now);
        Ok(hits.into_iter().map(|hit| hit.event).collect())
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut options = OpenOptions::new();
    options.create(true).read(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

/// `true` when the file is non-empty and its last byte is not a newline,
/// which means an earlier writer died mid-record.
fn has_torn_tail(file: &mut File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// One record, one `write` call, under an exclusive lock held only for the
/// write itself.
pub(super) fn append_record(path: &Path, record: &LogRecord) -> Result<(), LogError> {
    let write_err = |source| LogError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');

    let mut file = open_append(path).map_err(write_err)?;
    file.lock_exclusive().map_err(write_err)?;
    let result = (|| {
        let mut buf = Vec::with_capacity(line.len() + 1);
        if has_torn_tail(&mut file)? {
            buf.push(b'\n');
        }
        buf.extend_from_slice(&line);
        file.write_all(&buf)?;
        file.flush()
    })();
    let unlocked = FileExt::unlock(&file);
    result.map_err(write_err)?;
    unlocked.map_err(write_err)
}

/// Parse every intact line. Garbled or truncated lines are skipped.
pub(super) fn read_records(path: &Path) -> Result<Vec<LogRecord>, LogError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(LogError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut records = Vec::new();
    for (index, line) in bytes.split(|b| *b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice::<LogRecord>(line) {
            Ok(record) => records.push(record),
            Err(error) => tracing::warn!(
                path = %path.display(),
                line = index + 1,
                %error,
                "skipping unreadable log record"
            ),
        }
    }
    Ok(records)
}

pub(super) fn tombstone_for(target_id: &str, reason: &str, now: DateTime<Utc>) -> LogRecord {
    LogRecord::Tombstone(Tombstone {
        id: uuid::Uuid::now_v7().to_string(),
        target_id: target_id.to_string(),
        reason: reason.to_string(),
        created_at: now,
    })
}
