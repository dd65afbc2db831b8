use std::sync::Arc;
use std::time::Duration;

use crate::error::StateError;
use crate::state::StateStore;

/// Outcome of a non-blocking acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    Acquired,
    /// A stale marker was cleared and then acquired.
    Reclaimed,
    /// A live holder exists. Not an error; the caller answers with its
    /// safe default.
    Contended,
}

impl Acquire {
    pub fn is_held(self) -> bool {
        !matches!(self, Self::Contended)
    }
}

/// Per-topic mutual exclusion across processes.
///
/// Each guard carries its own owner id. It only ever releases markers
/// stamped with that id, so a holder whose marker was reclaimed as stale
/// cannot free the new holder's topic.
#[derive(Clone)]
pub struct ReentrancyGuard {
    store: Arc<dyn StateStore>,
    owner: String,
}

impl ReentrancyGuard {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            owner: uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// `true` when the caller now holds `topic`. Never waits.
    pub fn acquire(&self, topic: &str, timeout: Duration) -> bool {
        self.try_acquire(topic, timeout, now_ms())
            .unwrap_or_else(|error| {
                tracing::warn!(topic, %error, "lock marker unusable, treating as contended");
                Acquire::Contended
            })
            .is_held()
    }

    pub fn release(&self, topic: &str) {
        match self.store.remove_marker(topic, Some(&self.owner)) {
            Ok(true) => {}
            Ok(false) => tracing::debug!(topic, "lock marker no longer ours, left in place"),
            Err(error) => tracing::warn!(topic, %error, "failed to release lock marker"),
        }
    }

    /// Acquire and hand back a token that releases on drop.
    pub fn enter(&self, topic: &str, timeout: Duration) -> Option<GuardToken> {
        self.acquire(topic, timeout).then(|| GuardToken {
            guard: self.clone(),
            topic: topic.to_string(),
        })
    }

    /// One creation attempt, plus at most one more after clearing a stale
    /// marker. No retry loop.
    pub fn try_acquire(
        &self,
        topic: &str,
        timeout: Duration,
        now_ms: i64,
    ) -> Result<Acquire, StateError> {
        if self.store.create_marker(topic, now_ms, &self.owner)? {
            return Ok(Acquire::Acquired);
        }

        // Released between our attempt and the stamp read counts as
        // contended too; the caller does not retry.
        let Some(stamp) = self.store.marker_stamp(topic)? else {
            return Ok(Acquire::Contended);
        };
        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        if now_ms.saturating_sub(stamp.stamp_ms) <= timeout_ms {
            return Ok(Acquire::Contended);
        }

        tracing::info!(topic, owner = ?stamp.owner, "clearing stale lock marker");
        // Only the marker we judged stale may go; a racer that already
        // reclaimed it leaves a different owner behind.
        if !self.store.remove_marker(topic, stamp.owner.as_deref())? {
            return Ok(Acquire::Contended);
        }
        if self.store.create_marker(topic, now_ms, &self.owner)? {
            Ok(Acquire::Reclaimed)
        } else {
            Ok(Acquire::Contended)
        }
    }
}

/// Releases its topic when dropped.
pub struct GuardToken {
    guard: ReentrancyGuard,
    topic: String,
}

impl GuardToken {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Drop for GuardToken {
    fn drop(&mut self) {
        self.guard.release(&self.topic);
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
