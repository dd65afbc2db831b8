use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::event::{MemoryEvent, MemoryScope, MemoryType};

const TEXT_WEIGHT: f64 = 0.5;
const IMPORTANCE_WEIGHT: f64 = 0.3;
const RECENCY_WEIGHT: f64 = 0.2;
const KEYWORD_SHARE: f64 = 0.7;
const TRIGRAM_SHARE: f64 = 0.3;
const RECENCY_HALF_LIFE_DAYS: f64 = 7.0;

/// Who is asking. Session-scoped records only ever reach their own session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchScope {
    Session(String),
    User,
    Shared,
    /// Everything the caller may see: its own session (if any), plus user
    /// and shared records.
    Visible { session_id: Option<String> },
}

impl SearchScope {
    pub fn admits(&self, event: &MemoryEvent) -> bool {
        match (self, event.scope) {
            (Self::Session(id), MemoryScope::Session) => event.session_id.as_deref() == Some(id),
            (Self::User, MemoryScope::User) | (Self::Shared, MemoryScope::Shared) => true,
            (Self::Visible { session_id }, MemoryScope::Session) => {
                session_id.is_some() && event.session_id == *session_id
            }
            (Self::Visible { .. }, MemoryScope::User | MemoryScope::Shared) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Hit {
    pub event: MemoryEvent,
    pub score: f64,
}

fn keywords(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}

fn trigrams(text: &str) -> HashSet<[char; 3]> {
    let chars: Vec<char> = text.to_lowercase().chars().collect();
    chars.windows(3).map(|w| [w[0], w[1], w[2]]).collect()
}

#[allow(clippy::cast_precision_loss)]
fn jaccard<T: Eq + std::hash::Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Textual match strength in `[0, 1]`.
#[allow(clippy::cast_precision_loss)]
pub fn text_score(query: &str, event: &MemoryEvent) -> f64 {
    let wanted = keywords(query);
    if wanted.is_empty() {
        return 0.0;
    }
    let mut haystack = keywords(&event.content);
    for tag in &event.tags {
        haystack.extend(keywords(tag));
    }
    let coverage = wanted.iter().filter(|w| haystack.contains(*w)).count() as f64
        / wanted.len() as f64;
    let similarity = jaccard(&trigrams(query), &trigrams(&event.content));
    KEYWORD_SHARE * coverage + TRIGRAM_SHARE * similarity
}

/// Halves every seven days; future timestamps count as fresh.
#[allow(clippy::cast_precision_loss)]
pub fn recency_score(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let age_days = (now - created_at).num_seconds().max(0) as f64 / 86_400.0;
    0.5_f64.powf(age_days / RECENCY_HALF_LIFE_DAYS)
}

/// Filter by scope and kind, drop non-matching records for a non-empty
/// query, then order by blended score. Ties keep input order.
pub fn rank(
    events: impl IntoIterator<Item = MemoryEvent>,
    query: &str,
    scope: &SearchScope,
    kind: Option<MemoryType>,
    limit: usize,
    now: DateTime<Utc>,
) -> Vec<Hit> {
    let has_query = !keywords(query).is_empty();
    let mut hits: Vec<Hit> = events
        .into_iter()
        .filter(|e| scope.admits(e))
        .filter(|e| kind.is_none_or(|k| e.memory_type == k))
        .filter_map(|event| {
            let text = text_score(query, &event);
            if has_query && text <= 0.0 {
                return None;
            }
            let score = TEXT_WEIGHT * text
                + IMPORTANCE_WEIGHT * event.importance_score.clamp(0.0, 1.0)
                + RECENCY_WEIGHT * recency_score(event.created_at, now);
            Some(Hit { event, score })
        })
        .collect();

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    hits.truncate(limit);
    hits
}
