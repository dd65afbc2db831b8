//! Retrieval bounded by a token budget split across scopes.
//!
//! Each scope fills its own share of the budget with its best-ranked
//! events, so a busy session cannot crowd project or user knowledge out of
//! the result.

use chrono::{DateTime, Utc};

use super::event::{MemoryEvent, MemoryScope, MemoryType};
use super::log::EventLog;
use super::search::{SearchScope, rank};
use crate::config::ScopeWeights;
use crate::error::LogError;

/// Fixed per-event cost: id, type, scope and framing.
const EVENT_OVERHEAD_TOKENS: usize = 12;
const CHARS_PER_TOKEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenBudget {
    pub total_tokens: usize,
    pub weights: ScopeWeights,
}

impl TokenBudget {
    pub fn new(total_tokens: usize, weights: ScopeWeights) -> Self {
        Self {
            total_tokens,
            weights,
        }
    }

    /// Tokens `scope` may spend. Weights are normalized, so they need not
    /// sum to one.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn allocation(&self, scope: MemoryScope) -> usize {
        let w = &self.weights;
        let sum = w.session + w.shared + w.user;
        if sum <= 0.0 {
            return 0;
        }
        let weight = match scope {
            MemoryScope::Session => w.session,
            MemoryScope::Shared => w.shared,
            MemoryScope::User => w.user,
        };
        (self.total_tokens as f64 * weight / sum).floor() as usize
    }
}

/// Rough size of an event once rendered for an agent.
pub fn estimate_tokens(event: &MemoryEvent) -> usize {
    let chars = event.content.chars().count()
        + event.tags.iter().map(|t| t.chars().count() + 1).sum::<usize>();
    chars.div_ceil(CHARS_PER_TOKEN) + EVENT_OVERHEAD_TOKENS
}

/// Fill each scope's share in rank order, skipping events that would
/// overflow it, then order the union by importance.
pub fn select_within_budget(
    events: &[MemoryEvent],
    query: &str,
    session_id: Option<&str>,
    kind: Option<MemoryType>,
    budget: &TokenBudget,
    now: DateTime<Utc>,
) -> Vec<MemoryEvent> {
    let mut scopes = Vec::with_capacity(3);
    if let Some(id) = session_id {
        scopes.push((MemoryScope::Session, SearchScope::Session(id.to_string())));
    }
    scopes.push((MemoryScope::Shared, SearchScope::Shared));
    scopes.push((MemoryScope::User, SearchScope::User));

    let mut selected: Vec<MemoryEvent> = Vec::new();
    for (scope, filter) in scopes {
        let allowance = budget.allocation(scope);
        let mut spent = 0;
        for hit in rank(events.iter().cloned(), query, &filter, kind, usize::MAX, now) {
            let cost = estimate_tokens(&hit.event);
            if spent + cost > allowance {
                continue;
            }
            spent += cost;
            if !selected.iter().any(|e| e.id == hit.event.id) {
                selected.push(hit.event);
            }
        }
        tracing::trace!(%scope, allowance, spent, "scope budget filled");
    }

    selected.sort_by(|a, b| b.importance_score.total_cmp(&a.importance_score));
    selected
}

impl EventLog {
    pub fn search_with_budget(
        &self,
        query: &str,
        session_id: Option<&str>,
        kind: Option<MemoryType>,
        budget: &TokenBudget,
    ) -> Result<Vec<MemoryEvent>, LogError> {
        self.search_with_budget_at(query, session_id, kind, budget, Utc::now())
    }

    pub fn search_with_budget_at(
        &self,
        query: &str,
        session_id: Option<&str>,
        kind: Option<MemoryType>,
        budget: &TokenBudget,
        now: DateTime<Utc>,
    ) -> Result<Vec<MemoryEvent>, LogError> {
        let live = self.live_events()?;
        Ok(select_within_budget(&live, query, session_id, kind, budget, now))
    }
}
