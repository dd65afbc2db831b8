//! Importance scoring applied at write time.
//!
//! `importance = 0.4 × base + 0.6 × signals`, where `base` is fixed per
//! [`MemoryType`] and `signals` blends six write-time factors. Every factor
//! except the type-specific `cost_saved` is computed from the draft alone,
//! so two drafts that differ only in type always score differently.

use super::event::{EventDraft, MemoryScope, MemorySource, MemoryType};

const BASE_WEIGHT: f64 = 0.4;
const SIGNAL_WEIGHT: f64 = 0.6;

const OUTCOME: f64 = 0.25;
const REUSE: f64 = 0.20;
const CROSS_ACTOR: f64 = 0.20;
const NOVELTY: f64 = 0.15;
const HUMAN: f64 = 0.15;
const COST: f64 = 0.05;

pub const fn base_weight(memory_type: MemoryType) -> f64 {
    match memory_type {
        MemoryType::Preference => 0.90,
        MemoryType::Decision => 0.85,
        MemoryType::Workflow => 0.80,
        MemoryType::Research => 0.75,
        MemoryType::Error => 0.70,
        MemoryType::Observation => 0.50,
    }
}

/// Resource cost a future reader saves by finding this record.
const fn cost_saved(memory_type: MemoryType) -> f64 {
    match memory_type {
        MemoryType::Error => 0.9,
        MemoryType::Research => 0.7,
        MemoryType::Decision => 0.6,
        MemoryType::Preference | MemoryType::Workflow | MemoryType::Observation => 0.4,
    }
}

/// Type-independent signals, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringContext {
    pub outcome_impact: f64,
    pub reuse_likelihood: f64,
    pub cross_actor: f64,
    pub novelty: f64,
    pub human_signal: f64,
}

impl ScoringContext {
    pub fn from_draft(draft: &EventDraft) -> Self {
        #[allow(clippy::cast_precision_loss)]
        let tag_count = draft.tags.len().min(6) as f64;
        Self {
            outcome_impact: draft.outcome_impact,
            reuse_likelihood: 0.3 + 0.1 * tag_count,
            cross_actor: match draft.scope {
                MemoryScope::Session => 0.2,
                MemoryScope::User => 0.6,
                MemoryScope::Shared => 0.8,
            },
            novelty: draft.novelty,
            human_signal: if draft.source == MemorySource::User {
                1.0
            } else {
                0.0
            },
        }
    }
}

pub fn importance_score(memory_type: MemoryType, ctx: &ScoringContext) -> f64 {
    let signals = OUTCOME * ctx.outcome_impact.clamp(0.0, 1.0)
        + REUSE * ctx.reuse_likelihood.clamp(0.0, 1.0)
        + CROSS_ACTOR * ctx.cross_actor.clamp(0.0, 1.0)
        + NOVELTY * ctx.novelty.clamp(0.0, 1.0)
        + HUMAN * ctx.human_signal.clamp(0.0, 1.0)
        + COST * cost_saved(memory_type);
    (BASE_WEIGHT * base_weight(memory_type) + SIGNAL_WEIGHT * signals).clamp(0.0, 1.0)
}
