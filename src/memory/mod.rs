//! Durable, append-only event log with scoped retrieval.

pub mod budget;
pub mod event;
pub mod log;
pub mod promote;
pub mod recall;
pub mod redact;
pub mod scoring;
pub mod search;
pub mod stats;
pub mod sweep;

pub use budget::{TokenBudget, estimate_tokens};
pub use event::{
    EventDraft, LogRecord, MemoryEvent, MemoryScope, MemorySource, MemoryType, Tombstone,
};
pub use log::{EventLog, LOG_FILE};
pub use promote::{PromotionReport, PromotionRule, UsageStats, promote};
pub use recall::{format_recall, recall};
pub use redact::{redact, redact_value};
pub use scoring::{ScoringContext, importance_score};
pub use search::{Hit, SearchScope};
pub use stats::MemoryStats;
pub use sweep::{SweepReport, run_if_due, sweep};
