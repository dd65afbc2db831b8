//! Host hook protocol: one JSON request in, one JSON response out.

pub mod input;
pub mod output;

use std::path::Path;

pub use input::{HostRequest, parse_request};
pub use output::{HookResponse, HookSpecificOutput};

use crate::action::{ActionRequest, ActorRole, ProjectLocator};
use crate::config::Config;
use crate::decision::{Decision, DecisionSource, Verdict};
use crate::memory::{
    EventDraft, EventLog, MemorySource, MemoryType, TokenBudget, format_recall, recall,
};
use crate::pipeline::{Arbiter, HookClass};

/// Evaluate one raw host payload. Never fails: unparsable input yields an
/// `ask` response. A permission hook that lets the call through also
/// carries related memories for the agent.
pub async fn evaluate_payload(
    config: &Config,
    raw: &str,
    role: ActorRole,
    fallback_cwd: &Path,
    locator: &ProjectLocator,
) -> HookResponse {
    let request = match parse_request(raw) {
        Ok(request) => request,
        Err(error) => {
            tracing::warn!(%error, "malformed hook input");
            let decision = Decision::ask(
                DecisionSource::Fallback,
                format!("hook input could not be understood: {error}"),
            );
            return HookResponse::from_decision("PreToolUse", &decision);
        }
    };
    let action = request.to_action(role, raw, fallback_cwd, locator);
    let arbiter = Arbiter::from_config(config, &action.project_dir);
    let class = request.hook_class();
    let decision = arbiter.evaluate(&action, class).await;
    let mut response = HookResponse::from_decision(request.event_name(), &decision);
    if class == HookClass::Permission
        && decision.verdict() != Verdict::Deny
        && let Some(context) = recall_context(config, &request, &action, arbiter.log())
    {
        response = response.with_context(&context);
    }
    if let Err(error) = arbiter.sweep_if_due(false) {
        tracing::warn!(%error, "memory sweep failed");
    }
    response
}

/// Related memories for a call about to run. Failures only cost the
/// context, never the decision.
fn recall_context(
    config: &Config,
    request: &HostRequest,
    action: &ActionRequest,
    log: &EventLog,
) -> Option<String> {
    if !config.memory.recall {
        return None;
    }
    let query = request.recall_query(action)?;
    let budget = TokenBudget::new(
        config.memory.recall_budget_tokens,
        config.memory.scope_weights,
    );
    match recall(
        log,
        &query,
        action.session_id.as_deref(),
        &budget,
        config.memory.recall_limit,
        chrono::Utc::now(),
    ) {
        Ok(events) => {
            tracing::debug!(query, recalled = events.len(), "memory recall");
            format_recall(&events)
        }
        Err(error) => {
            tracing::warn!(%error, "memory recall failed");
            None
        }
    }
}

/// Post-action recorder: append what the tool did as an observation, or as
/// an error when the host reported a failure.
pub fn record_payload(
    config: &Config,
    raw: &str,
    role: ActorRole,
    fallback_cwd: &Path,
    locator: &ProjectLocator,
) -> crate::error::Result<crate::memory::MemoryEvent> {
    let request = parse_request(raw)?;
    let action = request.to_action(role, raw, fallback_cwd, locator);
    let failed = request.tool_failed();
    let memory_type = if failed {
        MemoryType::Error
    } else {
        MemoryType::Observation
    };
    let content = format!(
        "{} {} {}{}",
        action.tool,
        action.action_kind,
        action.target.summary(),
        if failed { " failed" } else { "" }
    );
    let draft = EventDraft::new(memory_type, MemorySource::Recorder, content)
        .for_session(action.session_id.clone())
        .with_tag(action.action_kind.to_string())
        .with_outcome_impact(if failed { 0.8 } else { 0.4 })
        .with_novelty(if failed { 0.7 } else { 0.3 })
        .with_metadata("actor_role", serde_json::json!(action.actor_role));
    let log = EventLog::from_config(config, Some(&action.project_dir));
    Ok(log.append(draft)?)
}
