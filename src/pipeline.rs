//! The decision pipeline: guard, enforcer, classifier, judge, override.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use strum::Display;

use crate::action::{ActionKind, ActionRequest};
use crate::config::Config;
use crate::decision::{Decision, DecisionSource, Verdict};
use crate::delegation::{DelegationEnforcer, Observation};
use crate::guard::ReentrancyGuard;
use crate::judge::EscalationJudge;
use crate::memory::redact::truncate_chars;
use crate::memory::{
    EventDraft, EventLog, MemorySource, MemoryType, PromotionReport, SweepReport,
};
use crate::policy::RuleClassifier;
use crate::state::{FsStateStore, StateStore};

const MAX_LOGGED_PAYLOAD_CHARS: usize = 4_000;

/// Which kind of host hook is asking. Decides the safe default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum HookClass {
    /// May block the action; unsure means ask.
    Permission,
    /// Must never block the caller; unsure means allow.
    Notification,
}

impl HookClass {
    pub fn from_event(hook_event_name: Option<&str>) -> Self {
        match hook_event_name {
            None | Some("PreToolUse" | "PermissionRequest") => Self::Permission,
            Some(_) => Self::Notification,
        }
    }

    pub fn safe_default(self) -> Verdict {
        match self {
            Self::Permission => Verdict::Ask,
            Self::Notification => Verdict::Allow,
        }
    }
}

/// One guard topic per (hook class, action kind).
pub fn guard_topic(class: HookClass, kind: ActionKind) -> String {
    format!("{class}-{kind}")
}

pub struct Arbiter {
    classifier: RuleClassifier,
    judge: EscalationJudge,
    enforcer: DelegationEnforcer,
    guard: ReentrancyGuard,
    log: EventLog,
    store: Arc<dyn StateStore>,
    default_verdict: Verdict,
    budget: Duration,
    stale_after: Duration,
    decision_ttl_days: Option<u32>,
    sweep_interval: chrono::Duration,
    promote_on_sweep: bool,
}

/// What one maintenance run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Maintenance {
    #[serde(flatten)]
    pub sweep: SweepReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promoted: Option<PromotionReport>,
}

impl Arbiter {
    pub fn new(config: &Config, store: Arc<dyn StateStore>, log: EventLog) -> Self {
        Self {
            classifier: RuleClassifier::from_config(&config.classifier),
            judge: EscalationJudge::from_config(&config.oracle, Arc::clone(&store))
                .with_log(log.clone()),
            enforcer: DelegationEnforcer::new(Arc::clone(&store), config.delegation.clone()),
            guard: ReentrancyGuard::new(Arc::clone(&store)),
            log,
            store,
            default_verdict: config.default_verdict,
            budget: config.budget(),
            stale_after: Duration::from_secs(config.guard.stale_after_secs),
            decision_ttl_days: config.memory.decision_ttl_days,
            sweep_interval: chrono::Duration::hours(i64::from(config.memory.sweep_interval_hours)),
            promote_on_sweep: config.memory.promote_on_sweep,
        }
    }

    /// Filesystem state under the scratch dir, logs for `project_dir`.
    pub fn from_config(config: &Config, project_dir: &Path) -> Self {
        let store: Arc<dyn StateStore> = Arc::new(FsStateStore::from_config(config));
        Self::new(config, store, EventLog::from_config(config, Some(project_dir)))
    }

    pub fn with_judge(mut self, judge: EscalationJudge) -> Self {
        self.judge = judge.with_log(self.log.clone());
        self
    }

    pub fn enforcer(&self) -> &DelegationEnforcer {
        &self.enforcer
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    /// Evaluate one request within the wall-clock budget. Always returns a
    /// decision; the budget expiring yields the hook class's safe default.
    pub async fn evaluate(&self, request: &ActionRequest, class: HookClass) -> Decision {
        let decision = match tokio::time::timeout(self.budget, self.decide(request, class)).await {
            Ok(decision) => decision,
            Err(_) => {
                tracing::warn!(budget = ?self.budget, "evaluation budget exhausted");
                Decision::fallback(
                    class.safe_default(),
                    "evaluation did not finish within its time budget",
                )
            }
        };
        tracing::info!(
            verdict = %decision.verdict(),
            source = %decision.source(),
            rule_id = decision.rule_id().unwrap_or("-"),
            kind = %request.action_kind,
            "decision"
        );
        self.record(request, &decision);
        decision
    }

    async fn decide(&self, request: &ActionRequest, class: HookClass) -> Decision {
        let topic = guard_topic(class, request.action_kind);
        let Some(_token) = self.guard.enter(&topic, self.stale_after) else {
            tracing::debug!(topic, "evaluation already in flight");
            return Decision::fallback(
                class.safe_default(),
                "another evaluation of this kind is already in flight",
            )
            .with_source(DecisionSource::Guard);
        };

        // Notifications report what already happened; only permission
        // hooks advance or enforce the delegation window.
        let observation = match class {
            HookClass::Permission => self
                .enforcer
                .observe(request, chrono::Utc::now().timestamp_millis()),
            HookClass::Notification => Observation::Untracked,
        };

        let decision = match self.classifier.classify(request) {
            Some(decision) => decision,
            // The enforcer will deny regardless; skip the oracle round trip.
            None if observation.is_block() => {
                Decision::fallback(self.default_verdict, "no rule matched")
            }
            None if self.judge.is_configured() => self.judge.judge(request).await,
            None => Decision::fallback(
                self.default_verdict,
                "no rule matched and no oracle is configured",
            ),
        };

        self.enforcer.apply(&observation, decision)
    }

    /// Append the request/decision pair. Failures are logged, never raised.
    fn record(&self, request: &ActionRequest, decision: &Decision) {
        let content = format!(
            "{} {} {}{}",
            decision.verdict(),
            request.action_kind,
            truncate_chars(&request.target.summary(), 300),
            decision
                .rule_id()
                .map(|id| format!(" ({id})"))
                .unwrap_or_default()
        );
        let outcome_impact = match decision.verdict() {
            Verdict::Deny => 0.9,
            Verdict::Ask => 0.6,
            Verdict::Allow => 0.3,
        };
        let draft = EventDraft::new(MemoryType::Decision, MemorySource::Arbiter, content)
            .for_session(request.session_id.clone())
            .with_ttl_days(self.decision_ttl_days)
            .with_tag(request.action_kind.to_string())
            .with_tag(decision.verdict().to_string())
            .with_outcome_impact(outcome_impact)
            .with_metadata(
                "request",
                json!({
                    "tool": request.tool,
                    "action_kind": request.action_kind,
                    "actor_role": request.actor_role,
                    "target": request.target,
                    "raw_payload": truncate_chars(&request.raw_payload, MAX_LOGGED_PAYLOAD_CHARS),
                }),
            )
            .with_metadata("decision", json!(decision));
        if let Err(error) = self.log.append(draft) {
            tracing::warn!(%error, "failed to record decision");
        }
    }

    /// Empty the orchestrator window by hand and record why.
    pub fn reset_delegation(
        &self,
        project_dir: &Path,
        reason: &str,
    ) -> Result<usize, crate::error::WardenError> {
        let role = crate::action::ActorRole::Orchestrator;
        let cleared = self.enforcer.reset(project_dir, role)?;
        let draft = EventDraft::new(
            MemoryType::Decision,
            MemorySource::User,
            format!("delegation window reset ({cleared} entries): {reason}"),
        )
        .with_tag("delegation")
        .with_ttl_days(self.decision_ttl_days);
        if let Err(error) = self.log.append(draft) {
            tracing::warn!(%error, "failed to record delegation reset");
        }
        Ok(cleared)
    }

    /// Best-effort TTL sweep, throttled through the state store. A sweep
    /// that runs is followed by a promotion pass when enabled.
    pub fn sweep_if_due(&self, force: bool) -> Result<Option<Maintenance>, crate::error::WardenError> {
        let Some(sweep) = crate::memory::run_if_due(
            &self.log,
            self.store.as_ref(),
            self.sweep_interval,
            chrono::Utc::now(),
            force,
        )?
        else {
            return Ok(None);
        };
        let promoted = if self.promote_on_sweep {
            self.promote()?
        } else {
            None
        };
        Ok(Some(Maintenance { sweep, promoted }))
    }

    /// Promote qualifying events to wider scopes. Returns `None` when
    /// another process is already promoting this log.
    pub fn promote(&self) -> Result<Option<PromotionReport>, crate::error::WardenError> {
        let files: Vec<String> = self
            .log
            .files()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let parts: Vec<&str> = files.iter().map(String::as_str).collect();
        let topic = crate::state::stable_key("memory-promote", &parts);
        let Some(_token) = self.guard.enter(&topic, self.stale_after) else {
            tracing::debug!(topic, "promotion already running");
            return Ok(None);
        };
        let report = crate::memory::promote(&self.log, chrono::Utc::now())?;
        if report != PromotionReport::default() {
            tracing::info!(
                session_to_shared = report.session_to_shared,
                shared_to_user = report.shared_to_user,
                "memories promoted"
            );
        }
        Ok(Some(report))
    }
}
