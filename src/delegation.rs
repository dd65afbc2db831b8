//! Workflow-discipline limits on the orchestrator.
//!
//! Each (project, role) pair owns a window of timestamps of privileged
//! direct actions. A delegate action empties it. The window also restarts
//! once its first entry is more than `window_secs` old, so a slow trickle of
//! direct work never piles up. The window size alone picks the state.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::action::{ActionKind, ActionRequest, ActionTarget, ActorRole};
use crate::config::DelegationConfig;
use crate::decision::{Decision, DecisionSource, Verdict};
use crate::error::StateError;
use crate::policy::glob::any_match;
use crate::state::{StateStore, load_json, stable_key, update_json};

pub const DELEGATION_RULE_ID: &str = "delegation-required";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WindowState {
    Idle,
    Counting,
    Warn,
    Block,
}

/// Persisted window for one (project, role).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    /// Epoch milliseconds, oldest first.
    #[serde(default)]
    pub window: Vec<i64>,
}

impl SessionState {
    /// Empty the window once the entry that opened it has aged out.
    fn prune(&mut self, now_ms: i64, window_ms: i64) {
        if self
            .window
            .first()
            .is_some_and(|&opened| now_ms.saturating_sub(opened) > window_ms)
        {
            self.window.clear();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    /// Not tracked: subordinate, non-privileged kind, allowlisted target,
    /// or state that could not be used.
    Untracked,
    Reset { cleared: usize },
    Counted { state: WindowState, count: usize },
}

impl Observation {
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            Self::Counted {
                state: WindowState::Block,
                ..
            }
        )
    }
}

pub struct DelegationEnforcer {
    store: Arc<dyn StateStore>,
    config: DelegationConfig,
}

impl DelegationEnforcer {
    pub fn new(store: Arc<dyn StateStore>, config: DelegationConfig) -> Self {
        Self { store, config }
    }

    pub fn state_key(project_dir: &Path, role: ActorRole) -> String {
        let project = project_dir.to_string_lossy();
        let role = role.to_string();
        stable_key("delegation", &[project.as_ref(), role.as_str()])
    }

    pub fn classify(&self, count: usize) -> WindowState {
        match count {
            0 => WindowState::Idle,
            n if n >= self.config.block_at => WindowState::Block,
            n if n >= self.config.warn_at => WindowState::Warn,
            _ => WindowState::Counting,
        }
    }

    fn window_ms(&self) -> i64 {
        i64::try_from(self.config.window_secs.saturating_mul(1_000)).unwrap_or(i64::MAX)
    }

    fn is_allowlisted(&self, request: &ActionRequest) -> bool {
        let ActionTarget::Path { path } = &request.target else {
            return false;
        };
        let candidate = request
            .project_relative_path()
            .unwrap_or_else(|| path.clone());
        any_match(&self.config.allowlist, &candidate)
    }

    /// Record one request against its window. Never fails: unusable state
    /// is logged and treated as `Idle`.
    pub fn observe(&self, request: &ActionRequest, now_ms: i64) -> Observation {
        if !self.config.enabled || request.actor_role != ActorRole::Orchestrator {
            return Observation::Untracked;
        }
        let delegating = request.action_kind == ActionKind::Delegate;
        if !delegating
            && (!request.action_kind.is_direct_work() || self.is_allowlisted(request))
        {
            return Observation::Untracked;
        }

        let key = Self::state_key(&request.project_dir, request.actor_role);
        let window_ms = self.window_ms();
        let result = update_json(self.store.as_ref(), &key, |state: &mut SessionState| {
            state.prune(now_ms, window_ms);
            if delegating {
                let cleared = state.window.len();
                state.window.clear();
                Observation::Reset { cleared }
            } else {
                state.window.push(now_ms);
                let count = state.window.len();
                Observation::Counted {
                    state: self.classify(count),
                    count,
                }
            }
        });

        match result {
            Ok(updated) => {
                if updated.recovered {
                    tracing::warn!(key = %key, "delegation window was corrupted and restarted");
                }
                match &updated.value {
                    Observation::Counted { state, count } => {
                        tracing::debug!(%state, count, "delegation window advanced");
                    }
                    Observation::Reset { cleared } => {
                        tracing::debug!(cleared, "delegation window reset by delegate action");
                    }
                    Observation::Untracked => {}
                }
                updated.value
            }
            Err(error) => {
                tracing::warn!(key = %key, %error, "delegation state unavailable, treating as idle");
                Observation::Untracked
            }
        }
    }

    /// Fold the observation into a classifier/judge decision.
    pub fn apply(&self, observation: &Observation, decision: Decision) -> Decision {
        match observation {
            Observation::Counted {
                state: WindowState::Block,
                count,
            } if decision.verdict() != Verdict::Deny => Decision::deny(
                DecisionSource::Enforcer,
                Some(DELEGATION_RULE_ID.into()),
                format!(
                    "{count} direct actions in the last {} minutes without delegation; \
                     delegate this work to a subordinate",
                    self.config.window_secs / 60
                ),
            ),
            Observation::Counted {
                state: WindowState::Warn,
                count,
            } => decision.with_advisory(format!(
                "{count} direct actions without delegation; at {} further direct work is blocked \
                 until a subordinate is spawned",
                self.config.block_at
            )),
            _ => decision,
        }
    }

    /// Manually empty a window. Returns how many entries were cleared.
    pub fn reset(&self, project_dir: &Path, role: ActorRole) -> Result<usize, StateError> {
        let key = Self::state_key(project_dir, role);
        let updated = update_json(self.store.as_ref(), &key, |state: &mut SessionState| {
            let cleared = state.window.len();
            state.window.clear();
            cleared
        })?;
        Ok(updated.value)
    }

    /// Read-only view of a window after pruning.
    pub fn snapshot(&self, project_dir: &Path, role: ActorRole, now_ms: i64) -> (WindowState, usize) {
        let key = Self::state_key(project_dir, role);
        let mut state = match load_json::<SessionState>(self.store.as_ref(), &key) {
            Ok(state) => state.unwrap_or_default(),
            Err(error) => {
                tracing::warn!(key = %key, %error, "delegation state unreadable");
                SessionState::default()
            }
        };
        state.prune(now_ms, self.window_ms());
        let count = state.window.len();
        (self.classify(count), count)
    }
}
