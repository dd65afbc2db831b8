pub mod catalog;
pub mod glob;
pub mod rules;
pub mod secrets;

use serde::{Deserialize, Serialize};

pub use catalog::builtin_rules;
pub use rules::{CommandPattern, Rule, RuleVerdict};
pub use secrets::{SECRET_RULE_ID, SecretPaths};

use crate::action::{ActionRequest, ActionTarget};
use crate::config::ClassifierConfig;
use crate::decision::{Decision, DecisionSource};

pub const OBFUSCATION_RULE_ID: &str = "obfuscated-command";

/// What to do with a command carrying substitution or interpreter idioms
/// that no deny rule caught.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObfuscationPolicy {
    #[default]
    Deny,
    Escalate,
}

/// Deterministic allow/deny matching.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    deny: Vec<Rule>,
    allow: Vec<Rule>,
    secrets: SecretPaths,
    obfuscation: ObfuscationPolicy,
}

impl RuleClassifier {
    /// Rules keep their declaration order within each verdict class.
    pub fn new(rules: Vec<Rule>, secrets: SecretPaths, obfuscation: ObfuscationPolicy) -> Self {
        let (deny, allow) = rules
            .into_iter()
            .partition(|r| r.verdict == RuleVerdict::Deny);
        Self {
            deny,
            allow,
            secrets,
            obfuscation,
        }
    }

    pub fn from_config(config: &ClassifierConfig) -> Self {
        let mut rules = config.rules.clone();
        if config.builtin_rules {
            rules.extend(builtin_rules());
        }
        Self::new(
            rules,
            SecretPaths::new(config.secret_paths.clone(), config.secret_exceptions.clone()),
            config.obfuscation,
        )
    }

    /// `Some` when a rule decides the request, `None` to escalate.
    pub fn classify(&self, request: &ActionRequest) -> Option<Decision> {
        if !request.target.is_matchable() {
            tracing::debug!(tool = %request.tool, "target not matchable, escalating");
            return None;
        }

        if let Some(found) = self
            .secrets
            .check_target(&request.target, &request.project_dir)
        {
            tracing::debug!(path = %found.path, pattern = %found.pattern, "secret path denied");
            return Some(Decision::deny(
                DecisionSource::Classifier,
                Some(SECRET_RULE_ID.into()),
                format!(
                    "{} matches secret-bearing pattern {}",
                    found.path, found.pattern
                ),
            ));
        }

        if let Some(rule) = self.deny.iter().find(|r| r.matches_any(request)) {
            tracing::debug!(rule_id = %rule.id, "deny rule matched");
            return Some(Decision::deny(
                DecisionSource::Classifier,
                Some(rule.id.clone()),
                rule.describe(),
            ));
        }

        if let ActionTarget::Command { command } = &request.target {
            if command.has_indicators() {
                let found = command
                    .indicators
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                return match self.obfuscation {
                    ObfuscationPolicy::Deny => Some(Decision::deny(
                        DecisionSource::Classifier,
                        Some(OBFUSCATION_RULE_ID.into()),
                        format!("command uses {found}; prefix rules cannot vouch for it"),
                    )),
                    ObfuscationPolicy::Escalate => {
                        tracing::debug!(indicators = %found, "obfuscated command, escalating");
                        None
                    }
                };
            }
            return self.allow_command(request, command);
        }

        self.allow
            .iter()
            .find(|r| r.covers_target(request))
            .map(|rule| {
                tracing::debug!(rule_id = %rule.id, "allow rule matched");
                Decision::allow(DecisionSource::Classifier, Some(rule.id.clone()))
            })
    }

    /// Every segment of the command line has to be covered by some allow
    /// rule; one uncovered segment sends the whole line to escalation.
    fn allow_command(
        &self,
        request: &ActionRequest,
        command: &crate::action::ParsedCommand,
    ) -> Option<Decision> {
        if command.writes_files() {
            tracing::debug!("command redirects output to a file, escalating");
            return None;
        }
        let mut matched: Vec<&str> = Vec::new();
        for argv in command.effective_segments() {
            let rule = self
                .allow
                .iter()
                .find(|r| r.covers_segment(request.action_kind, argv))?;
            if !matched.contains(&rule.id.as_str()) {
                matched.push(&rule.id);
            }
        }
        tracing::debug!(rule_id = %matched.join("+"), "allow rules cover command");
        Some(Decision::allow(
            DecisionSource::Classifier,
            Some(matched.join("+")),
        ))
    }
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self::new(
            builtin_rules(),
            SecretPaths::default(),
            ObfuscationPolicy::default(),
        )
    }
}
