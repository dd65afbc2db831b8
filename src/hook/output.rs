use serde::Serialize;

use crate::decision::{Decision, Verdict};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    pub hook_event_name: String,
    pub permission_decision: Verdict,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_decision_reason: Option<String>,
}

/// The single JSON document written to stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookResponse {
    pub hook_specific_output: HookSpecificOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
}

impl HookResponse {
    pub fn from_decision(hook_event_name: &str, decision: &Decision) -> Self {
        let reason = match (decision.verdict(), decision.reason(), decision.rule_id()) {
            (_, Some(reason), Some(rule)) => Some(format!("{reason} [{rule}]")),
            (_, Some(reason), None) => Some(reason.to_string()),
            (Verdict::Allow, None, _) => None,
            // Decision constructors always attach one; keep the output honest anyway.
            (verdict, None, _) => Some(format!("{verdict} without a recorded reason")),
        };
        Self {
            hook_specific_output: HookSpecificOutput {
                hook_event_name: hook_event_name.to_string(),
                permission_decision: decision.verdict(),
                permission_decision_reason: reason,
            },
            system_message: decision.advisory().map(str::to_string),
        }
    }

    /// Add context for the agent after any advisory already present.
    #[must_use]
    pub fn with_context(mut self, context: &str) -> Self {
        self.system_message = Some(match self.system_message.take() {
            Some(advisory) => format!("{advisory}\n\n{context}"),
            None => context.to_string(),
        });
        self
    }

    pub fn verdict(&self) -> Verdict {
        self.hook_specific_output.permission_decision
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            r#"{"hookSpecificOutput":{"hookEventName":"PreToolUse","permissionDecision":"ask","permissionDecisionReason":"response encoding failed"}}"#
                .to_string()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DecisionSource;
    use serde_json::Value;

    #[test]
    fn deny_carries_reason_and_rule() {
        let decision = Decision::deny(DecisionSource::Classifier, Some("rm-root".into()), "deletes /");
        let json: Value = serde_json::from_str(&HookResponse::from_decision("PreToolUse", &decision).to_json()).unwrap();
        assert_eq!(json["hookSpecificOutput"]["permissionDecision"], "deny");
        assert_eq!(json["hookSpecificOutput"]["permissionDecisionReason"], "deletes / [rm-root]");
        assert!(json.get("systemMessage").is_none());
    }

    #[test]
    fn advisory_becomes_system_message() {
        let decision = Decision::allow(DecisionSource::Classifier, Some("git-read".into()))
            .with_advisory("delegate soon");
        let response = HookResponse::from_decision("PreToolUse", &decision);
        assert_eq!(response.system_message.as_deref(), Some("delegate soon"));
        assert_eq!(response.hook_specific_output.permission_decision_reason, None);
        assert!(response.to_json().contains(r#""permissionDecision":"allow""#));
    }

    #[test]
    fn context_follows_the_advisory() {
        let decision = Decision::allow(DecisionSource::Classifier, Some("git-read".into()))
            .with_advisory("delegate soon");
        let response = HookResponse::from_decision("PreToolUse", &decision)
            .with_context("Related memories:\n1. [error] x");
        assert_eq!(
            response.system_message.as_deref(),
            Some("delegate soon\n\nRelated memories:\n1. [error] x")
        );
        let plain = HookResponse::from_decision(
            "PreToolUse",
            &Decision::allow(DecisionSource::Classifier, None),
        )
        .with_context("ctx");
        assert_eq!(plain.system_message.as_deref(), Some("ctx"));
    }
}
