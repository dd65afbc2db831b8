use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Verdict {
    Allow,
    Deny,
    /// Defer to a human. Terminal; never resolved automatically.
    Ask,
}

/// Which stage of the pipeline produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DecisionSource {
    Classifier,
    Judge,
    Enforcer,
    Guard,
    Fallback,
}

/// One evaluation outcome. Built through the constructors, read through the
/// accessors, never mutated after the pipeline returns it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    verdict: Verdict,
    rule_id: Option<String>,
    reason: Option<String>,
    confidence: Option<f64>,
    source: DecisionSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    advisory: Option<String>,
}

impl Decision {
    pub fn allow(source: DecisionSource, rule_id: Option<String>) -> Self {
        Self {
            verdict: Verdict::Allow,
            rule_id,
            reason: None,
            confidence: None,
            source,
            advisory: None,
        }
    }

    pub fn deny(source: DecisionSource, rule_id: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Deny,
            rule_id,
            reason: Some(reason.into()),
            confidence: None,
            source,
            advisory: None,
        }
    }

    pub fn ask(source: DecisionSource, reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Ask,
            rule_id: None,
            reason: Some(reason.into()),
            confidence: None,
            source,
            advisory: None,
        }
    }

    /// A judged decision. Non-allow verdicts always carry a reason.
    pub fn judged(
        verdict: Verdict,
        rule_id: impl Into<String>,
        confidence: f64,
        reason: Option<String>,
    ) -> Self {
        let reason = match (verdict, reason) {
            (_, Some(r)) if !r.trim().is_empty() => Some(r),
            (Verdict::Allow, _) => None,
            (v, _) => Some(format!("oracle returned {v} without a reason")),
        };
        Self {
            verdict,
            rule_id: Some(rule_id.into()),
            reason,
            confidence: Some(confidence.clamp(0.0, 1.0)),
            source: DecisionSource::Judge,
            advisory: None,
        }
    }

    /// Safe default for a verdict picked by configuration or hook class.
    pub fn fallback(verdict: Verdict, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            verdict,
            rule_id: None,
            reason: Some(reason),
            confidence: None,
            source: DecisionSource::Fallback,
            advisory: None,
        }
    }

    pub fn with_source(mut self, source: DecisionSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_advisory(mut self, advisory: impl Into<String>) -> Self {
        self.advisory = Some(advisory.into());
        self
    }

    pub fn verdict(&self) -> Verdict {
        self.verdict
    }

    pub fn rule_id(&self) -> Option<&str> {
        self.rule_id.as_deref()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    pub fn source(&self) -> DecisionSource {
        self.source
    }

    pub fn advisory(&self) -> Option<&str> {
        self.advisory.as_deref()
    }

    pub fn is_allow(&self) -> bool {
        self.verdict == Verdict::Allow
    }
}
