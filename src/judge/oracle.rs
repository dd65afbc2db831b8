use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::action::{ActionKind, ActionRequest, ActorRole};
use crate::decision::Verdict;
use crate::error::OracleError;
use crate::memory::redact::{redact, truncate_chars};

const MAX_TOOL_CHARS: usize = 64;
const MAX_REASON_CHARS: usize = 500;

pub type OracleFuture<'a> = Pin<Box<dyn Future<Output = Result<String, OracleError>> + Send + 'a>>;

/// An external reasoning service. Implementations return the raw reply
/// body; validation happens in one place, [`parse_reply`].
pub trait Oracle: Send + Sync {
    fn name(&self) -> &str;

    fn consult<'a>(&'a self, query: &'a OracleQuery) -> OracleFuture<'a>;
}

/// Bounded, redacted description of one action. Carries no environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleQuery {
    pub tool: String,
    pub action: ActionKind,
    pub role: ActorRole,
    pub target: String,
    pub project: String,
}

impl OracleQuery {
    pub fn from_request(request: &ActionRequest, max_chars: usize) -> Self {
        let target = redact(&request.target.summary()).into_owned();
        Self {
            tool: truncate_chars(&request.tool, MAX_TOOL_CHARS).into_owned(),
            action: request.action_kind,
            role: request.actor_role,
            target: truncate_chars(&target, max_chars).into_owned(),
            project: project_label(&request.project_dir),
        }
    }

    pub fn prompt(&self) -> String {
        format!(
            "An automated agent is asking to perform one action.\n\
             role: {}\ntool: {}\naction: {}\nproject: {}\ntarget: {}\n\n\
             Reply with only a JSON object: \
             {{\"verdict\": \"allow\" | \"deny\" | \"ask\", \"confidence\": <0..1>, \"reason\": \"<short>\"}}",
            self.role, self.tool, self.action, self.project, self.target
        )
    }

    /// Body sent to HTTP and command oracles.
    pub fn envelope(&self) -> serde_json::Value {
        serde_json::json!({ "prompt": self.prompt(), "action": self })
    }
}

/// Directory name only; the full path can identify the user.
fn project_label(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub struct OracleReply {
    pub verdict: Verdict,
    pub confidence: f64,
    pub reason: Option<String>,
}

#[derive(Deserialize)]
struct WireReply {
    verdict: String,
    confidence: f64,
    #[serde(default)]
    reason: Option<String>,
}

/// Strict reply validation. Anything other than a single JSON object with a
/// known lowercase verdict and an explicit confidence in `[0, 1]` is
/// malformed.
pub fn parse_reply(raw: &str) -> Result<OracleReply, OracleError> {
    let wire: WireReply = serde_json::from_str(raw.trim())
        .map_err(|e| OracleError::MalformedReply(e.to_string()))?;
    let verdict = match wire.verdict.as_str() {
        "allow" => Verdict::Allow,
        "deny" => Verdict::Deny,
        "ask" => Verdict::Ask,
        other => {
            return Err(OracleError::MalformedReply(format!(
                "unknown verdict {:?}",
                truncate_chars(other, 32)
            )));
        }
    };
    if !(0.0..=1.0).contains(&wire.confidence) {
        return Err(OracleError::MalformedReply(format!(
            "confidence {} outside [0, 1]",
            wire.confidence
        )));
    }
    let reason = wire
        .reason
        .map(|r| truncate_chars(r.trim(), MAX_REASON_CHARS).into_owned())
        .filter(|r| !r.is_empty());
    Ok(OracleReply {
        verdict,
        confidence: wire.confidence,
        reason,
    })
}
