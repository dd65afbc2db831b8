use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Set by whatever launches a subordinate agent process.
pub const SUBORDINATE_MARKER_VARS: &[&str] = &["HOOKWARDEN_SUBORDINATE", "CLAUDE_SUBAGENT"];
/// Self-declared role. Only ever able to downgrade.
pub const DECLARED_ROLE_VAR: &str = "HOOKWARDEN_ROLE";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum ActorRole {
    Orchestrator,
    Subordinate,
}

/// Independent signals about the calling process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoleEvidence {
    pub controlling_terminal: bool,
    pub subordinate_marker: bool,
    pub declared_role: Option<ActorRole>,
}

impl RoleEvidence {
    /// Gather evidence from the current process.
    pub fn collect() -> Self {
        let subordinate_marker = SUBORDINATE_MARKER_VARS
            .iter()
            .any(|var| std::env::var_os(var).is_some_and(|v| !v.is_empty()));
        let declared_role = std::env::var(DECLARED_ROLE_VAR)
            .ok()
            .and_then(|raw| raw.trim().parse().ok());
        Self {
            controlling_terminal: has_controlling_terminal(),
            subordinate_marker,
            declared_role,
        }
    }
}

#[cfg(unix)]
fn has_controlling_terminal() -> bool {
    // Hosts pipe the request through stdin, so stdin is never a tty here.
    std::fs::OpenOptions::new()
        .read(true)
        .open("/dev/tty")
        .is_ok()
}

#[cfg(not(unix))]
fn has_controlling_terminal() -> bool {
    use std::io::IsTerminal;
    std::io::stderr().is_terminal()
}

/// Fixed-precedence role decision.
///
/// Any subordinate signal wins. A process without a controlling terminal is
/// a subordinate no matter what it declares, so a spawned child that
/// inherits `HOOKWARDEN_ROLE=orchestrator` cannot claim privilege.
pub fn derive_role(evidence: &RoleEvidence) -> ActorRole {
    if evidence.subordinate_marker || !evidence.controlling_terminal {
        return ActorRole::Subordinate;
    }
    match evidence.declared_role {
        Some(ActorRole::Subordinate) => ActorRole::Subordinate,
        Some(ActorRole::Orchestrator) | None => ActorRole::Orchestrator,
    }
}
