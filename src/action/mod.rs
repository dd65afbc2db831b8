pub mod project;
pub mod role;
pub mod shell;

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use project::{ProjectLocator, find_vcs_root};
pub use role::{ActorRole, RoleEvidence, derive_role};
pub use shell::{Indicator, ParseError, ParsedCommand, parse_command, program_name};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ActionKind {
    Read,
    Write,
    Execute,
    Delegate,
    Network,
}

impl ActionKind {
    /// Kinds that advance the orchestrator's delegation window.
    pub fn is_direct_work(self) -> bool {
        matches!(self, Self::Write | Self::Execute | Self::Network)
    }
}

/// Normalized subject of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionTarget {
    /// Absolute, lexically normalized file path.
    Path { path: String },
    Command { command: ParsedCommand },
    /// URL or search query of a network action.
    Resource { uri: String },
    /// Sub-task handed to a subordinate.
    Task { subagent: Option<String> },
    Unparsable { reason: String },
    Empty,
}

impl ActionTarget {
    pub fn from_command(raw: &str) -> Self {
        match parse_command(raw) {
            Ok(command) => Self::Command { command },
            Err(shell::ParseError::Empty) => Self::Empty,
            Err(e) => Self::Unparsable {
                reason: e.to_string(),
            },
        }
    }

    pub fn from_path(raw: &str, cwd: &Path) -> Self {
        if raw.trim().is_empty() {
            return Self::Empty;
        }
        if raw.contains('\0') {
            return Self::Unparsable {
                reason: "path contains a null byte".into(),
            };
        }
        Self::Path {
            path: normalize_path(raw, cwd),
        }
    }

    /// Whether rules can be matched at all. Empty and unparsable targets
    /// always fall through to escalation.
    pub fn is_matchable(&self) -> bool {
        !matches!(self, Self::Unparsable { .. } | Self::Empty)
    }

    pub fn summary(&self) -> String {
        match self {
            Self::Path { path } => path.clone(),
            Self::Command { command } => command.display(),
            Self::Resource { uri } => uri.clone(),
            Self::Task { subagent } => {
                format!("task for {}", subagent.as_deref().unwrap_or("subordinate"))
            }
            Self::Unparsable { reason } => format!("<unparsable: {reason}>"),
            Self::Empty => "<empty>".into(),
        }
    }
}

/// One evaluation unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub actor_role: ActorRole,
    pub action_kind: ActionKind,
    pub target: ActionTarget,
    pub tool: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub project_dir: PathBuf,
    /// Unparsed host input. Audit only.
    #[serde(default)]
    pub raw_payload: String,
}

impl ActionRequest {
    /// Path target relative to the project root, when it lies inside it.
    pub fn project_relative_path(&self) -> Option<String> {
        let ActionTarget::Path { path } = &self.target else {
            return None;
        };
        let root = normalize_path(&self.project_dir.to_string_lossy(), &self.project_dir);
        Path::new(path)
            .strip_prefix(&root)
            .ok()
            .map(|rel| rel.to_string_lossy().replace('\\', "/"))
    }
}

/// Expand `~`, anchor relative paths at `cwd` and fold `.`/`..` lexically.
pub fn normalize_path(raw: &str, cwd: &Path) -> String {
    let expanded = shellexpand::tilde(raw);
    let path = Path::new(expanded.as_ref());
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir => {}
            other => out.push(other.as_os_str()),
        }
    }
    out.to_string_lossy().replace('\\', "/")
}
