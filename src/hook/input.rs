use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::action::{
    ActionKind, ActionRequest, ActionTarget, ActorRole, ProjectLocator, program_name,
};
use crate::error::InputError;
use crate::pipeline::HookClass;

const MAX_RECALL_QUERY_CHARS: usize = 200;

/// One host hook payload. Unknown fields are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostRequest {
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Value,
    #[serde(default)]
    pub tool_response: Option<Value>,
    #[serde(default)]
    pub hook_event_name: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

pub fn parse_request(raw: &str) -> Result<HostRequest, InputError> {
    let request: HostRequest = serde_json::from_str(raw)?;
    if request
        .tool_name
        .as_deref()
        .is_none_or(|name| name.trim().is_empty())
    {
        return Err(InputError::Missing("tool_name"));
    }
    Ok(request)
}

fn classify_tool(tool: &str) -> ActionKind {
    match tool {
        "Read" | "Glob" | "Grep" | "LS" | "NotebookRead" => ActionKind::Read,
        "Write" | "Edit" | "MultiEdit" | "NotebookEdit" => ActionKind::Write,
        "WebFetch" | "WebSearch" => ActionKind::Network,
        "Task" => ActionKind::Delegate,
        _ => ActionKind::Execute,
    }
}

impl HostRequest {
    pub fn tool(&self) -> &str {
        self.tool_name.as_deref().unwrap_or_default()
    }

    pub fn hook_class(&self) -> HookClass {
        HookClass::from_event(self.hook_event_name.as_deref())
    }

    pub fn event_name(&self) -> &str {
        self.hook_event_name.as_deref().unwrap_or("PreToolUse")
    }

    fn input_str(&self, key: &str) -> Option<&str> {
        self.tool_input
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Search text for memories related to this call. `None` for tools
    /// that gain nothing from recall.
    pub fn recall_query(&self, action: &ActionRequest) -> Option<String> {
        let query = match self.tool() {
            "Bash" => {
                let ActionTarget::Command { command } = &action.target else {
                    return None;
                };
                let argv = command.effective_segments().next()?;
                let program = program_name(argv)?;
                match argv.get(1).filter(|arg| !arg.starts_with('-')) {
                    Some(sub) => format!("{program} {sub}"),
                    None => program.to_string(),
                }
            }
            "Edit" | "MultiEdit" | "Write" => {
                let path = self.input_str("file_path")?;
                Path::new(path).file_name()?.to_string_lossy().into_owned()
            }
            "Task" => self
                .input_str("prompt")
                .or_else(|| self.input_str("description"))?
                .chars()
                .take(MAX_RECALL_QUERY_CHARS)
                .collect(),
            "WebFetch" => self.input_str("url")?.to_string(),
            "WebSearch" => self.input_str("query")?.to_string(),
            _ => return None,
        };
        Some(query)
    }

    /// `true` when the host reported the tool as failed.
    pub fn tool_failed(&self) -> bool {
        let Some(response) = &self.tool_response else {
            return false;
        };
        response.get("success").and_then(Value::as_bool) == Some(false)
            || response
                .get("is_error")
                .and_then(Value::as_bool)
                .unwrap_or(false)
            || response.get("error").is_some_and(|e| !e.is_null())
    }

    /// Build the structured request. `role` comes from process evidence;
    /// `fallback_cwd` is used when the payload carries no `cwd`. Paths are
    /// anchored at the working directory; the project root comes from
    /// `locator`.
    pub fn to_action(
        &self,
        role: ActorRole,
        raw: &str,
        fallback_cwd: &Path,
        locator: &ProjectLocator,
    ) -> ActionRequest {
        let cwd = self.cwd.clone().unwrap_or_else(|| fallback_cwd.to_path_buf());
        let project_dir = locator.locate(&cwd);
        let tool = self.tool();
        let kind = if self.tool_input.get("subagent_type").is_some() {
            ActionKind::Delegate
        } else {
            classify_tool(tool)
        };

        let target = match kind {
            ActionKind::Execute if tool == "Bash" => self
                .input_str("command")
                .map_or(ActionTarget::Empty, ActionTarget::from_command),
            ActionKind::Execute => ActionTarget::Empty,
            ActionKind::Read | ActionKind::Write => {
                let path = ["file_path", "notebook_path", "path"]
                    .iter()
                    .find_map(|key| self.input_str(key));
                match (path, tool) {
                    (Some(path), _) => ActionTarget::from_path(path, &cwd),
                    // Searches without a path run in the working directory.
                    (None, "Glob" | "Grep" | "LS") => {
                        ActionTarget::from_path(&cwd.to_string_lossy(), &cwd)
                    }
                    (None, _) => ActionTarget::Empty,
                }
            }
            ActionKind::Network => self
                .input_str("url")
                .or_else(|| self.input_str("query"))
                .map_or(ActionTarget::Empty, |uri| ActionTarget::Resource {
                    uri: uri.to_string(),
                }),
            ActionKind::Delegate => ActionTarget::Task {
                subagent: self.input_str("subagent_type").map(str::to_string),
            },
        };

        ActionRequest {
            actor_role: role,
            action_kind: kind,
            target,
            tool: tool.to_string(),
            session_id: self.session_id.clone(),
            project_dir,
            raw_payload: raw.to_string(),
        }
    }
}
