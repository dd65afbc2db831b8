#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

use hookwarden::action::{ActionKind, ActionRequest, ActionTarget, ActorRole};
use hookwarden::config::Config;
use hookwarden::error::OracleError;
use hookwarden::judge::{EscalationJudge, Oracle, OracleFuture, OracleQuery};
use hookwarden::memory::EventLog;
use hookwarden::pipeline::Arbiter;
use hookwarden::state::{FsStateStore, StateStore};

/// Scratch area, project root and global memory dir in one temp tree.
pub struct Workspace {
    pub temp: TempDir,
    pub config: Config,
}

impl Workspace {
    pub fn new() -> Self {
        let temp = TempDir::new().expect("temp dir should be created");
        let mut config = Config::default();
        config.scratch_dir = temp.path().join("scratch");
        config.memory.global_dir = Some(temp.path().join("global"));
        std::fs::create_dir_all(temp.path().join("project")).expect("project dir");
        Self { temp, config }
    }

    pub fn project(&self) -> PathBuf {
        self.temp.path().join("project")
    }

    pub fn store(&self) -> Arc<dyn StateStore> {
        Arc::new(FsStateStore::from_config(&self.config))
    }

    pub fn log(&self) -> EventLog {
        EventLog::from_config(&self.config, Some(&self.project()))
    }

    pub fn arbiter(&self) -> Arbiter {
        Arbiter::new(&self.config, self.store(), self.log())
    }

    pub fn arbiter_with(&self, oracle: Arc<dyn Oracle>) -> Arbiter {
        let judge = EscalationJudge::new(Some(oracle), &self.config.oracle);
        self.arbiter().with_judge(judge)
    }

    pub fn request(&self, role: ActorRole, kind: ActionKind, target: ActionTarget) -> ActionRequest {
        ActionRequest {
            actor_role: role,
            action_kind: kind,
            target,
            tool: tool_for(kind).into(),
            session_id: Some("session-1".into()),
            project_dir: self.project(),
            raw_payload: String::new(),
        }
    }

    pub fn exec(&self, role: ActorRole, command: &str) -> ActionRequest {
        self.request(role, ActionKind::Execute, ActionTarget::from_command(command))
    }

    pub fn write(&self, role: ActorRole, path: &str) -> ActionRequest {
        let target = ActionTarget::from_path(path, &self.project());
        self.request(role, ActionKind::Write, target)
    }

    pub fn delegate(&self) -> ActionRequest {
        self.request(
            ActorRole::Orchestrator,
            ActionKind::Delegate,
            ActionTarget::Task {
                subagent: Some("coder".into()),
            },
        )
    }
}

fn tool_for(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Read => "Read",
        ActionKind::Write => "Write",
        ActionKind::Execute => "Bash",
        ActionKind::Delegate => "Task",
        ActionKind::Network => "WebFetch",
    }
}

/// Oracle that always gives the same reply and counts how often it was asked.
pub struct ScriptedOracle {
    reply: Result<String, String>,
    calls: AtomicUsize,
}

impl ScriptedOracle {
    pub fn replying(raw: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(raw.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Oracle for ScriptedOracle {
    fn name(&self) -> &str {
        "scripted"
    }

    fn consult<'a>(&'a self, _query: &'a OracleQuery) -> OracleFuture<'a> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.reply.clone();
        Box::pin(async move {
            reply.map_err(|message| OracleError::Transport {
                oracle: "scripted".into(),
                message,
            })
        })
    }
}

pub fn log_file(dir: &Path) -> PathBuf {
    dir.join(hookwarden::memory::LOG_FILE)
}
