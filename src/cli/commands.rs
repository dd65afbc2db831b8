use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::memory::{MemoryScope, MemoryType};

/// `hookwarden` - action arbitration and session memory for agent tool hooks.
#[derive(Parser, Debug)]
#[command(name = "hookwarden")]
#[command(version)]
#[command(
    about = "Decides whether an agent's tool call may proceed, and remembers what happened.",
    long_about = None
)]
pub struct Cli {
    /// Project root. Without it the root comes from `HOOKWARDEN_PROJECT_DIR`,
    /// then `CLAUDE_PROJECT_DIR`, then the nearest repository above the
    /// working directory
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    /// Defaults to `evaluate` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read one hook request on stdin and print one decision on stdout
    Evaluate,

    /// Record a finished tool call (post-tool hook payload on stdin)
    Record,

    /// Search remembered events
    Search {
        /// Free-text query; empty lists by importance and recency
        #[arg(default_value = "")]
        query: String,

        #[arg(long, value_enum, default_value_t = ScopeArg::Visible)]
        scope: ScopeArg,

        /// Only this memory type
        #[arg(long = "type", value_parser = parse_memory_type)]
        memory_type: Option<MemoryType>,

        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Session whose private events may be returned
        #[arg(long)]
        session: Option<String>,

        /// Split a token budget across session, project and user scopes
        /// instead of taking the top `--limit`; bare flag uses the
        /// configured budget
        #[arg(long, value_name = "TOKENS", num_args = 0..=1, default_missing_value = "0")]
        budget: Option<usize>,
    },

    /// Append an event by hand
    Remember {
        content: String,

        #[arg(long = "type", value_parser = parse_memory_type, default_value = "observation")]
        memory_type: MemoryType,

        /// Defaults to the type's usual scope
        #[arg(long, value_parser = parse_memory_scope)]
        scope: Option<MemoryScope>,

        #[arg(long)]
        ttl_days: Option<u32>,

        /// Repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        session: Option<String>,
    },

    /// Tombstone events whose TTL has elapsed
    Sweep {
        /// Ignore the sweep interval
        #[arg(long)]
        force: bool,
    },

    /// Move proven events to a wider scope
    Promote,

    /// Summarize both event logs
    Stats,

    /// Empty the orchestrator's delegation window
    ResetDelegation {
        #[arg(long, default_value = "manual reset")]
        reason: String,
    },

    /// Show role evidence and delegation window state
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeArg {
    Session,
    User,
    Shared,
    Visible,
}

fn parse_memory_type(raw: &str) -> Result<MemoryType, String> {
    raw.parse()
        .map_err(|_| format!("unknown memory type `{raw}`"))
}

fn parse_memory_scope(raw: &str) -> Result<MemoryScope, String> {
    raw.parse()
        .map_err(|_| format!("unknown memory scope `{raw}`"))
}
