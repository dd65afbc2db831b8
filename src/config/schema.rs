use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::decision::Verdict;
use crate::policy::secrets::{default_secret_exceptions, default_secret_paths};
use crate::policy::{ObfuscationPolicy, Rule};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where this config was loaded from. Not persisted.
    #[serde(skip)]
    pub config_path: PathBuf,
    /// Verdict when no rule matches and no oracle answers. Never `allow`.
    #[serde(default = "default_verdict")]
    pub default_verdict: Verdict,
    /// Wall-clock budget for one evaluation.
    #[serde(default = "default_budget_ms")]
    pub budget_ms: u64,
    /// `error` | `warn` | `info` | `debug` | `trace`
    #[serde(default)]
    pub log_level: Option<String>,
    /// Process-wide scratch area for rate-limit state and lock markers.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub delegation: DelegationConfig,
    #[serde(default)]
    pub guard: GuardConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            default_verdict: default_verdict(),
            budget_ms: default_budget_ms(),
            log_level: None,
            scratch_dir: default_scratch_dir(),
            classifier: ClassifierConfig::default(),
            oracle: OracleConfig::default(),
            delegation: DelegationConfig::default(),
            guard: GuardConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

fn default_verdict() -> Verdict {
    Verdict::Ask
}

fn default_budget_ms() -> u64 {
    8_000
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("hookwarden")
}

// ── Classifier ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub obfuscation: ObfuscationPolicy,
    /// Evaluate the built-in catalog after `rules`.
    #[serde(default = "default_true")]
    pub builtin_rules: bool,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default = "default_secret_paths")]
    pub secret_paths: Vec<String>,
    #[serde(default = "default_secret_exceptions")]
    pub secret_exceptions: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            obfuscation: ObfuscationPolicy::default(),
            builtin_rules: true,
            rules: Vec::new(),
            secret_paths: default_secret_paths(),
            secret_exceptions: default_secret_exceptions(),
        }
    }
}

fn default_true() -> bool {
    true
}

// ── Oracle ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleKind {
    #[default]
    None,
    Http,
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub kind: OracleKind,
    /// HTTP oracle: POST target for the JSON query.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// HTTP oracle: name of the env var holding a bearer token.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Command oracle: program fed the query on stdin.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_oracle_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_trust_threshold")]
    pub trust_threshold: f64,
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
    /// Consecutive failures before the oracle is skipped.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_reset_after_secs")]
    pub reset_after_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            kind: OracleKind::None,
            endpoint: None,
            api_key_env: None,
            command: None,
            args: Vec::new(),
            timeout_ms: default_oracle_timeout_ms(),
            trust_threshold: default_trust_threshold(),
            max_query_chars: default_max_query_chars(),
            failure_threshold: default_failure_threshold(),
            reset_after_secs: default_reset_after_secs(),
        }
    }
}

fn default_oracle_timeout_ms() -> u64 {
    2_000
}

fn default_trust_threshold() -> f64 {
    0.7
}

fn default_max_query_chars() -> usize {
    2_000
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_reset_after_secs() -> u64 {
    60
}

// ── Delegation ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_warn_at")]
    pub warn_at: usize,
    #[serde(default = "default_block_at")]
    pub block_at: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// Project-relative globs that never advance the window.
    #[serde(default = "default_delegation_allowlist")]
    pub allowlist: Vec<String>,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            warn_at: default_warn_at(),
            block_at: default_block_at(),
            window_secs: default_window_secs(),
            allowlist: default_delegation_allowlist(),
        }
    }
}

fn default_warn_at() -> usize {
    3
}

fn default_block_at() -> usize {
    5
}

fn default_window_secs() -> u64 {
    600
}

fn default_delegation_allowlist() -> Vec<String> {
    vec![
        ".hookwarden/**".into(),
        ".claude/**".into(),
        "**/memory/**".into(),
        "Cargo.toml".into(),
        "Cargo.lock".into(),
        "package.json".into(),
        "package-lock.json".into(),
        "pyproject.toml".into(),
        "settings.json".into(),
        ".gitignore".into(),
    ]
}

// ── Guard ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Lock markers older than this are reclaimed.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

fn default_stale_after_secs() -> u64 {
    30
}

// ── Memory ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// User-scope log directory. Defaults to `~/.hookwarden/memory`.
    #[serde(default)]
    pub global_dir: Option<PathBuf>,
    /// Session/shared log directory, relative to the project root.
    #[serde(default = "default_project_subdir")]
    pub project_subdir: PathBuf,
    #[serde(default = "default_sweep_interval_hours")]
    pub sweep_interval_hours: u32,
    /// TTL stamped on decision records.
    #[serde(default = "default_decision_ttl_days")]
    pub decision_ttl_days: Option<u32>,
    /// Surface related memories to the agent before a tool runs.
    #[serde(default = "default_true")]
    pub recall: bool,
    #[serde(default = "default_recall_limit")]
    pub recall_limit: usize,
    /// Token budget for one recall.
    #[serde(default = "default_recall_budget_tokens")]
    pub recall_budget_tokens: usize,
    /// Token budget for `search --budget` when no figure is given.
    #[serde(default = "default_search_budget_tokens")]
    pub search_budget_tokens: usize,
    /// Share of a token budget each scope may fill.
    #[serde(default)]
    pub scope_weights: ScopeWeights,
    /// Promote qualifying events whenever the sweep runs.
    #[serde(default = "default_true")]
    pub promote_on_sweep: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            global_dir: None,
            project_subdir: default_project_subdir(),
            sweep_interval_hours: default_sweep_interval_hours(),
            decision_ttl_days: default_decision_ttl_days(),
            recall: true,
            recall_limit: default_recall_limit(),
            recall_budget_tokens: default_recall_budget_tokens(),
            search_budget_tokens: default_search_budget_tokens(),
            scope_weights: ScopeWeights::default(),
            promote_on_sweep: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScopeWeights {
    #[serde(default = "default_session_weight")]
    pub session: f64,
    #[serde(default = "default_shared_weight")]
    pub shared: f64,
    #[serde(default = "default_user_weight")]
    pub user: f64,
}

impl Default for ScopeWeights {
    fn default() -> Self {
        Self {
            session: default_session_weight(),
            shared: default_shared_weight(),
            user: default_user_weight(),
        }
    }
}

fn default_session_weight() -> f64 {
    0.4
}

fn default_shared_weight() -> f64 {
    0.4
}

fn default_user_weight() -> f64 {
    0.2
}

fn default_recall_limit() -> usize {
    5
}

fn default_recall_budget_tokens() -> usize {
    1_000
}

fn default_search_budget_tokens() -> usize {
    10_000
}

fn default_project_subdir() -> PathBuf {
    PathBuf::from(".hookwarden").join("memory")
}

fn default_sweep_interval_hours() -> u32 {
    12
}

#[allow(clippy::unnecessary_wraps)]
fn default_decision_ttl_days() -> Option<u32> {
    Some(30)
}
