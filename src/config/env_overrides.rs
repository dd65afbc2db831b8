use std::path::PathBuf;

use super::{Config, OracleKind};

impl Config {
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Same as [`Config::apply_env_overrides`] with an injectable lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(level) = lookup("HOOKWARDEN_LOG")
            && !level.is_empty()
        {
            self.log_level = Some(level);
        }

        if let Some(dir) = lookup("HOOKWARDEN_SCRATCH_DIR")
            && !dir.is_empty()
        {
            self.scratch_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
        }

        if let Some(dir) = lookup("HOOKWARDEN_MEMORY_DIR")
            && !dir.is_empty()
        {
            self.memory.global_dir = Some(PathBuf::from(shellexpand::tilde(&dir).as_ref()));
        }

        if let Some(endpoint) = lookup("HOOKWARDEN_ORACLE_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.oracle.endpoint = Some(endpoint);
            if self.oracle.kind == OracleKind::None {
                self.oracle.kind = OracleKind::Http;
            }
        }

        if let Some(raw) = lookup("HOOKWARDEN_ORACLE_TIMEOUT_MS")
            && let Ok(ms) = raw.trim().parse::<u64>()
            && ms > 0
        {
            self.oracle.timeout_ms = ms;
        }

        if let Some(raw) = lookup("HOOKWARDEN_DEFAULT_VERDICT")
            && let Ok(verdict) = raw.trim().parse()
        {
            self.default_verdict = verdict;
        }
    }
}
