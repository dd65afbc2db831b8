use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::UserDirs;

use super::Config;
use crate::decision::Verdict;
use crate::error::ConfigError;

const APP_DIR: &str = ".hookwarden";

impl Config {
    /// `~/.hookwarden`, or `None` without a resolvable home directory.
    pub fn app_dir() -> Option<PathBuf> {
        UserDirs::new().map(|u| u.home_dir().join(APP_DIR))
    }

    /// Load from `HOOKWARDEN_CONFIG` or `~/.hookwarden/config.toml`, then
    /// apply environment overrides and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("HOOKWARDEN_CONFIG")
            .ok()
            .filter(|p| !p.is_empty())
            .map(|p| PathBuf::from(shellexpand::tilde(&p).as_ref()))
            .or_else(|| Self::app_dir().map(|dir| dir.join("config.toml")));

        let mut config = match path {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// A missing file yields defaults; an unreadable or malformed one is an
    /// error, so a typo never silently relaxes policy.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self {
                config_path: path.to_path_buf(),
                ..Self::default()
            });
        }
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut config: Config = toml::from_str(&contents).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.config_path = path.to_path_buf();
        config.expand_paths();
        Ok(config)
    }

    fn expand_paths(&mut self) {
        let expand = |p: &Path| PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref());
        self.scratch_dir = expand(&self.scratch_dir);
        if let Some(dir) = &self.memory.global_dir {
            self.memory.global_dir = Some(expand(dir));
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_verdict == Verdict::Allow {
            return Err(ConfigError::Validation(
                "default_verdict must be ask or deny".into(),
            ));
        }
        if self.budget_ms == 0 {
            return Err(ConfigError::Validation("budget_ms must be positive".into()));
        }
        let d = &self.delegation;
        if d.warn_at == 0 || d.warn_at >= d.block_at {
            return Err(ConfigError::Validation(format!(
                "delegation thresholds must satisfy 0 < warn_at < block_at (got {} / {})",
                d.warn_at, d.block_at
            )));
        }
        if d.window_secs == 0 {
            return Err(ConfigError::Validation(
                "delegation.window_secs must be positive".into(),
            ));
        }
        let o = &self.oracle;
        if o.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "oracle.timeout_ms must be positive".into(),
            ));
        }
        if !(o.trust_threshold > 0.0 && o.trust_threshold <= 1.0) {
            return Err(ConfigError::Validation(format!(
                "oracle.trust_threshold must be in (0, 1] (got {})",
                o.trust_threshold
            )));
        }
        let w = &self.memory.scope_weights;
        if [w.session, w.shared, w.user].iter().any(|x| !(x.is_finite() && *x >= 0.0))
            || w.session + w.shared + w.user <= 0.0
        {
            return Err(ConfigError::Validation(
                "memory.scope_weights must be non-negative and not all zero".into(),
            ));
        }
        if o.timeout_ms >= self.budget_ms {
            return Err(ConfigError::Validation(format!(
                "oracle.timeout_ms ({}) must be below budget_ms ({})",
                o.timeout_ms, self.budget_ms
            )));
        }
        Ok(())
    }

    pub fn budget(&self) -> Duration {
        Duration::from_millis(self.budget_ms)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.scratch_dir.join("state")
    }

    pub fn lock_dir(&self) -> PathBuf {
        self.scratch_dir.join("locks")
    }

    /// User-scope log directory; falls back to the scratch area when no
    /// home directory exists.
    pub fn global_memory_dir(&self) -> PathBuf {
        self.memory
            .global_dir
            .clone()
            .or_else(|| Self::app_dir().map(|dir| dir.join("memory")))
            .unwrap_or_else(|| self.scratch_dir.join("memory"))
    }

    pub fn project_memory_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.memory.project_subdir)
    }
}
