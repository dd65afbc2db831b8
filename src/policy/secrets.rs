use std::path::Path;

use super::glob::glob_match;
use crate::action::{ActionTarget, normalize_path};

pub const SECRET_RULE_ID: &str = "secret-path";

#[must_use]
pub fn default_secret_paths() -> Vec<String> {
    vec![
        ".env".into(),
        ".env.*".into(),
        "*.pem".into(),
        "*.key".into(),
        "*.p12".into(),
        "id_rsa*".into(),
        "id_ecdsa*".into(),
        "id_ed25519*".into(),
        "**/.ssh/**".into(),
        "**/.aws/credentials".into(),
        "**/.gnupg/**".into(),
        ".netrc".into(),
        "credentials.json".into(),
    ]
}

/// Templates that look like secret files but never hold real values.
#[must_use]
pub fn default_secret_exceptions() -> Vec<String> {
    vec![".env.example".into(), ".env.sample".into(), ".env.template".into()]
}

#[derive(Debug, Clone)]
pub struct SecretMatch {
    pub path: String,
    pub pattern: String,
}

#[derive(Debug, Clone)]
pub struct SecretPaths {
    patterns: Vec<String>,
    exceptions: Vec<String>,
}

impl SecretPaths {
    pub fn new(patterns: Vec<String>, exceptions: Vec<String>) -> Self {
        Self {
            patterns,
            exceptions,
        }
    }

    pub fn check_path(&self, path: &str) -> Option<SecretMatch> {
        if self.exceptions.iter().any(|e| glob_match(e, path)) {
            return None;
        }
        self.patterns
            .iter()
            .find(|p| glob_match(p, path))
            .map(|pattern| SecretMatch {
                path: path.to_string(),
                pattern: pattern.clone(),
            })
    }

    /// Checks path targets and, for commands, every non-flag argument and
    /// redirection target, whatever tool carries them.
    pub fn check_target(&self, target: &ActionTarget, cwd: &Path) -> Option<SecretMatch> {
        match target {
            ActionTarget::Path { path } => self.check_path(path),
            ActionTarget::Command { command } => {
                let words = command
                    .effective_segments()
                    .flat_map(|argv| argv.iter().skip(1))
                    .chain(command.redirects.iter().map(|r| &r.target));
                for word in words {
                    for candidate in path_candidates(word) {
                        if let Some(found) = self.check_path(&normalize_path(candidate, cwd)) {
                            return Some(found);
                        }
                    }
                }
                None
            }
            _ => None,
        }
    }
}

impl Default for SecretPaths {
    fn default() -> Self {
        Self::new(default_secret_paths(), default_secret_exceptions())
    }
}

/// `--file=.env` names a path after the `=`; bare flags name nothing.
fn path_candidates(word: &str) -> Vec<&str> {
    if let Some(flag) = word.strip_prefix('-') {
        return flag
            .split_once('=')
            .map(|(_, value)| value)
            .filter(|v| !v.is_empty())
            .into_iter()
            .collect();
    }
    if word.is_empty() {
        return Vec::new();
    }
    vec![word]
}
