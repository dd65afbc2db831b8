//! Which project a request belongs to.
//!
//! Per-project state (the delegation window, the project event log) must not
//! split when the agent `cd`s into a subdirectory, so the root is resolved
//! once from the strongest evidence available instead of taken from `cwd`.

use std::path::{Path, PathBuf};

use super::normalize_path;

/// Variables naming the project root, strongest first. The second is the
/// one agent hosts export to their hooks.
pub const PROJECT_DIR_VARS: &[&str] = &["HOOKWARDEN_PROJECT_DIR", "CLAUDE_PROJECT_DIR"];

const VCS_MARKERS: &[&str] = &[".git", ".hg", ".jj", ".svn"];

/// Resolution order: explicit `--project`, host variable, nearest VCS root
/// above the working directory, the working directory itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectLocator {
    explicit: Option<PathBuf>,
    host_dir: Option<PathBuf>,
}

impl ProjectLocator {
    pub fn new(explicit: Option<PathBuf>, host_dir: Option<PathBuf>) -> Self {
        Self { explicit, host_dir }
    }

    pub fn from_env(explicit: Option<&Path>) -> Self {
        Self::from_lookup(explicit, |key| std::env::var(key).ok())
    }

    /// Same as [`ProjectLocator::from_env`] with an injectable lookup.
    pub fn from_lookup(explicit: Option<&Path>, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host_dir = PROJECT_DIR_VARS
            .iter()
            .filter_map(|var| lookup(var))
            .map(|raw| raw.trim().to_string())
            .find(|raw| !raw.is_empty())
            .map(|raw| PathBuf::from(shellexpand::tilde(&raw).as_ref()));
        Self::new(explicit.map(Path::to_path_buf), host_dir)
    }

    pub fn locate(&self, cwd: &Path) -> PathBuf {
        if let Some(dir) = self.explicit.as_ref().or(self.host_dir.as_ref()) {
            return PathBuf::from(normalize_path(&dir.to_string_lossy(), cwd));
        }
        let cwd = PathBuf::from(normalize_path(&cwd.to_string_lossy(), cwd));
        find_vcs_root(&cwd).unwrap_or(cwd)
    }
}

/// Nearest ancestor of `start` (inclusive) holding a VCS metadata entry.
pub fn find_vcs_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| VCS_MARKERS.iter().any(|marker| dir.join(marker).exists()))
        .map(Path::to_path_buf)
}
