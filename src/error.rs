use std::path::PathBuf;

use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `hookwarden`.
///
/// Each subsystem defines its own error enum. The pipeline matches on these
/// to pick a safe verdict; internal plumbing keeps using `anyhow::Result` for
/// ad-hoc context chains.
#[derive(Debug, Error)]
pub enum WardenError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Host input ──────────────────────────────────────────────────────
    #[error("malformed input: {0}")]
    MalformedInput(#[from] InputError),

    // ── Oracle ──────────────────────────────────────────────────────────
    #[error("oracle unavailable: {0}")]
    OracleUnavailable(#[from] OracleError),

    // ── Persisted state ─────────────────────────────────────────────────
    #[error("state: {0}")]
    State(#[from] StateError),

    // ── Event log ───────────────────────────────────────────────────────
    #[error("event log: {0}")]
    Storage(#[from] LogError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load {}: {message}", path.display())]
    Load { path: PathBuf, message: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Host input errors ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum InputError {
    #[error("request is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("request is missing {0}")]
    Missing(&'static str),

    #[error("failed to read request: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Oracle errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("no oracle configured")]
    NotConfigured,

    #[error("oracle {oracle} timed out after {after_ms}ms")]
    Timeout { oracle: String, after_ms: u64 },

    #[error("oracle {oracle} call failed: {message}")]
    Transport { oracle: String, message: String },

    #[error("malformed oracle reply: {0}")]
    MalformedReply(String),

    #[error("oracle {oracle} circuit open")]
    CircuitOpen { oracle: String },
}

// ─── State store errors ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state {key} is corrupted: {message}")]
    Corrupted { key: String, message: String },

    #[error("state {key} io: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("state {key} could not be encoded: {message}")]
    Encode { key: String, message: String },
}

// ─── Event log errors ───────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LogError {
    #[error("append to {} failed: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read of {} failed: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("session-scoped event requires a session id")]
    MissingSession,
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, WardenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_displays_correctly() {
        let err = WardenError::Config(ConfigError::Validation("warn_at >= block_at".into()));
        assert!(err.to_string().contains("validation failed"));
    }

    #[test]
    fn oracle_timeout_displays_duration() {
        let err = WardenError::OracleUnavailable(OracleError::Timeout {
            oracle: "http".into(),
            after_ms: 2000,
        });
        assert!(err.to_string().contains("2000ms"));
        assert!(err.to_string().starts_with("oracle unavailable"));
    }

    #[test]
    fn anyhow_interop() {
        let anyhow_err = anyhow::anyhow!("something went wrong");
        let err: WardenError = anyhow_err.into();
        assert!(err.to_string().contains("something went wrong"));
    }

    #[test]
    fn json_error_becomes_malformed_input() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: WardenError = InputError::from(json_err).into();
        assert!(matches!(err, WardenError::MalformedInput(_)));
    }

    #[test]
    fn state_corruption_names_key() {
        let err = WardenError::State(StateError::Corrupted {
            key: "delegation-abc".into(),
            message: "expected value".into(),
        });
        assert!(err.to_string().contains("delegation-abc"));
    }
}
