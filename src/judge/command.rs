use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::oracle::{Oracle, OracleFuture, OracleQuery};
use crate::error::OracleError;

/// Variables passed through to the oracle process. Everything else is
/// cleared so credentials in the hook's environment never reach it.
const SAFE_ENV_VARS: &[&str] = &["PATH", "HOME", "LANG", "LC_ALL", "TMPDIR", "USER"];

const MAX_REPLY_BYTES: usize = 16 * 1024;

/// Runs a local program, writes the query envelope to its stdin and reads
/// the reply from stdout.
pub struct CommandOracle {
    name: String,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandOracle {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            name: "command".into(),
            program: program.into(),
            args,
            timeout,
        }
    }

    fn transport(&self, message: impl Into<String>) -> OracleError {
        OracleError::Transport {
            oracle: self.name.clone(),
            message: message.into(),
        }
    }
}

impl Oracle for CommandOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn consult<'a>(&'a self, query: &'a OracleQuery) -> OracleFuture<'a> {
        Box::pin(async move {
            let mut cmd = Command::new(&self.program);
            cmd.args(&self.args)
                .env_clear()
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .kill_on_drop(true);
            for var in SAFE_ENV_VARS {
                if let Ok(value) = std::env::var(var) {
                    cmd.env(var, value);
                }
            }

            let mut child = cmd.spawn().map_err(|e| self.transport(e.to_string()))?;
            let input = serde_json::to_vec(&query.envelope())
                .map_err(|e| self.transport(e.to_string()))?;
            if let Some(mut stdin) = child.stdin.take() {
                // A program that ignores stdin may close it early.
                if let Err(error) = stdin.write_all(&input).await {
                    tracing::debug!(%error, "oracle process closed stdin");
                }
            }

            let output = tokio::time::timeout(self.timeout, child.wait_with_output())
                .await
                .map_err(|_| OracleError::Timeout {
                    oracle: self.name.clone(),
                    after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                })?
                .map_err(|e| self.transport(e.to_string()))?;

            if !output.status.success() {
                return Err(self.transport(format!("exited with {}", output.status)));
            }
            if output.stdout.len() > MAX_REPLY_BYTES {
                return Err(OracleError::MalformedReply(format!(
                    "reply of {} bytes exceeds {MAX_REPLY_BYTES}",
                    output.stdout.len()
                )));
            }
            String::from_utf8(output.stdout)
                .map_err(|_| OracleError::MalformedReply("reply is not UTF-8".into()))
        })
    }
}
