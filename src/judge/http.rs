use std::time::Duration;

use reqwest::Client;

use super::oracle::{Oracle, OracleFuture, OracleQuery};
use crate::error::OracleError;

const MAX_REPLY_BYTES: usize = 16 * 1024;

/// POSTs the query envelope as JSON and returns the response body.
pub struct HttpOracle {
    name: String,
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpOracle {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            name: "http".into(),
            client,
            endpoint: endpoint.into(),
            api_key,
            timeout,
        }
    }

    /// Key is read from the named variable at construction; never logged.
    pub fn from_env_key(endpoint: &str, api_key_env: Option<&str>, timeout: Duration) -> Self {
        let api_key = api_key_env
            .and_then(|var| std::env::var(var).ok())
            .filter(|key| !key.trim().is_empty());
        Self::new(endpoint, api_key, timeout)
    }

    fn transport(&self, message: impl Into<String>) -> OracleError {
        OracleError::Transport {
            oracle: self.name.clone(),
            message: message.into(),
        }
    }
}

impl Oracle for HttpOracle {
    fn name(&self) -> &str {
        &self.name
    }

    fn consult<'a>(&'a self, query: &'a OracleQuery) -> OracleFuture<'a> {
        Box::pin(async move {
            let mut request = self.client.post(&self.endpoint).json(&query.envelope());
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }
            let mut response = request.send().await.map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout {
                        oracle: self.name.clone(),
                        after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                    }
                } else {
                    self.transport(e.without_url().to_string())
                }
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(self.transport(format!("status {status}")));
            }
            if let Some(declared) = response.content_length()
                && declared > MAX_REPLY_BYTES as u64
            {
                return Err(oversized(declared));
            }

            // The declared length can be absent or wrong; cap what we buffer.
            let mut body = Vec::new();
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| self.transport(e.without_url().to_string()))?
            {
                if body.len() + chunk.len() > MAX_REPLY_BYTES {
                    return Err(oversized((body.len() + chunk.len()) as u64));
                }
                body.extend_from_slice(&chunk);
            }
            String::from_utf8(body)
                .map_err(|_| OracleError::MalformedReply("reply is not UTF-8".into()))
        })
    }
}

fn oversized(bytes: u64) -> OracleError {
    OracleError::MalformedReply(format!(
        "reply of at least {bytes} bytes exceeds {MAX_REPLY_BYTES}"
    ))
}
