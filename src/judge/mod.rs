//! Escalation for actions no rule matched.
//!
//! The judge consults one configured [`Oracle`] under a timeout, validates
//! the reply strictly and only trusts allow/deny at or above the trust
//! threshold. Every failure path yields `ask`.

pub mod circuit;
pub mod command;
pub mod http;
pub mod oracle;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

pub use circuit::CircuitBreaker;
pub use command::CommandOracle;
pub use http::HttpOracle;
pub use oracle::{Oracle, OracleFuture, OracleQuery, OracleReply, parse_reply};

use crate::action::ActionRequest;
use crate::config::{OracleConfig, OracleKind};
use crate::decision::{Decision, DecisionSource, Verdict};
use crate::error::OracleError;
use crate::memory::{EventDraft, EventLog, MemorySource, MemoryType};
use crate::state::StateStore;

pub struct EscalationJudge {
    oracle: Option<Arc<dyn Oracle>>,
    circuit: Option<CircuitBreaker>,
    timeout: Duration,
    trust_threshold: f64,
    max_query_chars: usize,
    log: Option<EventLog>,
}

impl EscalationJudge {
    pub fn new(oracle: Option<Arc<dyn Oracle>>, config: &OracleConfig) -> Self {
        Self {
            oracle,
            circuit: None,
            timeout: Duration::from_millis(config.timeout_ms),
            trust_threshold: config.trust_threshold,
            max_query_chars: config.max_query_chars,
            log: None,
        }
    }

    /// Build the configured oracle with a persisted circuit breaker.
    pub fn from_config(config: &OracleConfig, store: Arc<dyn StateStore>) -> Self {
        let oracle = build_oracle(config);
        let circuit = oracle.as_ref().map(|o| {
            CircuitBreaker::new(
                store,
                o.name(),
                config.failure_threshold,
                config.reset_after_secs,
            )
        });
        Self {
            circuit,
            ..Self::new(oracle, config)
        }
    }

    pub fn with_circuit(mut self, circuit: CircuitBreaker) -> Self {
        self.circuit = Some(circuit);
        self
    }

    /// Record every consultation in `log`.
    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn is_configured(&self) -> bool {
        self.oracle.is_some()
    }

    /// Never fails. Unconfigured, open circuit, timeout, transport error
    /// and malformed reply all become `ask`.
    pub async fn judge(&self, request: &ActionRequest) -> Decision {
        let outcome = self.consult(request).await;
        self.record(request, &outcome);
        match outcome {
            Ok(decision) => decision,
            Err(error) => {
                tracing::warn!(%error, "escalation degraded to ask");
                Decision::ask(
                    DecisionSource::Judge,
                    format!("no rule matched and the oracle could not decide: {error}"),
                )
            }
        }
    }

    /// One oracle round trip with strict validation. Errors are the
    /// `OracleUnavailable` class.
    pub async fn consult(&self, request: &ActionRequest) -> Result<Decision, OracleError> {
        let oracle = self.oracle.as_ref().ok_or(OracleError::NotConfigured)?;
        let now_ms = chrono::Utc::now().timestamp_millis();
        if let Some(circuit) = &self.circuit
            && circuit.is_open(now_ms)
        {
            return Err(OracleError::CircuitOpen {
                oracle: oracle.name().to_string(),
            });
        }

        let query = OracleQuery::from_request(request, self.max_query_chars);
        let reply = match tokio::time::timeout(self.timeout, oracle.consult(&query)).await {
            Ok(Ok(raw)) => parse_reply(&raw),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(OracleError::Timeout {
                oracle: oracle.name().to_string(),
                after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };

        if let Some(circuit) = &self.circuit {
            match &reply {
                Ok(_) => circuit.record_success(),
                Err(_) => circuit.record_failure(now_ms),
            }
        }
        let reply = reply?;
        Ok(self.trust(&format!("oracle:{}", oracle.name()), reply))
    }

    fn trust(&self, rule_id: &str, reply: OracleReply) -> Decision {
        if reply.verdict != Verdict::Ask && reply.confidence < self.trust_threshold {
            return Decision::judged(
                Verdict::Ask,
                rule_id,
                reply.confidence,
                Some(format!(
                    "oracle suggested {} with confidence {:.2}, below the trust threshold {:.2}",
                    reply.verdict, reply.confidence, self.trust_threshold
                )),
            );
        }
        Decision::judged(reply.verdict, rule_id, reply.confidence, reply.reason)
    }

    fn record(&self, request: &ActionRequest, outcome: &Result<Decision, OracleError>) {
        let Some(log) = &self.log else {
            return;
        };
        if matches!(outcome, Err(OracleError::NotConfigured)) {
            return;
        }
        let oracle = self.oracle.as_ref().map_or("none", |o| o.name());
        let (content, resolution) = match outcome {
            Ok(d) => (
                format!(
                    "oracle {oracle} answered {} ({:.2}) for {} {}",
                    d.verdict(),
                    d.confidence().unwrap_or_default(),
                    request.action_kind,
                    request.target.summary()
                ),
                json!({ "verdict": d.verdict(), "confidence": d.confidence(), "reason": d.reason() }),
            ),
            Err(e) => (
                format!(
                    "oracle {oracle} degraded to ask for {} {}: {e}",
                    request.action_kind,
                    request.target.summary()
                ),
                json!({ "verdict": Verdict::Ask, "error": e.to_string() }),
            ),
        };
        let draft = EventDraft::new(MemoryType::Observation, MemorySource::Judge, content)
            .for_session(request.session_id.clone())
            .with_tag("oracle")
            .with_metadata("oracle", json!(oracle))
            .with_metadata("resolution", resolution);
        if let Err(error) = log.append(draft) {
            tracing::warn!(%error, "failed to record oracle consultation");
        }
    }
}

fn build_oracle(config: &OracleConfig) -> Option<Arc<dyn Oracle>> {
    let timeout = Duration::from_millis(config.timeout_ms);
    match config.kind {
        OracleKind::None => None,
        OracleKind::Http => match &config.endpoint {
            Some(endpoint) => Some(Arc::new(HttpOracle::from_env_key(
                endpoint,
                config.api_key_env.as_deref(),
                timeout,
            ))),
            None => {
                tracing::warn!("http oracle configured without an endpoint, escalations will ask");
                None
            }
        },
        OracleKind::Command => match &config.command {
            Some(program) => Some(Arc::new(CommandOracle::new(
                program.clone(),
                config.args.clone(),
                timeout,
            ))),
            None => {
                tracing::warn!("command oracle configured without a command, escalations will ask");
                None
            }
        },
    }
}
