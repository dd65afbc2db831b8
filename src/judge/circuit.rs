use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::state::{StateStore, load_json, stable_key, update_json};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct CircuitState {
    consecutive_failures: u32,
    opened_at_ms: Option<i64>,
}

/// Persisted failure counter for one oracle.
///
/// After `failure_threshold` consecutive failures the circuit opens and the
/// oracle is skipped until `reset_after_ms` has passed. The next call after
/// that is a trial: success closes the circuit, failure reopens it.
#[derive(Clone)]
pub struct CircuitBreaker {
    store: Arc<dyn StateStore>,
    key: String,
    failure_threshold: u32,
    reset_after_ms: i64,
}

impl CircuitBreaker {
    pub fn new(
        store: Arc<dyn StateStore>,
        oracle: &str,
        failure_threshold: u32,
        reset_after_secs: u64,
    ) -> Self {
        Self {
            store,
            key: stable_key("oracle-circuit", &[oracle]),
            failure_threshold: failure_threshold.max(1),
            reset_after_ms: i64::try_from(reset_after_secs.saturating_mul(1000))
                .unwrap_or(i64::MAX),
        }
    }

    fn state(&self) -> CircuitState {
        load_json::<CircuitState>(self.store.as_ref(), &self.key)
            .unwrap_or_else(|error| {
                tracing::warn!(key = %self.key, %error, "circuit state unreadable, treating as closed");
                None
            })
            .unwrap_or_default()
    }

    pub fn is_open(&self, now_ms: i64) -> bool {
        self.state()
            .opened_at_ms
            .is_some_and(|opened| now_ms.saturating_sub(opened) < self.reset_after_ms)
    }

    pub fn record_success(&self) {
        let result = update_json(self.store.as_ref(), &self.key, |state: &mut CircuitState| {
            *state = CircuitState::default();
        });
        if let Err(error) = result {
            tracing::warn!(key = %self.key, %error, "failed to record oracle success");
        }
    }

    pub fn record_failure(&self, now_ms: i64) {
        let threshold = self.failure_threshold;
        let result = update_json(self.store.as_ref(), &self.key, |state: &mut CircuitState| {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
            if state.consecutive_failures >= threshold {
                state.opened_at_ms = Some(now_ms);
            }
            state.opened_at_ms.is_some()
        });
        match result {
            Ok(updated) if updated.value => {
                tracing::warn!(key = %self.key, "oracle circuit open");
            }
            Ok(_) => {}
            Err(error) => tracing::warn!(key = %self.key, %error, "failed to record oracle failure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::FsStateStore;
    use tempfile::TempDir;

    fn breaker(tmp: &TempDir) -> CircuitBreaker {
        let store = Arc::new(FsStateStore::new(
            tmp.path().join("state"),
            tmp.path().join("locks"),
        ));
        CircuitBreaker::new(store, "http", 3, 60)
    }

    #[test]
    fn opens_after_threshold_and_resets_after_cooldown() {
        let tmp = TempDir::new().expect("tempdir");
        let breaker = breaker(&tmp);
        breaker.record_failure(1_000);
        breaker.record_failure(2_000);
        assert!(!breaker.is_open(2_000));
        breaker.record_failure(3_000);
        assert!(breaker.is_open(3_000));
        assert!(breaker.is_open(62_999));
        assert!(!breaker.is_open(63_000));
    }

    #[test]
    fn success_closes_circuit() {
        let tmp = TempDir::new().expect("tempdir");
        let breaker = breaker(&tmp);
        for t in 0..3 {
            breaker.record_failure(t);
        }
        breaker.record_success();
        assert!(!breaker.is_open(10));
        breaker.record_failure(20);
        assert!(!breaker.is_open(20));
    }

    #[test]
    fn failed_trial_reopens() {
        let tmp = TempDir::new().expect("tempdir");
        let breaker = breaker(&tmp);
        for t in 0..3 {
            breaker.record_failure(t);
        }
        assert!(!breaker.is_open(70_000));
        breaker.record_failure(70_000);
        assert!(breaker.is_open(70_001));
    }

    #[test]
    fn state_survives_a_new_breaker_instance() {
        let tmp = TempDir::new().expect("tempdir");
        for t in 0..3 {
            breaker(&tmp).record_failure(t);
        }
        assert!(breaker(&tmp).is_open(5));
    }
}
