use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::models::circuit_breaker::{CircuitBreakerConfig, CircuitState};

/// Returned instead of running the operation while the breaker is open.
#[derive(Debug, Clone, Error)]
#[error("circuit breaker is open for {service}")]
pub struct CircuitOpen {
    pub service: String,
}

#[derive(Debug)]
struct BreakerState {
    circuit: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Process-wide breaker for one downstream service. Clones share state.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    service_name: Arc<str>,
    config: CircuitBreakerConfig,
    state: Arc<Mutex<BreakerState>>,
}

impl CircuitBreaker {
    pub fn new(service_name: &str, config: CircuitBreakerConfig) -> Self {
        info!(
            service = %service_name,
            failure_threshold = config.failure_threshold,
            open_seconds = config.open_duration.as_secs(),
            "Circuit breaker initialized"
        );

        Self {
            service_name: Arc::from(service_name),
            config,
            state: Arc::new(Mutex::new(BreakerState {
                circuit: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
            })),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn state(&self) -> CircuitState {
        self.lock().circuit
    }

    /// Runs `operation` if the breaker admits it and records the outcome.
    ///
    /// A call dropped before it completes counts as a failure, so an
    /// abandoned half-open trial reopens the breaker instead of wedging it.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpen>,
    {
        let permit = self.acquire()?;

        match operation().await {
            Ok(result) => {
                permit.succeed();
                Ok(result)
            }
            Err(e) => {
                permit.fail();
                Err(e)
            }
        }
    }

    fn acquire(&self) -> Result<CallPermit<'_>, CircuitOpen> {
        let mut state = self.lock();

        match state.circuit {
            CircuitState::Closed => Ok(CallPermit::new(self)),
            CircuitState::Open => {
                let cooled_down = state
                    .opened_at
                    .is_none_or(|opened_at| opened_at.elapsed() >= self.config.open_duration);

                if cooled_down {
                    info!(service = %self.service_name, "Circuit breaker half-open, admitting trial call");
                    state.circuit = CircuitState::HalfOpen;
                    state.trial_in_flight = true;
                    Ok(CallPermit::new(self))
                } else {
                    warn!(service = %self.service_name, "Circuit breaker is open, rejecting request");
                    Err(self.open_error())
                }
            }
            CircuitState::HalfOpen => {
                if state.trial_in_flight {
                    debug!(service = %self.service_name, "Trial call already in flight, rejecting request");
                    Err(self.open_error())
                } else {
                    state.trial_in_flight = true;
                    Ok(CallPermit::new(self))
                }
            }
        }
    }

    fn record_success(&self) {
        let mut state = self.lock();

        if state.circuit == CircuitState::HalfOpen {
            info!(service = %self.service_name, "Circuit breaker closed after successful trial");
        }

        state.circuit = CircuitState::Closed;
        state.consecutive_failures = 0;
        state.opened_at = None;
        state.trial_in_flight = false;
    }

    fn record_failure(&self) {
        let mut state = self.lock();

        match state.circuit {
            CircuitState::HalfOpen => {
                state.circuit = CircuitState::Open;
                state.opened_at = Some(Instant::now());
                state.trial_in_flight = false;
                warn!(service = %self.service_name, "Circuit breaker reopened after failed trial");
            }
            CircuitState::Closed => {
                state.consecutive_failures += 1;
                debug!(
                    service = %self.service_name,
                    failures = state.consecutive_failures,
                    threshold = self.config.failure_threshold,
                    "Circuit breaker failure recorded"
                );

                if state.consecutive_failures >= self.config.failure_threshold {
                    state.circuit = CircuitState::Open;
                    state.opened_at = Some(Instant::now());
                    warn!(
                        service = %self.service_name,
                        failures = state.consecutive_failures,
                        open_seconds = self.config.open_duration.as_secs(),
                        "Circuit breaker opened due to consecutive failures"
                    );
                }
            }
            // Another caller already tripped it.
            CircuitState::Open => {}
        }
    }

    fn open_error(&self) -> CircuitOpen {
        CircuitOpen {
            service: self.service_name.to_string(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One admitted call. Settles as a failure if dropped unsettled.
struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl<'a> CallPermit<'a> {
    fn new(breaker: &'a CircuitBreaker) -> Self {
        Self {
            breaker,
            settled: false,
        }
    }

    fn succeed(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    fn fail(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            debug!(service = %self.breaker.service_name, "Call abandoned before completing");
            self.breaker.record_failure();
        }
    }
}
