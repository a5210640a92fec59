use std::future::Future;

use reqwest::StatusCode;
use thiserror::Error;
use tracing::warn;

use crate::{
    clients::circuit_breaker::{CircuitBreaker, CircuitOpen},
    models::retry::RetryConfig,
    utils::{RetryError, retry_with_delay},
};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request to news feed failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("news feed returned status {0}")]
    Status(StatusCode),

    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpen),

    #[error("news feed still failing after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<FeedError> },
}

impl FeedError {
    /// An open breaker fails fast; retrying it would only burn the delay.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FeedError::Transport(_) | FeedError::Status(_))
    }
}

/// Fallback, retry and circuit breaker composed around one outbound call.
///
/// Each retry attempt goes through the breaker on its own, so the breaker
/// counts real attempts rather than whole retried calls.
#[derive(Debug, Clone)]
pub struct ResiliencePolicy {
    retry_config: RetryConfig,
    circuit_breaker: CircuitBreaker,
}

impl ResiliencePolicy {
    pub fn new(retry_config: RetryConfig, circuit_breaker: CircuitBreaker) -> Self {
        Self {
            retry_config,
            circuit_breaker,
        }
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Retry around the breaker, without the fallback.
    pub async fn try_execute<F, Fut, T>(&self, operation: F) -> Result<T, FeedError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, FeedError>>,
    {
        retry_with_delay(&self.retry_config, FeedError::is_retryable, || {
            self.circuit_breaker.call(&operation)
        })
        .await
        .map_err(|e| match e {
            RetryError::Exhausted { attempts, last } => FeedError::RetriesExhausted {
                attempts,
                last: Box::new(last),
            },
            RetryError::Aborted(e) => e,
        })
    }

    /// Like [`try_execute`](Self::try_execute), but any failure is swapped
    /// for the value produced by `fallback`.
    pub async fn execute<F, Fut, T, D>(&self, operation: F, fallback: D) -> T
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, FeedError>>,
        D: FnOnce() -> T,
    {
        match self.try_execute(operation).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    service = %self.circuit_breaker.service_name(),
                    error = %e,
                    "Executing fallback"
                );
                fallback()
            }
        }
    }
}
