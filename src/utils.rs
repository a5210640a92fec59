use std::{fmt::Display, future::Future};

use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{
    clients::notification::NotificationSink,
    models::{event::ArticlePublishedEvent, retry::RetryConfig, status::DeliveryOutcome},
};

/// Decodes one main-queue payload and hands it to the sink.
///
/// Never fails: the outcome decides whether the delivery is acked or
/// rejected into the retry chain.
pub async fn process_delivery<S: NotificationSink>(payload: &[u8], sink: &S) -> DeliveryOutcome {
    let event = match serde_json::from_slice::<ArticlePublishedEvent>(payload) {
        Ok(event) => event,
        Err(e) => {
            warn!(
                error = %e,
                payload_bytes = payload.len(),
                "Dropping malformed article event"
            );
            return DeliveryOutcome::Poison(format!("Malformed envelope: {}", e));
        }
    };

    if !event.is_deliverable() {
        warn!(article_id = %event.id, "Dropping article event without a title");
        return DeliveryOutcome::Poison("Envelope has no title".to_string());
    }

    info!(
        article_id = %event.id,
        title = %event.title,
        "Processing article notification"
    );

    match sink.deliver(&event).await {
        Ok(()) => {
            info!(article_id = %event.id, "Article notification delivered");
            DeliveryOutcome::Delivered
        }
        Err(e) => {
            warn!(
                article_id = %event.id,
                error = %e,
                "Article notification failed, handing message to the retry chain"
            );
            DeliveryOutcome::Failed(e.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum RetryError<E> {
    #[error("retries exhausted after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    /// The error was not worth retrying.
    #[error("{0}")]
    Aborted(E),
}

impl<E> RetryError<E> {
    pub fn into_inner(self) -> E {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Aborted(e) => e,
        }
    }
}

/// Runs `operation` until it succeeds, `should_retry` rejects the error, or
/// the retry budget runs out. Attempts are spaced by a fixed delay.
pub async fn retry_with_delay<F, Fut, T, E, P>(
    config: &RetryConfig,
    should_retry: P,
    operation: F,
) -> Result<T, RetryError<E>>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    info!(attempt, max_attempts, "Retry succeeded");
                }
                return Ok(result);
            }
            Err(e) if !should_retry(&e) => {
                debug!(attempt, error = %e, "Error is not retryable, giving up");
                return Err(RetryError::Aborted(e));
            }
            Err(e) => {
                if attempt >= max_attempts {
                    warn!(
                        max_attempts,
                        error = %e,
                        "Retry failed after exhausting all attempts"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        last: e,
                    });
                }

                debug!(
                    attempt,
                    max_attempts,
                    delay_ms = config.delay.as_millis() as u64,
                    error = %e,
                    "Retry attempt failed, waiting before next attempt"
                );

                sleep(config.delay).await;
            }
        }
    }
}
