use std::{collections::HashMap, time::Instant};

use chrono::Utc;
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::{
    clients::{circuit_breaker::CircuitBreaker, rbmq::RabbitMqClient},
    config::Config,
    models::{
        circuit_breaker::CircuitState,
        health::{HealthCheckResponse, HealthStatus, ServiceHealth},
    },
};

pub struct HealthChecker {
    config: Config,
    rabbitmq: RabbitMqClient,
    news_feed_breaker: Option<CircuitBreaker>,
}

impl HealthChecker {
    pub fn new(
        config: Config,
        rabbitmq: RabbitMqClient,
        news_feed_breaker: Option<CircuitBreaker>,
    ) -> Self {
        Self {
            config,
            rabbitmq,
            news_feed_breaker,
        }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        let (broker_health, dead_letter_health) = self.check_rabbitmq().await;
        checks.insert("message_broker".to_string(), broker_health);
        if let Some(dead_letter_health) = dead_letter_health {
            checks.insert("dead_letter_queue".to_string(), dead_letter_health);
        }

        if self.config.redis_url.is_some() {
            checks.insert("cache_service".to_string(), self.check_redis().await);
        }

        if let Some(breaker) = &self.news_feed_breaker {
            checks.insert("news_feed".to_string(), Self::check_circuit_breaker(breaker));
        }

        HealthCheckResponse {
            status: determine_overall_status(&checks),
            timestamp: Utc::now(),
            checks,
        }
    }

    /// Inspecting the dead-letter queue doubles as the broker round-trip check.
    async fn check_rabbitmq(&self) -> (ServiceHealth, Option<ServiceHealth>) {
        let start = Instant::now();
        let dead_letter_queue = self.config.queue_names().dead_letter;

        match self.rabbitmq.queue_depth(&dead_letter_queue).await {
            Ok(depth) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "RabbitMQ health check passed");

                if depth > 0 {
                    warn!(queue = %dead_letter_queue, depth, "Undeliverable notifications in dead-letter queue");
                }

                (
                    ServiceHealth::healthy(elapsed),
                    Some(ServiceHealth::from_dead_letter_depth(depth, elapsed)),
                )
            }
            Err(e) => {
                warn!(error = %e, "RabbitMQ health check failed");
                (
                    ServiceHealth::unhealthy(format!("Broker check failed: {}", e)),
                    None,
                )
            }
        }
    }

    async fn check_redis(&self) -> ServiceHealth {
        let Some(redis_url) = self.config.redis_url.as_deref() else {
            return ServiceHealth::unhealthy("Redis is not configured".to_string());
        };

        let start = Instant::now();

        match redis::Client::open(redis_url) {
            Ok(client) => match client.get_multiplexed_async_connection().await {
                Ok(mut conn) => match conn.ping::<String>().await {
                    Ok(_) => {
                        let elapsed = start.elapsed().as_millis() as u64;
                        debug!(response_time_ms = elapsed, "Redis health check passed");
                        ServiceHealth::healthy(elapsed)
                    }
                    Err(e) => {
                        warn!(error = %e, "Redis ping failed");
                        ServiceHealth::unhealthy(format!("Ping failed: {}", e))
                    }
                },
                Err(e) => {
                    warn!(error = %e, "Redis connection failed");
                    ServiceHealth::unhealthy(format!("Connection failed: {}", e))
                }
            },
            Err(e) => {
                warn!(error = %e, "Redis client creation failed");
                ServiceHealth::unhealthy(format!("Client creation failed: {}", e))
            }
        }
    }

    fn check_circuit_breaker(breaker: &CircuitBreaker) -> ServiceHealth {
        let state = breaker.state();
        let state_str = state.as_str().to_string();

        debug!(
            service = breaker.service_name(),
            circuit_state = %state_str,
            "Circuit breaker state checked"
        );

        match state {
            CircuitState::Closed => ServiceHealth::healthy(0).with_circuit_breaker(state_str),
            CircuitState::HalfOpen => {
                ServiceHealth::degraded("Circuit breaker in recovery mode".to_string())
                    .with_circuit_breaker(state_str)
            }
            CircuitState::Open => {
                ServiceHealth::degraded("Serving empty results until the feed recovers".to_string())
                    .with_circuit_breaker(state_str)
            }
        }
    }
}

/// Only the broker is critical. Without the ledger deliveries still flow,
/// possibly duplicated, and the feed falls back to empty pages.
pub fn determine_overall_status(checks: &HashMap<String, ServiceHealth>) -> HealthStatus {
    let critical_unhealthy = checks
        .get("message_broker")
        .is_some_and(|health| health.status == HealthStatus::Unhealthy);

    let has_degraded = checks
        .values()
        .any(|health| health.status != HealthStatus::Healthy);

    if critical_unhealthy {
        HealthStatus::Unhealthy
    } else if has_degraded {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}
