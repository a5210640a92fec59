use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use tracing::info;

use crate::{
    config::Config,
    models::{retry::RetryConfig, status::IdempotencyStatus},
    utils::retry_with_delay,
};

/// Redis record of which articles subscribers were already told about.
#[derive(Clone)]
pub struct DeliveryLedger {
    connection: MultiplexedConnection,
    ttl_seconds: u64,
    retry_config: RetryConfig,
}

impl DeliveryLedger {
    pub async fn connect(redis_url: &str, ttl_seconds: u64) -> Result<Self, Error> {
        info!("Connecting to Redis...");

        let client =
            Client::open(redis_url).map_err(|_| anyhow!("Failed to create redis client"))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|_| anyhow!("Failed to connect to redis client"))?;

        info!("Redis connection established");

        Ok(Self {
            connection,
            ttl_seconds,
            retry_config: RetryConfig {
                max_retries: 2,
                delay: Duration::from_millis(100),
            },
        })
    }

    pub async fn from_config(config: &Config) -> Result<Option<Self>, Error> {
        match &config.redis_url {
            Some(url) => Ok(Some(
                Self::connect(url, config.delivery_ledger_ttl_seconds).await?,
            )),
            None => Ok(None),
        }
    }

    fn key(article_id: &str) -> String {
        format!("notified:{}", article_id)
    }

    pub async fn check_delivery(&self, article_id: &str) -> Result<IdempotencyStatus, Error> {
        let mut connection = self.connection.clone();

        let value: Option<String> = connection
            .get(Self::key(article_id))
            .await
            .map_err(|e| anyhow!("Failed to get cached value: {}", e))?;

        match value.as_deref() {
            Some("sent") => Ok(IdempotencyStatus::Sent),
            _ => Ok(IdempotencyStatus::NotFound),
        }
    }

    pub async fn mark_as_sent(&self, article_id: &str) -> Result<(), Error> {
        let key = Self::key(article_id);

        retry_with_delay(
            &self.retry_config,
            |_| true,
            || {
                let key = key.clone();
                let mut connection = self.connection.clone();
                let ttl = self.ttl_seconds;

                async move {
                    connection
                        .set_ex::<_, _, ()>(&key, "sent", ttl)
                        .await
                        .map_err(|e| e.to_string())
                }
            },
        )
        .await
        .map_err(|e| anyhow!("mark_as_sent failed: {}", e))?;

        Ok(())
    }

    /// Forgets a delivery so the next copy of the article is sent again.
    pub async fn clear(&self, article_id: &str) -> Result<(), Error> {
        let mut connection = self.connection.clone();

        connection
            .del::<_, ()>(Self::key(article_id))
            .await
            .map_err(|e| anyhow!("Failed to clear delivery record: {}", e))?;

        Ok(())
    }
}
