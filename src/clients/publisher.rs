use std::{future::Future, sync::Arc};

use anyhow::{Error, Result, anyhow};
use chrono::Utc;
use lapin::{BasicProperties, Connection, options::BasicPublishOptions};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{event::ArticlePublishedEvent, queue::DEFAULT_EXCHANGE};

const PERSISTENT: u8 = 2;

/// Anything that can put an [`ArticlePublishedEvent`] on its way to subscribers.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: &ArticlePublishedEvent) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Publishes article events to the main queue through the default exchange.
///
/// Each call opens and closes its own channel on the shared connection.
/// Publisher confirms are not awaited.
pub struct ArticleEventPublisher {
    connection: Arc<Connection>,
    routing_key: String,
}

impl ArticleEventPublisher {
    pub fn new(connection: Arc<Connection>, main_queue_name: impl Into<String>) -> Self {
        Self {
            connection,
            routing_key: main_queue_name.into(),
        }
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }
}

impl EventPublisher for ArticleEventPublisher {
    async fn publish(&self, event: &ArticlePublishedEvent) -> Result<(), Error> {
        let payload = event.to_payload()?;

        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| anyhow!("RabbitMQ channel creation failed: {}", e))?;

        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT)
            .with_content_type("application/json".into())
            .with_message_id(Uuid::new_v4().to_string().into())
            .with_timestamp(Utc::now().timestamp() as u64);

        let published = channel
            .basic_publish(
                DEFAULT_EXCHANGE,
                &self.routing_key,
                BasicPublishOptions::default(),
                &payload,
                properties,
            )
            .await;

        let _ = channel.close(200, "OK").await;

        published.map_err(|e| anyhow!("Failed to publish article event: {}", e))?;

        debug!(queue = %self.routing_key, "Article event handed to broker");

        info!(article_id = %event.id, "Article published event sent");

        Ok(())
    }
}
