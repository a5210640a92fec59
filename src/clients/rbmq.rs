use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use lapin::{
    Channel, Connection, ConnectionProperties, Consumer,
    options::{
        BasicAckOptions, BasicCancelOptions, BasicConsumeOptions, BasicQosOptions,
        BasicRejectOptions, QueueDeclareOptions,
    },
    types::FieldTable,
};
use tracing::{debug, info};

use crate::{config::Config, models::status::Disposition};

/// Shared broker connection plus the long-lived channel the consumer uses.
#[derive(Clone)]
pub struct RabbitMqClient {
    connection: Arc<Connection>,
    channel: Channel,
}

impl RabbitMqClient {
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        Self::connect_with_prefetch(&config.rabbitmq_uri, config.prefetch_count).await
    }

    pub async fn connect_with_prefetch(uri: &str, prefetch_count: u16) -> Result<Self, Error> {
        info!("Connecting to RabbitMQ...");

        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(|e| anyhow!("Failed to connect to RabbitMQ: {}", e))?;

        info!("RabbitMQ connection established");

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| anyhow!("RabbitMQ channel creation failed: {}", e))?;

        channel
            .basic_qos(prefetch_count, BasicQosOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to set up QoS: {}", e))?;

        debug!(prefetch_count, "Prefetch count set");

        Ok(Self {
            connection: Arc::new(connection),
            channel,
        })
    }

    pub fn connection(&self) -> Arc<Connection> {
        Arc::clone(&self.connection)
    }

    pub async fn create_consumer(&self, queue_name: &str, consumer_tag: &str) -> Result<Consumer, Error> {
        let consumer = self
            .channel
            .basic_consume(
                queue_name,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to create consumer: {}", e))?;

        info!(queue = %queue_name, consumer_tag, "Consumer created for queue");

        Ok(consumer)
    }

    pub async fn cancel_consumer(&self, consumer_tag: &str) -> Result<(), Error> {
        self.channel
            .basic_cancel(consumer_tag, BasicCancelOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to cancel consumer: {}", e))?;

        Ok(())
    }

    pub async fn acknowledge(&self, delivery_tag: u64) -> Result<(), Error> {
        self.channel
            .basic_ack(delivery_tag, BasicAckOptions::default())
            .await
            .map_err(|e| anyhow!("Failed to acknowledge message: {}", e))?;

        Ok(())
    }

    pub async fn reject(&self, delivery_tag: u64, requeue: bool) -> Result<(), Error> {
        self.channel
            .basic_reject(delivery_tag, BasicRejectOptions { requeue })
            .await
            .map_err(|e| anyhow!("Failed to reject message: {}", e))?;

        Ok(())
    }

    /// Acks or dead-letters a delivery. Rejections never requeue, so the
    /// broker routes them to the queue's dead-letter target.
    pub async fn settle(&self, delivery_tag: u64, disposition: Disposition) -> Result<(), Error> {
        match disposition {
            Disposition::Ack => self.acknowledge(delivery_tag).await,
            Disposition::Reject => self.reject(delivery_tag, false).await,
        }
    }

    /// Ready-message count of an existing queue.
    pub async fn queue_depth(&self, queue_name: &str) -> Result<u32, Error> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| anyhow!("RabbitMQ channel creation failed: {}", e))?;

        let queue = channel
            .queue_declare(
                queue_name,
                QueueDeclareOptions {
                    passive: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| anyhow!("Failed to inspect queue {}: {}", queue_name, e))?;

        let _ = channel.close(200, "OK").await;

        Ok(queue.message_count())
    }
}
