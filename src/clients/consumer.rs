use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use futures_util::StreamExt;
use tokio::{sync::watch, task::JoinSet};
use tracing::{debug, error, info, warn};

use crate::{
    clients::{notification::NotificationSink, rbmq::RabbitMqClient},
    models::status::DeliveryOutcome,
    utils::process_delivery,
};

/// Long-running worker draining the main queue into a [`NotificationSink`].
///
/// Handlers run concurrently up to the channel prefetch; each one settles
/// only its own delivery tag.
pub struct ArticleConsumer<S> {
    rabbitmq: RabbitMqClient,
    queue_name: String,
    consumer_tag: String,
    sink: Arc<S>,
}

impl<S: NotificationSink + 'static> ArticleConsumer<S> {
    pub fn new(
        rabbitmq: RabbitMqClient,
        queue_name: impl Into<String>,
        consumer_tag: impl Into<String>,
        sink: S,
    ) -> Self {
        Self {
            rabbitmq,
            queue_name: queue_name.into(),
            consumer_tag: consumer_tag.into(),
            sink: Arc::new(sink),
        }
    }

    /// Consumes until `shutdown` flips to `true`, then waits for in-flight
    /// handlers. A broken consumer stream is returned as an error so the
    /// process can exit and be restarted by its supervisor.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<(), Error> {
        let mut consumer = self
            .rabbitmq
            .create_consumer(&self.queue_name, &self.consumer_tag)
            .await?;

        let mut in_flight = JoinSet::new();

        info!(queue = %self.queue_name, "Article consumer started");

        let result = loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown requested, no longer accepting deliveries");
                        break Ok(());
                    }
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "Delivery handler panicked");
                    }
                }
                delivery = consumer.next() => match delivery {
                    Some(Ok(delivery)) => {
                        let rabbitmq = self.rabbitmq.clone();
                        let sink = Arc::clone(&self.sink);

                        in_flight.spawn(async move {
                            let delivery_tag = delivery.delivery_tag;
                            debug!(delivery_tag, redelivered = delivery.redelivered, "Delivery received");

                            let outcome = process_delivery(&delivery.data, sink.as_ref()).await;
                            settle(&rabbitmq, delivery_tag, &outcome).await;
                        });
                    }
                    Some(Err(e)) => break Err(anyhow!("RabbitMQ consumer failed: {}", e)),
                    None => break Err(anyhow!("RabbitMQ consumer stream closed")),
                },
            }
        };

        if result.is_ok() {
            if let Err(e) = self.rabbitmq.cancel_consumer(&self.consumer_tag).await {
                warn!(error = %e, "Failed to cancel consumer");
            }
        }

        let pending = in_flight.len();
        if pending > 0 {
            info!(pending, "Waiting for in-flight deliveries");
        }

        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Delivery handler panicked");
            }
        }

        info!(queue = %self.queue_name, "Article consumer stopped");

        result
    }
}

async fn settle(rabbitmq: &RabbitMqClient, delivery_tag: u64, outcome: &DeliveryOutcome) {
    let disposition = outcome.disposition();

    match rabbitmq.settle(delivery_tag, disposition).await {
        Ok(()) => debug!(delivery_tag, outcome = %outcome, ?disposition, "Delivery settled"),
        // The broker redelivers unsettled messages once the channel goes away.
        Err(e) => error!(delivery_tag, error = %e, "Failed to settle delivery"),
    }
}
