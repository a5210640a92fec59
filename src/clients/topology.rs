use std::collections::HashSet;

use anyhow::{Error, Result, anyhow};
use lapin::{
    Channel, Connection, ErrorKind,
    options::QueueDeclareOptions,
    protocol::{AMQPErrorKind, AMQPSoftError},
};
use tracing::{error, info, warn};

use crate::models::queue::{QueueNames, QueueSpec, RETRY_QUEUE_TTL_MS};

/// How a single queue declaration went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclareOutcome {
    Declared,
    /// The queue already exists with other arguments; the existing one is kept.
    PreconditionConflict,
}

/// The main → retry-1 → retry-2 → dead-letter queue chain.
///
/// Rejected messages leave the main queue for retry-1; each retry queue
/// expires them into the next hop after its TTL. The dead-letter queue is
/// terminal.
#[derive(Debug, Clone)]
pub struct QueueTopology {
    names: QueueNames,
}

impl QueueTopology {
    pub fn new(names: QueueNames) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &QueueNames {
        &self.names
    }

    /// Queue declarations, dead-letter targets before the queues that feed them.
    pub fn plan(&self) -> Vec<QueueSpec> {
        let names = &self.names;

        vec![
            QueueSpec::terminal(&names.dead_letter),
            QueueSpec::dead_lettering_to(&names.retry_2, &names.dead_letter)
                .with_message_ttl(RETRY_QUEUE_TTL_MS),
            QueueSpec::dead_lettering_to(&names.retry_1, &names.retry_2)
                .with_message_ttl(RETRY_QUEUE_TTL_MS),
            QueueSpec::dead_lettering_to(&names.news_published, &names.retry_1),
        ]
    }

    /// Follows dead-letter routing from the main queue to the terminal queue.
    ///
    /// Errors if a hop points at an undeclared queue or revisits a queue.
    pub fn dead_letter_path(&self) -> Result<Vec<String>, Error> {
        let plan = self.plan();
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        let mut current = self.names.news_published.clone();

        loop {
            if !visited.insert(current.clone()) {
                return Err(anyhow!("Dead-letter routing revisits queue {}", current));
            }

            let spec = plan
                .iter()
                .find(|spec| spec.name == current)
                .ok_or_else(|| anyhow!("Dead-letter target {} is not declared", current))?;

            path.push(current.clone());

            match &spec.dead_letter_routing_key {
                Some(next) => current = next.clone(),
                None => return Ok(path),
            }
        }
    }

    /// Declares every queue in [`plan`](Self::plan) order.
    ///
    /// A queue that already exists with different arguments is logged and
    /// skipped. Any other failure aborts.
    pub async fn declare(&self, connection: &Connection) -> Result<Vec<DeclareOutcome>, Error> {
        let path = self.dead_letter_path()?;
        if path.len() != 4 {
            return Err(anyhow!(
                "Queue chain must have 4 queues, found {}: {:?}",
                path.len(),
                path
            ));
        }

        let mut channel = open_channel(connection).await?;
        let mut outcomes = Vec::with_capacity(path.len());

        for spec in self.plan() {
            info!(
                queue = %spec.name,
                dead_letter_routing_key = ?spec.dead_letter_routing_key,
                message_ttl_ms = ?spec.message_ttl_ms,
                "Declaring queue"
            );

            let result = channel
                .queue_declare(
                    &spec.name,
                    QueueDeclareOptions {
                        durable: true,
                        exclusive: false,
                        auto_delete: false,
                        ..Default::default()
                    },
                    spec.arguments(),
                )
                .await;

            match result {
                Ok(_) => outcomes.push(DeclareOutcome::Declared),
                Err(e) if is_precondition_failure(&e) => {
                    warn!(
                        queue = %spec.name,
                        error = %e,
                        "Queue already exists with different properties, skipping declaration"
                    );
                    // The broker closes the channel on a 406.
                    channel = open_channel(connection).await?;
                    outcomes.push(DeclareOutcome::PreconditionConflict);
                }
                Err(e) => {
                    error!(queue = %spec.name, error = %e, "Error declaring RabbitMQ queue");
                    return Err(anyhow!("Failed to declare queue {}: {}", spec.name, e));
                }
            }
        }

        let _ = channel.close(200, "OK").await;

        info!("RabbitMQ queues declared");

        Ok(outcomes)
    }
}

async fn open_channel(connection: &Connection) -> Result<Channel, Error> {
    connection
        .create_channel()
        .await
        .map_err(|e| anyhow!("RabbitMQ channel creation failed: {}", e))
}

/// Whether a broker error is the 406 reply to an inequivalent redeclaration.
pub fn is_precondition_failure(error: &lapin::Error) -> bool {
    match error.kind() {
        ErrorKind::ProtocolError(amqp_error) => matches!(
            amqp_error.kind(),
            AMQPErrorKind::Soft(AMQPSoftError::PRECONDITIONFAILED)
        ),
        _ => false,
    }
}
