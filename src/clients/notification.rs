use std::{future::Future, time::Duration};

use anyhow::{Error, Result, anyhow};
use reqwest::Client;
use tracing::{debug, info, warn};

use crate::{
    clients::redis::DeliveryLedger,
    config::Config,
    models::{
        event::ArticlePublishedEvent, notification::EmailNotification, status::IdempotencyStatus,
    },
};

/// Something that can tell subscribers about a new article.
///
/// Deliveries are at-least-once, so implementations may see the same
/// article more than once.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, event: &ArticlePublishedEvent) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Sends article announcements through an HTTP mail relay.
pub struct HttpNotificationSink {
    http_client: Client,
    webhook_url: String,
    from: String,
    recipients: Vec<String>,
}

impl HttpNotificationSink {
    pub fn new(
        webhook_url: impl Into<String>,
        from: impl Into<String>,
        recipients: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        let webhook_url = webhook_url.into();

        info!(
            webhook_url = %webhook_url,
            recipient_count = recipients.len(),
            "Notification sink initialized"
        );

        Ok(Self {
            http_client,
            webhook_url,
            from: from.into(),
            recipients,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, Error> {
        Self::new(
            config.notification_webhook_url.clone(),
            config.notification_from.clone(),
            config.notification_recipients.clone(),
            config.http_timeout(),
        )
    }
}

impl NotificationSink for HttpNotificationSink {
    async fn deliver(&self, event: &ArticlePublishedEvent) -> Result<(), Error> {
        if self.recipients.is_empty() {
            warn!(article_id = %event.id, "No notification recipients configured, skipping");
            return Ok(());
        }

        let notification = EmailNotification::for_article(event, &self.from, &self.recipients);

        debug!(
            article_id = %event.id,
            subject = %notification.subject,
            "Sending article notification"
        );

        let response = self
            .http_client
            .post(&self.webhook_url)
            .json(&notification)
            .send()
            .await
            .map_err(|e| anyhow!("Mail relay request failed: {}", e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let error_text = response.text().await.unwrap_or_default();
            Err(anyhow!("Mail relay returned {}: {}", status, error_text))
        }
    }
}

/// Skips articles the ledger already marks as notified.
///
/// Without a ledger, or while the ledger is unreachable, every delivery goes
/// through; a duplicate email is preferable to a missing one.
pub struct IdempotentSink<S> {
    inner: S,
    ledger: Option<DeliveryLedger>,
}

impl<S: NotificationSink> IdempotentSink<S> {
    pub fn new(inner: S, ledger: Option<DeliveryLedger>) -> Self {
        Self { inner, ledger }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: NotificationSink> NotificationSink for IdempotentSink<S> {
    async fn deliver(&self, event: &ArticlePublishedEvent) -> Result<(), Error> {
        let ledger = self.ledger.as_ref().filter(|_| !event.id.is_empty());

        if let Some(ledger) = ledger {
            match ledger.check_delivery(&event.id).await {
                Ok(IdempotencyStatus::Sent) => {
                    info!(article_id = %event.id, "Article already notified, skipping");
                    return Ok(());
                }
                Ok(IdempotencyStatus::NotFound) => {}
                Err(e) => {
                    warn!(article_id = %event.id, error = %e, "Delivery ledger unavailable");
                }
            }
        }

        self.inner.deliver(event).await?;

        if let Some(ledger) = ledger {
            if let Err(e) = ledger.mark_as_sent(&event.id).await {
                warn!(article_id = %event.id, error = %e, "Failed to record delivery");
            }
        }

        Ok(())
    }
}
