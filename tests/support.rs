use std::{
    sync::{
        Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use anyhow::{Error, Result, anyhow};
use chrono::{TimeZone, Utc};
use news_notifier::{
    clients::{
        circuit_breaker::CircuitBreaker,
        news_feed::{NEWS_FEED_SERVICE, NewsFeedClient},
        notification::NotificationSink,
        publisher::EventPublisher,
        resilience::ResiliencePolicy,
    },
    models::{circuit_breaker::CircuitBreakerConfig, event::ArticlePublishedEvent, retry::RetryConfig},
};
use serde_json::json;
use wiremock::MockServer;

/// Records deliveries and fails any article whose title contains `fail_marker`.
#[derive(Default)]
pub struct RecordingSink {
    pub delivered: Mutex<Vec<ArticlePublishedEvent>>,
    pub attempts: AtomicU32,
    fail_marker: Option<String>,
}

impl RecordingSink {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Default::default()
        }
    }

    pub fn delivered_ids(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.id.clone())
            .collect()
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl NotificationSink for RecordingSink {
    async fn deliver(&self, event: &ArticlePublishedEvent) -> Result<(), Error> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(marker) = &self.fail_marker {
            if event.title.contains(marker.as_str()) {
                return Err(anyhow!("SMTP server unavailable"));
            }
        }

        self.delivered.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Collects published events instead of talking to a broker.
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<ArticlePublishedEvent>>,
    fail_marker: Option<String>,
}

impl RecordingPublisher {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            fail_marker: Some(marker.to_string()),
            ..Default::default()
        }
    }

    pub fn published_titles(&self) -> Vec<String> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.title.clone())
            .collect()
    }
}

impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &ArticlePublishedEvent) -> Result<(), Error> {
        if let Some(marker) = &self.fail_marker {
            if event.title.contains(marker.as_str()) {
                return Err(anyhow!("Broker connection lost"));
            }
        }

        self.published.lock().unwrap().push(event.clone());
        Ok(())
    }
}

pub fn sample_event(id: &str, title: &str) -> ArticlePublishedEvent {
    ArticlePublishedEvent::new(
        id,
        title,
        Some("d".to_string()),
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    )
}

pub const API_KEY: &str = "test-api-key";
pub const USER_AGENT: &str = "news-notifier-tests";

/// Feed client with a fast retry delay so failure paths finish quickly.
pub fn feed_client(server: &MockServer, open_duration: Duration) -> Result<NewsFeedClient> {
    let breaker = CircuitBreaker::new(
        NEWS_FEED_SERVICE,
        CircuitBreakerConfig {
            failure_threshold: 3,
            open_duration,
        },
    );
    let retry = RetryConfig {
        max_retries: 3,
        delay: Duration::from_millis(10),
    };

    NewsFeedClient::new(
        server.uri(),
        API_KEY,
        USER_AGENT,
        Duration::from_secs(5),
        ResiliencePolicy::new(retry, breaker),
    )
}

pub fn feed_page() -> serde_json::Value {
    json!({
        "status": "ok",
        "totalResults": 2,
        "articles": [
            {
                "title": "Async Rust in production",
                "description": "Lessons learned",
                "url": "https://news.example.com/async-rust",
                "publishedAt": "2025-01-01T08:00:00Z"
            },
            {
                "title": "Message queues 101",
                "url": "https://news.example.com/queues",
                "publishedAt": "2025-01-02T08:00:00Z"
            }
        ]
    })
}
