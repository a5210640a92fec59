use std::{env, fs, path::Path, time::Duration};

use anyhow::{Error, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;

use crate::models::{
    circuit_breaker::CircuitBreakerConfig, queue::QueueNames, retry::RetryConfig,
};

const DEFAULT_CONFIG_FILE: &str = "notifier.toml";

/// Raw settings as read from one source. Environment variables and the
/// config file share this shape; environment values take precedence.
#[derive(Clone, Deserialize, Debug, Default)]
pub struct ConfigSource {
    pub rabbitmq_uri: Option<String>,
    pub rabbitmq_env: Option<String>,
    pub prefetch_count: Option<u16>,
    pub consumer_tag: Option<String>,

    pub redis_url: Option<String>,
    pub delivery_ledger_ttl_seconds: Option<u64>,

    pub notification_webhook_url: Option<String>,
    pub notification_from: Option<String>,
    pub notification_recipients: Option<Vec<String>>,

    pub news_api_base_url: Option<String>,
    pub news_api_key: Option<String>,
    pub news_api_user_agent: Option<String>,
    pub news_api_query: Option<String>,
    pub feed_poll_interval_seconds: Option<u64>,

    pub circuit_breaker_failure_threshold: Option<u32>,
    pub circuit_breaker_open_seconds: Option<u64>,

    pub retry_max_retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,

    pub http_timeout_seconds: Option<u64>,

    pub server_port: Option<u16>,
}

impl ConfigSource {
    pub fn from_env() -> Result<Self, Error> {
        envy::from_env::<Self>().map_err(|e| anyhow!("Invalid environmental variable: {}", e))
    }

    /// Reads the TOML config file. A missing file is an empty source.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path.display(), e))?;

        toml::from_str(&contents)
            .map_err(|e| anyhow!("Invalid config file {}: {}", path.display(), e))
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub rabbitmq_uri: String,
    pub rabbitmq_env: String,
    pub prefetch_count: u16,
    pub consumer_tag: String,

    pub redis_url: Option<String>,
    pub delivery_ledger_ttl_seconds: u64,

    pub notification_webhook_url: String,
    pub notification_from: String,
    pub notification_recipients: Vec<String>,

    pub news_api_base_url: Option<String>,
    pub news_api_key: Option<String>,
    pub news_api_user_agent: String,
    pub news_api_query: String,
    pub feed_poll_interval_seconds: u64,

    pub circuit_breaker_failure_threshold: u32,
    pub circuit_breaker_open_seconds: u64,

    pub retry_max_retries: u32,
    pub retry_delay_ms: u64,

    pub http_timeout_seconds: u64,

    pub server_port: u16,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        dotenv().ok();

        let path = env::var("NOTIFIER_CONFIG_FILE").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());
        let file = ConfigSource::from_file(Path::new(&path))?;
        let environment = ConfigSource::from_env()?;

        Self::resolve(environment, file)
    }

    /// Merges the environment over the config file and fills in defaults.
    pub fn resolve(env: ConfigSource, file: ConfigSource) -> Result<Self, Error> {
        let rabbitmq_uri = env
            .rabbitmq_uri
            .or(file.rabbitmq_uri)
            .ok_or_else(|| anyhow!("RABBITMQ_URI is not set in the environment or config file"))?;

        let rabbitmq_env = env
            .rabbitmq_env
            .or(file.rabbitmq_env)
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| anyhow!("RABBITMQ_ENV is not set in the environment or config file"))?;

        let notification_webhook_url = env
            .notification_webhook_url
            .or(file.notification_webhook_url)
            .ok_or_else(|| {
                anyhow!("NOTIFICATION_WEBHOOK_URL is not set in the environment or config file")
            })?;

        let recipients = env
            .notification_recipients
            .or(file.notification_recipients)
            .unwrap_or_default()
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();

        Ok(Self {
            rabbitmq_uri,
            rabbitmq_env,
            prefetch_count: env.prefetch_count.or(file.prefetch_count).unwrap_or(10),
            consumer_tag: env
                .consumer_tag
                .or(file.consumer_tag)
                .unwrap_or_else(|| "article_notifier".to_string()),
            redis_url: env.redis_url.or(file.redis_url),
            delivery_ledger_ttl_seconds: env
                .delivery_ledger_ttl_seconds
                .or(file.delivery_ledger_ttl_seconds)
                .unwrap_or(86_400),
            notification_webhook_url,
            notification_from: env
                .notification_from
                .or(file.notification_from)
                .unwrap_or_else(|| "news-aggregator@localhost".to_string()),
            notification_recipients: recipients,
            news_api_base_url: env.news_api_base_url.or(file.news_api_base_url),
            news_api_key: env.news_api_key.or(file.news_api_key),
            news_api_user_agent: env
                .news_api_user_agent
                .or(file.news_api_user_agent)
                .unwrap_or_else(|| format!("news-notifier/{}", env!("CARGO_PKG_VERSION"))),
            news_api_query: env
                .news_api_query
                .or(file.news_api_query)
                .unwrap_or_else(|| "technology".to_string()),
            feed_poll_interval_seconds: env
                .feed_poll_interval_seconds
                .or(file.feed_poll_interval_seconds)
                .unwrap_or(300),
            circuit_breaker_failure_threshold: env
                .circuit_breaker_failure_threshold
                .or(file.circuit_breaker_failure_threshold)
                .unwrap_or(3),
            circuit_breaker_open_seconds: env
                .circuit_breaker_open_seconds
                .or(file.circuit_breaker_open_seconds)
                .unwrap_or(30),
            retry_max_retries: env.retry_max_retries.or(file.retry_max_retries).unwrap_or(3),
            retry_delay_ms: env.retry_delay_ms.or(file.retry_delay_ms).unwrap_or(1_000),
            http_timeout_seconds: env
                .http_timeout_seconds
                .or(file.http_timeout_seconds)
                .unwrap_or(10),
            server_port: env.server_port.or(file.server_port).unwrap_or(8080),
        })
    }

    pub fn queue_names(&self) -> QueueNames {
        QueueNames::for_environment(&self.rabbitmq_env)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry_max_retries,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    pub fn circuit_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.circuit_breaker_failure_threshold,
            open_duration: Duration::from_secs(self.circuit_breaker_open_seconds),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }

    /// The feed poller only runs when both the base URL and API key are known.
    pub fn news_feed_enabled(&self) -> bool {
        self.news_api_base_url.is_some() && self.news_api_key.is_some()
    }
}
