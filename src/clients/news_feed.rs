use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use reqwest::{Client, header::USER_AGENT};
use tracing::{debug, info};

use crate::{
    clients::{
        circuit_breaker::CircuitBreaker,
        resilience::{FeedError, ResiliencePolicy},
    },
    config::Config,
    models::feed::NewsResponse,
};

pub const NEWS_FEED_SERVICE: &str = "news_api";

/// Client for the third-party news feed. Calls never fail; an unreachable
/// feed reads as a page with no articles.
pub struct NewsFeedClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    user_agent: String,
    policy: ResiliencePolicy,
}

impl NewsFeedClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        user_agent: impl Into<String>,
        timeout: Duration,
        policy: ResiliencePolicy,
    ) -> Result<Self, Error> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|_| anyhow!("Failed to create HTTP client"))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();

        info!(base_url = %base_url, "News feed client initialized");

        Ok(Self {
            http_client,
            base_url,
            api_key: api_key.into(),
            user_agent: user_agent.into(),
            policy,
        })
    }

    pub fn from_config(config: &Config, circuit_breaker: CircuitBreaker) -> Result<Self, Error> {
        let base_url = config
            .news_api_base_url
            .clone()
            .ok_or_else(|| anyhow!("NEWS_API_BASE_URL is not configured"))?;
        let api_key = config
            .news_api_key
            .clone()
            .ok_or_else(|| anyhow!("NEWS_API_KEY is not configured"))?;

        Self::new(
            base_url,
            api_key,
            config.news_api_user_agent.clone(),
            config.http_timeout(),
            ResiliencePolicy::new(config.retry_config(), circuit_breaker),
        )
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        self.policy.circuit_breaker()
    }

    pub async fn fetch_articles(&self, query: &str) -> NewsResponse {
        let url = format!("{}/v2/everything", self.base_url);

        debug!(query, "Fetching articles from news feed");

        self.policy
            .execute(|| self.fetch_once(&url, query), NewsResponse::empty)
            .await
    }

    async fn fetch_once(&self, url: &str, query: &str) -> Result<NewsResponse, FeedError> {
        let response = self
            .http_client
            .get(url)
            .query(&[("q", query)])
            .header("X-Api-Key", self.api_key.as_str())
            .header(USER_AGENT, self.user_agent.as_str())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status));
        }

        let news: NewsResponse = response.json().await?;

        debug!(
            article_count = news.articles.len(),
            total_results = news.total_results,
            "News feed responded"
        );

        Ok(news)
    }
}
