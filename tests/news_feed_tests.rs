use std::time::Duration;

use anyhow::Result;
use news_notifier::models::circuit_breaker::CircuitState;
use tokio::time::sleep;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

use crate::support::{API_KEY, USER_AGENT, feed_client, feed_page};

async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or_default()
}

/// Test: Feed requests carry the query, API key and user agent
#[tokio::test]
async fn test_fetch_articles_success() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .and(query_param("q", "technology"))
        .and(header("X-Api-Key", API_KEY))
        .and(header("User-Agent", USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_json(feed_page()))
        .expect(1)
        .mount(&server)
        .await;

    let client = feed_client(&server, Duration::from_secs(30))?;

    let response = client.fetch_articles("technology").await;

    assert_eq!(response.total_results, 2);
    assert_eq!(response.articles.len(), 2);
    assert_eq!(
        response.articles[0].title.as_deref(),
        Some("Async Rust in production")
    );
    assert_eq!(client.circuit_breaker().state(), CircuitState::Closed);

    Ok(())
}

/// Test: A failing feed is tried three times, then an empty page is returned
#[tokio::test]
async fn test_failing_feed_falls_back_to_empty() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = feed_client(&server, Duration::from_secs(30))?;

    let response = client.fetch_articles("technology").await;

    assert!(response.is_empty());
    assert_eq!(request_count(&server).await, 3);
    assert_eq!(client.circuit_breaker().state(), CircuitState::Open);

    let response = client.fetch_articles("technology").await;

    assert!(response.is_empty());
    assert_eq!(request_count(&server).await, 3, "open breaker must not reach the feed");

    Ok(())
}

/// Test: Unparseable feed bodies count as failures
#[tokio::test]
async fn test_malformed_feed_body_falls_back_to_empty() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = feed_client(&server, Duration::from_secs(30))?;

    let response = client.fetch_articles("technology").await;

    assert!(response.is_empty());
    assert_eq!(client.circuit_breaker().state(), CircuitState::Open);

    Ok(())
}

/// Test: A transient outage recovered within the retries returns real articles
#[tokio::test]
async fn test_transient_failure_is_retried() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .respond_with(ResponseTemplate::new(200).set_body_json(feed_page()))
        .mount(&server)
        .await;

    let client = feed_client(&server, Duration::from_secs(30))?;

    let response = client.fetch_articles("technology").await;

    assert_eq!(response.articles.len(), 2);
    assert_eq!(request_count(&server).await, 2);
    assert_eq!(client.circuit_breaker().state(), CircuitState::Closed);

    Ok(())
}

/// Test: Once the open period passes, a trial request closes the breaker
#[tokio::test]
async fn test_breaker_recovers_after_open_period() -> Result<()> {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = feed_client(&server, Duration::from_millis(200))?;

    assert!(client.fetch_articles("technology").await.is_empty());
    assert_eq!(client.circuit_breaker().state(), CircuitState::Open);

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/v2/everything"))
        .respond_with(ResponseTemplate::new(200).set_body_json(feed_page()))
        .mount(&server)
        .await;

    sleep(Duration::from_millis(300)).await;

    let response = client.fetch_articles("technology").await;

    assert_eq!(response.articles.len(), 2);
    assert_eq!(client.circuit_breaker().state(), CircuitState::Closed);

    Ok(())
}
