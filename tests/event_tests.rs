use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use news_notifier::models::{
    event::ArticlePublishedEvent,
    feed::{FeedArticle, NewsResponse},
};
use serde_json::{Value, json};

use crate::support::sample_event;

/// Test: Envelope survives a trip through the wire format unchanged
#[tokio::test]
async fn test_event_round_trip_preserves_fields() -> Result<()> {
    let original = sample_event("a1", "Rust 2024 released");

    let payload = original.to_payload()?;
    let decoded: ArticlePublishedEvent = serde_json::from_slice(&payload)?;

    assert_eq!(decoded, original);

    Ok(())
}

/// Test: Wire format uses the camelCase field names consumers expect
#[tokio::test]
async fn test_event_wire_field_names() -> Result<()> {
    let event = sample_event("a1", "fail-test");

    let value: Value = serde_json::from_slice(&event.to_payload()?)?;

    assert_eq!(value["id"], "a1");
    assert_eq!(value["title"], "fail-test");
    assert_eq!(value["description"], "d");
    assert_eq!(value["publishedAt"], "2025-01-01T00:00:00Z");

    Ok(())
}

/// Test: Missing optional fields fall back to safe defaults
#[tokio::test]
async fn test_missing_fields_use_defaults() -> Result<()> {
    let decoded: ArticlePublishedEvent = serde_json::from_str(r#"{"title":"Only a title"}"#)?;

    assert_eq!(decoded.id, "");
    assert_eq!(decoded.title, "Only a title");
    assert_eq!(decoded.description, None);
    assert_eq!(decoded.published_at, DateTime::<Utc>::default());
    assert!(decoded.is_deliverable());

    Ok(())
}

/// Test: Unknown fields from newer producers are ignored
#[tokio::test]
async fn test_unknown_fields_are_tolerated() -> Result<()> {
    let payload = json!({
        "id": "a2",
        "title": "Broker upgrade",
        "publishedAt": "2025-03-04T05:06:07Z",
        "author": "ops",
        "schemaVersion": 7
    });

    let decoded: ArticlePublishedEvent = serde_json::from_value(payload)?;

    assert_eq!(decoded.id, "a2");
    assert_eq!(
        decoded.published_at,
        Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap()
    );

    Ok(())
}

/// Test: PascalCase payloads from the legacy producers still decode
#[tokio::test]
async fn test_pascal_case_payload_decodes() -> Result<()> {
    let payload = r#"{"Id":"a3","Title":"Legacy","Description":null,"PublishedAt":"2025-01-01T00:00:00Z"}"#;

    let decoded: ArticlePublishedEvent = serde_json::from_str(payload)?;

    assert_eq!(decoded.id, "a3");
    assert_eq!(decoded.title, "Legacy");
    assert_eq!(decoded.description, None);

    Ok(())
}

/// Test: Whitespace-only titles are not deliverable
#[tokio::test]
async fn test_blank_title_is_not_deliverable() -> Result<()> {
    let event = sample_event("a4", "   ");

    assert!(!event.is_deliverable());

    Ok(())
}

/// Test: Feed articles become events keyed by their URL
#[tokio::test]
async fn test_event_from_feed_article() -> Result<()> {
    let article = FeedArticle {
        title: Some("  Circuit breakers explained ".to_string()),
        description: Some("Why fail fast".to_string()),
        url: Some("https://news.example.com/breakers".to_string()),
        published_at: Some(Utc.with_ymd_and_hms(2025, 2, 1, 12, 0, 0).unwrap()),
        ..Default::default()
    };

    let event = ArticlePublishedEvent::from_feed_article(&article).expect("titled article");

    assert_eq!(event.id, "https://news.example.com/breakers");
    assert_eq!(event.title, "Circuit breakers explained");
    assert_eq!(event.description.as_deref(), Some("Why fail fast"));
    assert_eq!(event.published_at, article.published_at.unwrap());

    let untitled = FeedArticle {
        url: Some("https://news.example.com/untitled".to_string()),
        ..Default::default()
    };
    assert!(ArticlePublishedEvent::from_feed_article(&untitled).is_none());

    let without_url = FeedArticle {
        title: Some("No link".to_string()),
        ..Default::default()
    };
    let event = ArticlePublishedEvent::from_feed_article(&without_url).expect("titled article");
    assert!(!event.id.is_empty());

    Ok(())
}

/// Test: News feed documents decode, including sparse articles
#[tokio::test]
async fn test_news_response_decoding() -> Result<()> {
    let payload = json!({
        "status": "ok",
        "totalResults": 2,
        "articles": [
            {
                "source": { "id": null, "name": "Example" },
                "author": "A. Writer",
                "title": "First",
                "url": "https://news.example.com/1",
                "urlToImage": "https://news.example.com/1.png",
                "publishedAt": "2025-01-01T00:00:00Z"
            },
            { "title": "Second" }
        ]
    });

    let response: NewsResponse = serde_json::from_value(payload)?;

    assert_eq!(response.total_results, 2);
    assert_eq!(response.articles.len(), 2);
    assert_eq!(
        response.articles[0].source.as_ref().and_then(|s| s.name.as_deref()),
        Some("Example")
    );
    assert_eq!(
        response.articles[0].url_to_image.as_deref(),
        Some("https://news.example.com/1.png")
    );
    assert!(response.articles[1].published_at.is_none());

    let empty: NewsResponse = serde_json::from_str(r#"{"articles":[]}"#)?;
    assert_eq!(empty, NewsResponse::empty());

    Ok(())
}

/// Test: Timestamps without a UTC offset are read as UTC
#[tokio::test]
async fn test_offsetless_timestamp_is_utc() -> Result<()> {
    let payload = r#"{"Id":"a5","Title":"Legacy","Description":"d","PublishedAt":"2025-01-01T00:00:00"}"#;
    let decoded: ArticlePublishedEvent = serde_json::from_str(payload)?;
    assert_eq!(decoded.published_at, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());

    let payload = r#"{"id":"a6","title":"Ticks","publishedAt":"2025-06-30T12:34:56.1234567"}"#;
    let decoded: ArticlePublishedEvent = serde_json::from_str(payload)?;
    assert_eq!(decoded.published_at.timestamp(), 1_751_286_896);
    assert_eq!(decoded.published_at.timestamp_subsec_nanos(), 123_456_700);

    let payload = r#"{"id":"a7","title":"Offset","publishedAt":"2025-01-01T02:00:00+02:00"}"#;
    let decoded: ArticlePublishedEvent = serde_json::from_str(payload)?;
    assert_eq!(decoded.published_at, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());

    Ok(())
}

/// Test: Null ids and timestamps fall back to defaults
#[tokio::test]
async fn test_null_fields_use_defaults() -> Result<()> {
    let decoded: ArticlePublishedEvent = serde_json::from_str(
        r#"{"Id":null,"Title":"Legacy","Description":null,"PublishedAt":"2025-01-01T00:00:00Z"}"#,
    )?;
    assert_eq!(decoded.id, "");
    assert_eq!(decoded.title, "Legacy");

    let decoded: ArticlePublishedEvent =
        serde_json::from_str(r#"{"id":"a8","title":"T","publishedAt":null}"#)?;
    assert_eq!(decoded.published_at, DateTime::<Utc>::default());

    Ok(())
}

/// Test: A timestamp that is not a date at all is still rejected
#[tokio::test]
async fn test_garbage_timestamp_is_rejected() -> Result<()> {
    let result =
        serde_json::from_str::<ArticlePublishedEvent>(r#"{"id":"a9","title":"T","publishedAt":"yesterday"}"#);

    assert!(result.is_err());

    Ok(())
}
