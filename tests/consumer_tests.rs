use anyhow::Result;
use news_notifier::{
    clients::notification::IdempotentSink,
    models::status::{DeliveryOutcome, Disposition},
    utils::process_delivery,
};

use crate::support::{RecordingSink, sample_event};

/// Test: A delivered notification is acked
#[tokio::test]
async fn test_successful_delivery_is_acked() -> Result<()> {
    let sink = RecordingSink::default();
    let payload = sample_event("a1", "Rust 2024 released").to_payload()?;

    let outcome = process_delivery(&payload, &sink).await;

    assert_eq!(outcome, DeliveryOutcome::Delivered);
    assert_eq!(outcome.disposition(), Disposition::Ack);
    assert_eq!(sink.delivered_ids(), vec!["a1".to_string()]);

    Ok(())
}

/// Test: A sink failure rejects the message into the retry chain
#[tokio::test]
async fn test_sink_failure_is_rejected() -> Result<()> {
    let sink = RecordingSink::failing_on("fail-test");
    let payload = sample_event("a2", "fail-test").to_payload()?;

    let outcome = process_delivery(&payload, &sink).await;

    assert!(matches!(outcome, DeliveryOutcome::Failed(ref reason) if reason.contains("SMTP")));
    assert_eq!(outcome.disposition(), Disposition::Reject);
    assert_eq!(sink.attempt_count(), 1);
    assert!(sink.delivered_ids().is_empty());

    Ok(())
}

/// Test: Undecodable payloads are acked without reaching the sink
#[tokio::test]
async fn test_malformed_payload_is_acked_as_poison() -> Result<()> {
    let sink = RecordingSink::default();

    let outcome = process_delivery(b"{not json", &sink).await;

    assert!(matches!(outcome, DeliveryOutcome::Poison(_)));
    assert_eq!(outcome.disposition(), Disposition::Ack);
    assert_eq!(sink.attempt_count(), 0);

    Ok(())
}

/// Test: Envelopes without a title are acked without reaching the sink
#[tokio::test]
async fn test_untitled_event_is_acked_as_poison() -> Result<()> {
    let sink = RecordingSink::default();

    let outcome = process_delivery(br#"{"id":"a3","description":"no title"}"#, &sink).await;

    assert!(matches!(outcome, DeliveryOutcome::Poison(_)));
    assert_eq!(outcome.disposition(), Disposition::Ack);
    assert_eq!(sink.attempt_count(), 0);

    Ok(())
}

/// Test: Legacy envelopes with null ids and offset-less timestamps reach the sink
#[tokio::test]
async fn test_legacy_envelopes_are_delivered() -> Result<()> {
    let sink = RecordingSink::default();
    let payloads: [&[u8]; 3] = [
        br#"{"Id":"a1","Title":"Legacy","Description":"d","PublishedAt":"2025-01-01T00:00:00"}"#,
        br#"{"Id":null,"Title":"Legacy","Description":"d","PublishedAt":"2025-01-01T00:00:00Z"}"#,
        br#"{"id":"a2","title":"T","publishedAt":null}"#,
    ];

    for payload in payloads {
        assert_eq!(process_delivery(payload, &sink).await, DeliveryOutcome::Delivered);
    }

    assert_eq!(sink.attempt_count(), 3);
    assert_eq!(
        sink.delivered_ids(),
        vec!["a1".to_string(), String::new(), "a2".to_string()]
    );

    Ok(())
}

/// Test: Redelivered messages are handed to the sink again
#[tokio::test]
async fn test_redelivery_reaches_sink_twice() -> Result<()> {
    let sink = RecordingSink::default();
    let payload = sample_event("a4", "Redelivered").to_payload()?;

    assert_eq!(process_delivery(&payload, &sink).await, DeliveryOutcome::Delivered);
    assert_eq!(process_delivery(&payload, &sink).await, DeliveryOutcome::Delivered);

    assert_eq!(sink.delivered_ids(), vec!["a4".to_string(), "a4".to_string()]);

    Ok(())
}

/// Test: Without a ledger the idempotent wrapper passes everything through
#[tokio::test]
async fn test_idempotent_sink_without_ledger() -> Result<()> {
    let sink = IdempotentSink::new(RecordingSink::failing_on("fail-test"), None);

    let delivered = sample_event("a5", "Works").to_payload()?;
    let failing = sample_event("a6", "fail-test").to_payload()?;

    assert_eq!(process_delivery(&delivered, &sink).await, DeliveryOutcome::Delivered);
    assert_eq!(
        process_delivery(&failing, &sink).await.disposition(),
        Disposition::Reject
    );
    assert_eq!(process_delivery(&delivered, &sink).await, DeliveryOutcome::Delivered);

    assert_eq!(sink.inner().attempt_count(), 3);
    assert_eq!(sink.inner().delivered_ids(), vec!["a5".to_string(), "a5".to_string()]);

    Ok(())
}
