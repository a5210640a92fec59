use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use news_notifier::{
    api::run_api_server,
    clients::{
        circuit_breaker::CircuitBreaker,
        consumer::ArticleConsumer,
        health::HealthChecker,
        news_feed::{NEWS_FEED_SERVICE, NewsFeedClient},
        notification::{HttpNotificationSink, IdempotentSink},
        publisher::ArticleEventPublisher,
        rbmq::RabbitMqClient,
        redis::DeliveryLedger,
        topology::QueueTopology,
    },
    config::Config,
    poller::FeedPoller,
};
use tokio::{signal, sync::watch, time::MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config = Config::load()?;
    let queues = config.queue_names();

    info!(
        environment = %config.rabbitmq_env,
        main_queue = %queues.news_published,
        "Configuration validated"
    );

    let rabbitmq = RabbitMqClient::connect(&config).await?;

    QueueTopology::new(queues.clone())
        .declare(&rabbitmq.connection())
        .await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let news_feed_breaker = config
        .news_feed_enabled()
        .then(|| CircuitBreaker::new(NEWS_FEED_SERVICE, config.circuit_breaker_config()));

    let health_checker =
        HealthChecker::new(config.clone(), rabbitmq.clone(), news_feed_breaker.clone());
    let api_port = config.server_port;
    let api_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        if let Err(e) = run_api_server(api_port, health_checker, api_shutdown).await {
            error!(error = %e, "Health check server failed");
        }
    });

    if let Some(breaker) = news_feed_breaker {
        let client = NewsFeedClient::from_config(&config, breaker)?;
        let publisher = ArticleEventPublisher::new(rabbitmq.connection(), &queues.news_published);
        let poller = FeedPoller::new(client, publisher, config.news_api_query.clone());
        let interval = Duration::from_secs(config.feed_poll_interval_seconds);

        tokio::spawn(run_feed_poller(poller, interval, shutdown_rx.clone()));
    } else {
        info!("News feed not configured, feed poller disabled");
    }

    let ledger = DeliveryLedger::from_config(&config).await?;
    if ledger.is_none() {
        warn!("REDIS_URL not set, duplicate deliveries will not be suppressed");
    }

    let sink = IdempotentSink::new(HttpNotificationSink::from_config(&config)?, ledger);
    let consumer = ArticleConsumer::new(
        rabbitmq,
        &queues.news_published,
        &config.consumer_tag,
        sink,
    );

    let mut consumer_handle = tokio::spawn(consumer.run(shutdown_rx));

    let result = tokio::select! {
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(true);
            consumer_handle.await
        }
        joined = &mut consumer_handle => {
            let _ = shutdown_tx.send(true);
            joined
        }
    };

    match result {
        Ok(Ok(())) => {
            info!("Worker stopped");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "Worker stopped with an error");
            Err(e)
        }
        Err(e) => Err(anyhow!("Consumer task panicked: {}", e)),
    }
}

async fn run_feed_poller(
    mut poller: FeedPoller<ArticleEventPublisher>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                poller.poll_once().await;
            }
            _ = async { let _ = shutdown.wait_for(|stop| *stop).await; } => {
                info!("Feed poller stopped");
                return;
            }
        }
    }
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received interrupt, initiating graceful shutdown"),
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}
