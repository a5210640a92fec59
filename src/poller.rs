use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::{
    clients::{news_feed::NewsFeedClient, publisher::EventPublisher},
    models::event::ArticlePublishedEvent,
};

/// Upper bound on remembered article ids before the set is reset.
const MAX_SEEN_ARTICLES: usize = 10_000;

/// Turns newly seen feed articles into published article events.
pub struct FeedPoller<P> {
    client: NewsFeedClient,
    publisher: P,
    query: String,
    seen: HashSet<String>,
}

impl<P: EventPublisher> FeedPoller<P> {
    pub fn new(client: NewsFeedClient, publisher: P, query: impl Into<String>) -> Self {
        Self {
            client,
            publisher,
            query: query.into(),
            seen: HashSet::new(),
        }
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Fetches one page and publishes every article not published before.
    ///
    /// Returns how many events were published. A feed outage is just an
    /// empty page; a failed publish is logged and retried on the next poll.
    pub async fn poll_once(&mut self) -> usize {
        let response = self.client.fetch_articles(&self.query).await;

        if response.is_empty() {
            debug!(query = %self.query, "No articles this cycle");
            return 0;
        }

        if self.seen.len() > MAX_SEEN_ARTICLES {
            self.seen.clear();
        }

        let mut published = 0;

        for article in &response.articles {
            let Some(event) = ArticlePublishedEvent::from_feed_article(article) else {
                debug!("Skipping feed article without a title");
                continue;
            };

            if self.seen.contains(&event.id) {
                continue;
            }

            match self.publisher.publish(&event).await {
                Ok(()) => {
                    self.seen.insert(event.id);
                    published += 1;
                }
                Err(e) => {
                    warn!(article_id = %event.id, error = %e, "Failed to publish article event");
                }
            }
        }

        info!(
            query = %self.query,
            fetched = response.articles.len(),
            published,
            "Feed poll finished"
        );

        published
    }
}
