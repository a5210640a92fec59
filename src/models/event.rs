use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use uuid::Uuid;

use crate::models::feed::FeedArticle;

/// Envelope announcing that an article was published.
///
/// Every field falls back to a default when absent so that older or newer
/// producers never turn a message into a poison message by accident. The
/// PascalCase aliases accept payloads from legacy producers, which may also
/// send `null` ids and timestamps without a UTC offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePublishedEvent {
    #[serde(default, alias = "Id", deserialize_with = "null_as_default")]
    pub id: String,

    #[serde(default, alias = "Title", deserialize_with = "null_as_default")]
    pub title: String,

    #[serde(default, alias = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, alias = "PublishedAt", deserialize_with = "lenient_timestamp")]
    pub published_at: DateTime<Utc>,
}

impl ArticlePublishedEvent {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        description: Option<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description,
            published_at,
        }
    }

    /// Builds an event for an article pulled from the news feed.
    ///
    /// Returns `None` for untitled articles, which could never be delivered.
    pub fn from_feed_article(article: &FeedArticle) -> Option<Self> {
        let title = article
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())?;

        let id = article
            .url
            .clone()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Some(Self {
            id,
            title: title.to_string(),
            description: article.description.clone(),
            published_at: article.published_at.unwrap_or_else(Utc::now),
        })
    }

    /// A decoded event without a title carries nothing worth notifying about.
    pub fn is_deliverable(&self) -> bool {
        !self.title.trim().is_empty()
    }

    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// RFC 3339, or ISO-8601 without an offset read as UTC. `null` is the epoch.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(DateTime::<Utc>::default());
    };

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| D::Error::custom(format!("invalid publishedAt {:?}: {}", raw, e)))
}
