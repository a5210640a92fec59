use serde::{Deserialize, Serialize};

use crate::models::event::ArticlePublishedEvent;

/// Mail relay request body for one article announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailNotification {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub text: String,
}

impl EmailNotification {
    pub fn for_article(event: &ArticlePublishedEvent, from: &str, recipients: &[String]) -> Self {
        let description = event.description.as_deref().unwrap_or_default();

        Self {
            from: from.to_string(),
            to: recipients.to_vec(),
            subject: format!("New Article: {}", event.title),
            text: format!("{}\n\n{}", event.title, description),
        }
    }
}
