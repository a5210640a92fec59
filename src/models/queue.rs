use lapin::types::{AMQPValue, FieldTable, LongString, ShortString};

pub const NEWS_PUBLISHED_QUEUE: &str = "news-published-queue";
pub const RETRY_QUEUE_1: &str = "retry-queue-1";
pub const RETRY_QUEUE_2: &str = "retry-queue-2";
pub const DEAD_LETTER_QUEUE: &str = "dead-letter-queue";

/// Time a rejected message parks in each retry queue before moving on.
pub const RETRY_QUEUE_TTL_MS: i32 = 10_000;

/// Default exchange; dead-lettered messages are routed by queue name.
pub const DEFAULT_EXCHANGE: &str = "";

pub fn queue_name(base_name: &str, environment: &str) -> String {
    format!("{}-{}", base_name, environment)
}

/// Environment-qualified names of the four queues in the delivery chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNames {
    pub news_published: String,
    pub retry_1: String,
    pub retry_2: String,
    pub dead_letter: String,
}

impl QueueNames {
    pub fn for_environment(environment: &str) -> Self {
        Self {
            news_published: queue_name(NEWS_PUBLISHED_QUEUE, environment),
            retry_1: queue_name(RETRY_QUEUE_1, environment),
            retry_2: queue_name(RETRY_QUEUE_2, environment),
            dead_letter: queue_name(DEAD_LETTER_QUEUE, environment),
        }
    }

    /// Queue names in the order a failing message visits them.
    pub fn chain(&self) -> [&str; 4] {
        [
            &self.news_published,
            &self.retry_1,
            &self.retry_2,
            &self.dead_letter,
        ]
    }
}

/// Declaration of one queue and where it dead-letters to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSpec {
    pub name: String,
    pub dead_letter_routing_key: Option<String>,
    pub message_ttl_ms: Option<i32>,
}

impl QueueSpec {
    pub fn terminal(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dead_letter_routing_key: None,
            message_ttl_ms: None,
        }
    }

    pub fn dead_lettering_to(name: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            dead_letter_routing_key: Some(target.to_string()),
            message_ttl_ms: None,
        }
    }

    pub fn with_message_ttl(mut self, ttl_ms: i32) -> Self {
        self.message_ttl_ms = Some(ttl_ms);
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.dead_letter_routing_key.is_none()
    }

    pub fn arguments(&self) -> FieldTable {
        let mut arguments = FieldTable::default();

        if let Some(target) = &self.dead_letter_routing_key {
            arguments.insert(
                ShortString::from("x-dead-letter-exchange"),
                AMQPValue::LongString(LongString::from(DEFAULT_EXCHANGE)),
            );
            arguments.insert(
                ShortString::from("x-dead-letter-routing-key"),
                AMQPValue::LongString(LongString::from(target.as_str())),
            );
        }

        if let Some(ttl) = self.message_ttl_ms {
            arguments.insert(
                ShortString::from("x-message-ttl"),
                AMQPValue::LongInt(ttl),
            );
        }

        arguments
    }
}
