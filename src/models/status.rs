use std::fmt::{Display, Formatter, Result};

/// Result of handling one delivery from the main queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// Undecodable or empty envelope; retrying can never help.
    Poison(String),
    /// The sink failed; the broker should move the message down the retry chain.
    Failed(String),
}

/// What the consumer tells the broker about a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Ack,
    Reject,
}

impl DeliveryOutcome {
    pub fn disposition(&self) -> Disposition {
        match self {
            DeliveryOutcome::Delivered | DeliveryOutcome::Poison(_) => Disposition::Ack,
            DeliveryOutcome::Failed(_) => Disposition::Reject,
        }
    }
}

impl Display for DeliveryOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            DeliveryOutcome::Delivered => write!(f, "delivered"),
            DeliveryOutcome::Poison(reason) => write!(f, "poison: {}", reason),
            DeliveryOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IdempotencyStatus {
    NotFound,
    Sent,
}
