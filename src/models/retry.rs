use std::time::Duration;

/// Fixed-delay retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt, so a call makes at most `max_retries + 1` attempts.
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryConfig {
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}
