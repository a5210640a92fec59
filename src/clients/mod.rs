pub mod circuit_breaker;
pub mod consumer;
pub mod health;
pub mod news_feed;
pub mod notification;
pub mod publisher;
pub mod rbmq;
pub mod redis;
pub mod resilience;
pub mod topology;
