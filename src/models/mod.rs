pub mod circuit_breaker;
pub mod event;
pub mod feed;
pub mod health;
pub mod notification;
pub mod queue;
pub mod retry;
pub mod status;
