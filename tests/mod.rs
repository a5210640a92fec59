mod support;

mod consumer_tests;
mod event_tests;
mod news_feed_tests;
