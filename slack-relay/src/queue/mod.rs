//! Message bus publishing.
//!
//! This module provides:
//! - The [`PublishSink`] capability the web handler publishes through
//! - Best-effort publishing with a bounded timeout
//! - Redis `PUBLISH` and AMQP topic-exchange implementations
//!
//! ## Architecture
//!
//! ```text
//! Slack → /slack handler → PublishSink(topic, raw body) → Redis channel / AMQP exchange
//! ```

pub mod amqp_sink;
pub mod redis_sink;
pub mod sink;

pub use amqp_sink::AmqpSink;
pub use redis_sink::{redis_url, RedisSink};
pub use sink::{publish_best_effort, PublishOutcome, PublishSink, SharedSink};
