//! Error types shared across the relay.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building the route table.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route #{index} has an empty event type")]
    EmptyEventType { index: usize },

    #[error("route for event type '{event_type}' has an empty channel")]
    EmptyTopic { event_type: String },

    #[error("event type '{event_type}' is configured more than once")]
    DuplicateEventType { event_type: String },

    #[error("reply for event type '{event_type}' must be a JSON object")]
    ReplyNotObject { event_type: String },

    #[error("reply for event type '{event_type}' is not valid JSON: {source}")]
    InvalidReply {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Fatal startup errors for the route configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid route in '{path}': {source}")]
    Route {
        path: PathBuf,
        #[source]
        source: RouteError,
    },
}

/// Errors returned by a publish sink.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),

    #[error("publish timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("{0}")]
    Other(String),
}
