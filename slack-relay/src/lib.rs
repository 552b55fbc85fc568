//! Slack Relay - signed Slack event webhooks onto a pub/sub bus.
//!
//! The relay verifies each Slack request, classifies it by event type and
//! republishes the raw payload to the topic configured for that type.
//!
//! ## Architecture
//!
//! ```text
//! Slack → POST /slack → signature check → Envelope → RouteTable → PublishSink(topic)
//! ```

pub mod config;
pub mod error;
pub mod queue;
pub mod routing;
pub mod web;

// Re-export commonly used types
pub use config::{BusBackend, Config, LogLevel};
pub use error::{ConfigError, PublishError, RouteError};
pub use queue::{AmqpSink, PublishOutcome, PublishSink, RedisSink, SharedSink};
pub use routing::{EventRoute, RouteTable};
pub use web::{router, AppState, Envelope, SigningSecret};
