//! Publish sink abstraction and best-effort delivery.
//!
//! The relay never fails a Slack request because the bus is down. Every
//! publish attempt is reduced to a [`PublishOutcome`] that the caller logs and
//! drops.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::PublishError;

/// A topic-addressed, byte-payload message bus.
///
/// Implementations are shared across concurrent request handlers.
#[async_trait]
pub trait PublishSink: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;

    /// Release connections on shutdown.
    async fn close(&self) {}

    /// Short backend name used in logs.
    fn name(&self) -> &'static str;
}

pub type SharedSink = Arc<dyn PublishSink>;

/// Result of one best-effort publish attempt.
#[derive(Debug)]
#[must_use = "a publish outcome should be logged"]
pub enum PublishOutcome {
    Published { backend: &'static str },
    /// No sink is configured.
    Skipped,
    Failed {
        backend: &'static str,
        error: PublishError,
    },
}

impl PublishOutcome {
    /// Log the outcome against `topic` and discard it.
    pub fn log(self, topic: &str) {
        match self {
            PublishOutcome::Published { backend } => {
                info!(topic = %topic, backend = backend, "event_published")
            }
            PublishOutcome::Skipped => {}
            PublishOutcome::Failed { backend, error } => {
                error!(topic = %topic, backend = backend, error = %error, "event_publish_failed")
            }
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, PublishOutcome::Published { .. })
    }
}

/// Publish `payload` to `topic` if a sink is present, abandoning the attempt
/// after `timeout`.
pub async fn publish_best_effort(
    sink: Option<&dyn PublishSink>,
    topic: &str,
    payload: &[u8],
    timeout: Duration,
) -> PublishOutcome {
    let Some(sink) = sink else {
        return PublishOutcome::Skipped;
    };

    let backend = sink.name();
    match tokio::time::timeout(timeout, sink.publish(topic, payload)).await {
        Ok(Ok(())) => PublishOutcome::Published { backend },
        Ok(Err(error)) => PublishOutcome::Failed { backend, error },
        Err(_) => PublishOutcome::Failed {
            backend,
            error: PublishError::Timeout(timeout),
        },
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Sink that records every publish in memory.
    #[derive(Default)]
    pub struct RecordingSink {
        published: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl RecordingSink {
        pub fn published(&self) -> Vec<(String, Vec<u8>)> {
            self.published.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PublishSink for RecordingSink {
        async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_vec()));
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    /// Sink that always fails.
    pub struct FailingSink;

    #[async_trait]
    impl PublishSink for FailingSink {
        async fn publish(&self, _topic: &str, _payload: &[u8]) -> Result<(), PublishError> {
            Err(PublishError::Other("bus unavailable".to_string()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    /// Sink that never completes.
    pub struct StalledSink;

    #[async_trait]
    impl PublishSink for StalledSink {
        async fn publish(&self, _topic: &str, _payload: &[u8]) -> Result<(), PublishError> {
            std::future::pending::<()>().await;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }
}
