//! AMQP (RabbitMQ) topic-exchange sink.
//!
//! Each relay topic becomes the routing key on a durable topic exchange, so
//! consumers bind queues with patterns like `slack.#` or an exact topic name.

use std::sync::Arc;

use async_trait::async_trait;
use lapin::{
    options::{BasicPublishOptions, ExchangeDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::sink::PublishSink;
use crate::error::PublishError;

/// AMQP sink with lazy reconnection.
///
/// The connection and channel are re-established on the next publish after
/// the broker drops them.
#[derive(Clone)]
pub struct AmqpSink {
    inner: Arc<AmqpSinkInner>,
}

struct AmqpSinkInner {
    url: String,
    exchange: String,
    connection: RwLock<Option<Connection>>,
    channel: RwLock<Option<Channel>>,
}

impl AmqpSink {
    /// Create a sink without connecting.
    pub fn new(url: String, exchange: String) -> Self {
        Self {
            inner: Arc::new(AmqpSinkInner {
                url,
                exchange,
                connection: RwLock::new(None),
                channel: RwLock::new(None),
            }),
        }
    }

    /// Create a sink and connect immediately, declaring the exchange.
    pub async fn connect(url: String, exchange: String) -> Result<Self, PublishError> {
        let sink = Self::new(url, exchange);
        sink.ensure_connected().await?;
        Ok(sink)
    }

    pub fn exchange(&self) -> &str {
        &self.inner.exchange
    }

    /// Ensure we have a valid connection and channel.
    async fn ensure_connected(&self) -> Result<Channel, PublishError> {
        {
            let channel = self.inner.channel.read().await;
            if let Some(ch) = channel.as_ref() {
                if ch.status().connected() {
                    return Ok(ch.clone());
                }
            }
        }

        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        // Another task may have reconnected while we waited for the lock
        if let Some(ch) = channel.as_ref() {
            if ch.status().connected() {
                return Ok(ch.clone());
            }
        }

        info!(exchange = %self.inner.exchange, "amqp_sink_connecting");

        let conn = Connection::connect(&self.inner.url, ConnectionProperties::default()).await?;
        let ch = conn.create_channel().await?;

        ch.exchange_declare(
            &self.inner.exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

        info!(exchange = %self.inner.exchange, "amqp_sink_connected");

        *connection = Some(conn);
        *channel = Some(ch.clone());

        Ok(ch)
    }
}

#[async_trait]
impl PublishSink for AmqpSink {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        let channel = self.ensure_connected().await?;

        channel
            .basic_publish(
                &self.inner.exchange,
                topic,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_content_type("application/json".into()),
            )
            .await?
            .await?;

        debug!(
            exchange = %self.inner.exchange,
            routing_key = %topic,
            body_length = payload.len(),
            "amqp_published"
        );

        Ok(())
    }

    async fn close(&self) {
        let mut connection = self.inner.connection.write().await;
        let mut channel = self.inner.channel.write().await;

        if let Some(ch) = channel.take() {
            if let Err(e) = ch.close(200, "Normal shutdown").await {
                warn!(error = %e, "amqp_channel_close_error");
            }
        }

        if let Some(conn) = connection.take() {
            if let Err(e) = conn.close(200, "Normal shutdown").await {
                warn!(error = %e, "amqp_connection_close_error");
            }
        }

        info!("amqp_sink_closed");
    }

    fn name(&self) -> &'static str {
        "amqp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_creation() {
        let sink = AmqpSink::new("amqp://localhost:5672".to_string(), "slack_events".to_string());
        assert_eq!(sink.exchange(), "slack_events");
        assert_eq!(sink.name(), "amqp");
        assert!(Arc::strong_count(&sink.inner) == 1);
    }

    #[tokio::test]
    async fn test_close_without_connection() {
        let sink = AmqpSink::new("amqp://localhost:5672".to_string(), "slack_events".to_string());
        sink.close().await;
        assert!(sink.inner.channel.read().await.is_none());
    }
}
