//! Redis pub/sub sink.
//!
//! Events are sent with `PUBLISH <topic> <raw body>`. The multiplexed
//! [`ConnectionManager`] reconnects on its own and is cheap to clone, so one
//! sink serves every request concurrently.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, info};
use url::Url;

use super::sink::PublishSink;
use crate::error::PublishError;

/// Redis `PUBLISH` sink.
#[derive(Clone)]
pub struct RedisSink {
    conn: ConnectionManager,
}

impl RedisSink {
    /// Connect to Redis and verify the server answers `PING`.
    pub async fn connect(url: &str) -> Result<Self, PublishError> {
        let client = redis::Client::open(url)?;
        let mut conn = ConnectionManager::new(client).await?;

        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!(reply = %pong, "redis_ping");

        info!("redis_sink_connected");
        Ok(Self { conn })
    }
}

/// Build a `redis://` URL from host, port and optional password.
pub fn redis_url(host: &str, port: u16, password: Option<&str>) -> Result<String, PublishError> {
    let mut url = Url::parse(&format!("redis://{host}:{port}/"))
        .map_err(|e| PublishError::Other(format!("invalid redis address: {e}")))?;

    if let Some(password) = password.filter(|p| !p.is_empty()) {
        url.set_password(Some(password))
            .map_err(|_| PublishError::Other("cannot set redis password".to_string()))?;
    }

    Ok(url.into())
}

#[async_trait]
impl PublishSink for RedisSink {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        let mut conn = self.conn.clone();
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(topic)
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        debug!(topic = %topic, receivers = receivers, "redis_published");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
