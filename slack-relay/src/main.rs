//! Slack Relay - webhook receiver that republishes Slack events to a bus.
//!
//! Startup order:
//! - Route file is loaded first; any error there aborts before binding
//! - A missing signing secret or unreachable bus only degrades the service

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use slack_relay::queue::redis_url;
use slack_relay::{
    router, AmqpSink, AppState, BusBackend, Config, PublishSink, RedisSink, RouteTable, SharedSink,
    SigningSecret,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Invalid values are reported before the configured filter exists
    let bootstrap = tracing_subscriber::fmt().json().flatten_event(true).finish();
    let config = tracing::subscriber::with_default(bootstrap, Config::from_env);

    // RUST_LOG wins; LOG_LEVEL is the simple knob
    let (filter, filter_source) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, "RUST_LOG"),
        Err(_) => (EnvFilter::new(config.log_level.as_directive()), "LOG_LEVEL"),
    };
    let log_filter = filter.to_string();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!(log_filter = %log_filter, filter_source = filter_source, "relay_starting");

    let routes = match RouteTable::from_file(&config.config_file) {
        Ok(routes) => routes,
        Err(e) => {
            error!(
                config_file = %config.config_file.display(),
                error = %e,
                "route_config_load_failed"
            );
            return Err(e).context("Please create a configuration file with event-to-channel mappings");
        }
    };
    info!(
        routes = routes.len(),
        config_file = %config.config_file.display(),
        "route_config_loaded"
    );

    let secret = match config.load_signing_secret() {
        Some(secret) => {
            info!("signature_verification_enabled");
            secret
        }
        None => {
            warn!(
                secret_file = %config.secret_file.display(),
                "signing_secret_missing_verification_disabled"
            );
            SigningSecret::disabled()
        }
    };

    let sink = connect_sink(&config).await;

    let state = AppState::new(routes, secret, sink.clone())
        .with_publish_timeout(config.publish_timeout)
        .with_max_body_bytes(config.max_body_bytes);

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "relay_listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(sink) = sink {
        sink.close().await;
    }

    info!("relay_shutdown_complete");

    Ok(())
}

/// Connect the configured bus. Any failure leaves the relay running without one.
async fn connect_sink(config: &Config) -> Option<SharedSink> {
    let connect_timeout = config.publish_timeout;

    match config.bus_backend {
        BusBackend::Disabled => {
            warn!("bus_disabled_events_will_not_be_published");
            None
        }
        BusBackend::Redis => {
            let url = match redis_url(
                &config.redis_host,
                config.redis_port,
                config.redis_password.as_deref(),
            ) {
                Ok(url) => url,
                Err(e) => {
                    warn!(error = %e, "redis_config_invalid_publishing_disabled");
                    return None;
                }
            };

            match tokio::time::timeout(connect_timeout, RedisSink::connect(&url)).await {
                Ok(Ok(sink)) => {
                    info!(
                        backend = sink.name(),
                        host = %config.redis_host,
                        port = config.redis_port,
                        "redis_connected"
                    );
                    Some(Arc::new(sink) as SharedSink)
                }
                Ok(Err(e)) => {
                    warn!(
                        host = %config.redis_host,
                        port = config.redis_port,
                        password_set = config.redis_password.is_some(),
                        error = %e,
                        "redis_unavailable_publishing_disabled"
                    );
                    None
                }
                Err(_) => {
                    warn!(
                        host = %config.redis_host,
                        port = config.redis_port,
                        timeout_ms = connect_timeout.as_millis() as u64,
                        "redis_connect_timeout_publishing_disabled"
                    );
                    None
                }
            }
        }
        BusBackend::Amqp => {
            let connect = AmqpSink::connect(config.amqp_url.clone(), config.amqp_exchange.clone());
            match tokio::time::timeout(connect_timeout, connect).await {
                Ok(Ok(sink)) => {
                    info!(
                        backend = sink.name(),
                        exchange = %config.amqp_exchange,
                        "amqp_connected"
                    );
                    Some(Arc::new(sink) as SharedSink)
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "amqp_unavailable_publishing_disabled");
                    None
                }
                Err(_) => {
                    warn!(
                        timeout_ms = connect_timeout.as_millis() as u64,
                        "amqp_connect_timeout_publishing_disabled"
                    );
                    None
                }
            }
        }
    }
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("relay_shutting_down");
}
