//! Web server module for the Slack events endpoint.
//!
//! This module provides a thin web server that:
//! - Verifies Slack request signatures
//! - Answers URL verification handshakes
//! - Routes events by type and publishes the raw payload to the bus
//! - Always acknowledges routed, unrouted and unknown events with 200

pub mod envelope;
pub mod handlers;
pub mod signature;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use envelope::{classify, Envelope};
pub use handlers::{health, slack_events, AppState, ChallengeResponse, HealthResponse};
pub use signature::{verify_slack_signature, SigningSecret};

/// Build the HTTP router for the relay.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/slack",
            post(slack_events).fallback(handlers::method_not_allowed),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
