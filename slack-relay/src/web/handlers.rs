//! Slack endpoint handlers.
//!
//! The Slack handler runs a strictly sequential pipeline per request:
//! 1. Read the body
//! 2. Extract the JSON (raw body, or the `payload` form field)
//! 3. Verify the signature over the bytes as received
//! 4. Decode and classify the envelope
//! 5. Answer handshakes, or look up the route and publish
//!
//! Routing misses and publish failures are never reported to Slack as errors.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{value::RawValue, Value};
use tracing::{debug, info, warn, Level};

use crate::queue::{publish_best_effort, SharedSink};
use crate::routing::RouteTable;
use crate::web::envelope::Envelope;
use crate::web::signature::{
    verify_slack_signature, SigningSecret, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};

pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

pub const ACK_RECEIVED: &str = "Event received";
pub const ACK_TYPE_UNKNOWN: &str = "Event received but type unknown";
pub const ACK_NOT_CONFIGURED: &str = "Event received but event type not configured";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
const FORM_PAYLOAD_FIELD: &str = "payload";

/// Shared application state.
///
/// Built once before serving and never mutated afterwards.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<RouteTable>,
    pub secret: Arc<SigningSecret>,
    /// Absent when no bus is reachable; events are then acknowledged only.
    pub sink: Option<SharedSink>,
    pub publish_timeout: Duration,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(routes: RouteTable, secret: SigningSecret, sink: Option<SharedSink>) -> Self {
        Self {
            routes: Arc::new(routes),
            secret: Arc::new(secret),
            sink,
            publish_timeout: DEFAULT_PUBLISH_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Slack Events
// =============================================================================

/// URL verification reply.
#[derive(Debug, Serialize)]
pub struct ChallengeResponse {
    pub challenge: String,
}

/// Rejects every method other than POST on the Slack endpoint.
pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        "Method not allowed",
    )
        .into_response()
}

/// Slack events endpoint.
pub async fn slack_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let raw = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            info!(error = %e, "slack_body_read_failed");
            return plain(StatusCode::BAD_REQUEST, "Error reading request body");
        }
    };

    let json_bytes: Cow<'_, [u8]> = if is_form_encoded(&headers) {
        match form_payload(&raw) {
            Some(payload) => Cow::Owned(payload.into_bytes()),
            None => {
                info!("slack_form_payload_missing");
                return plain(StatusCode::BAD_REQUEST, "Missing payload field");
            }
        }
    } else {
        Cow::Borrowed(&raw[..])
    };

    // Slack signs the body exactly as sent, before any form decoding
    let timestamp = header_str(&headers, TIMESTAMP_HEADER);
    let signature = header_str(&headers, SIGNATURE_HEADER);
    if !verify_slack_signature(&raw, timestamp, signature, &state.secret) {
        warn!(
            has_timestamp = !timestamp.is_empty(),
            has_signature = !signature.is_empty(),
            body_length = raw.len(),
            "slack_signature_invalid"
        );
        return plain(StatusCode::UNAUTHORIZED, "Invalid signature");
    }

    let payload: Value = match serde_json::from_slice(&json_bytes) {
        Ok(v) => v,
        Err(e) => {
            info!(error = %e, "slack_payload_invalid_json");
            return plain(StatusCode::BAD_REQUEST, "Error parsing JSON");
        }
    };

    let envelope = Envelope::from_value(&payload);

    if let Envelope::Handshake { challenge } = envelope {
        return match challenge {
            Some(challenge) => {
                info!("slack_url_verification");
                (StatusCode::OK, Json(ChallengeResponse { challenge })).into_response()
            }
            None => {
                info!("slack_url_verification_invalid_challenge");
                plain(StatusCode::BAD_REQUEST, "Invalid challenge")
            }
        };
    }

    let event_type = envelope.routing_key();
    if event_type.is_empty() {
        warn!("slack_event_type_unknown");
        return plain(StatusCode::OK, ACK_TYPE_UNKNOWN);
    }

    info!(event_type = %event_type, "slack_event_received");

    let Some(route) = state.routes.lookup(event_type) else {
        info!(event_type = %event_type, "slack_event_not_configured");
        return plain(StatusCode::OK, ACK_NOT_CONFIGURED);
    };

    // Payloads carry user content, only format them when debug output is on
    if tracing::enabled!(Level::DEBUG) {
        match serde_json::to_string_pretty(&payload) {
            Ok(pretty) => debug!(event_type = %event_type, payload = %pretty, "slack_event_payload"),
            Err(e) => debug!(event_type = %event_type, error = %e, "slack_event_payload_format_failed"),
        }
    }

    publish_best_effort(
        state.sink.as_deref(),
        route.topic,
        &json_bytes,
        state.publish_timeout,
    )
    .await
    .log(route.topic);

    match route.reply {
        Some(reply) => json_reply(reply),
        None => plain(StatusCode::OK, ACK_RECEIVED),
    }
}

fn plain(status: StatusCode, message: &'static str) -> Response {
    (status, message).into_response()
}

/// Echo a configured reply in its compact form.
fn json_reply(reply: &RawValue) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        reply.get().to_owned(),
    )
        .into_response()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

fn is_form_encoded(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
        .unwrap_or(false)
}

fn form_payload(body: &Bytes) -> Option<String> {
    url::form_urlencoded::parse(body)
        .find(|(key, _)| key == FORM_PAYLOAD_FIELD)
        .map(|(_, value)| value.into_owned())
}
