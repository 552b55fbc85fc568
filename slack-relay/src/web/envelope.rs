//! Classification of inbound Slack payloads.
//!
//! Slack wraps everything it sends in a small envelope with a top-level
//! `type`. Only three shapes matter to the relay:
//!
//! ```text
//! {"type": "url_verification", "challenge": "..."}        -> Handshake
//! {"type": "event_callback", "event": {"type": "..."}}    -> Callback
//! {"type": "<anything else>", ...}                        -> Generic
//! ```
//!
//! Everything else is `Unknown` and still acknowledged.

use serde_json::Value;

pub const URL_VERIFICATION: &str = "url_verification";
pub const EVENT_CALLBACK: &str = "event_callback";

/// Decoded envelope shape of one inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// Endpoint ownership challenge. `challenge` is `None` when missing or not a string.
    Handshake { challenge: Option<String> },
    /// Wrapped business event. `event_type` is `None` when `event.type` is unusable.
    Callback { event_type: Option<String> },
    /// Interactive payloads and other top-level types route on `type` itself.
    Generic { event_type: String },
    /// No string `type` at the top level.
    Unknown,
}

impl Envelope {
    pub fn from_value(payload: &Value) -> Self {
        let kind = payload.get("type").and_then(Value::as_str);

        match kind {
            Some(URL_VERIFICATION) => Envelope::Handshake {
                challenge: payload
                    .get("challenge")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
            },
            Some(EVENT_CALLBACK) => Envelope::Callback {
                event_type: payload
                    .get("event")
                    .and_then(|event| event.get("type"))
                    .and_then(Value::as_str)
                    .map(str::to_owned),
            },
            Some(other) => Envelope::Generic {
                event_type: other.to_owned(),
            },
            None => Envelope::Unknown,
        }
    }

    pub fn is_handshake(&self) -> bool {
        matches!(self, Envelope::Handshake { .. })
    }

    /// Routing key for this payload. Empty means "type unknown".
    pub fn routing_key(&self) -> &str {
        match self {
            Envelope::Callback {
                event_type: Some(event_type),
            }
            | Envelope::Generic { event_type } => event_type,
            _ => "",
        }
    }
}

/// Classify a decoded payload into `(routing key, is handshake)`.
pub fn classify(payload: &Value) -> (String, bool) {
    let envelope = Envelope::from_value(payload);
    (envelope.routing_key().to_owned(), envelope.is_handshake())
}
