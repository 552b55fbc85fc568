//! Static event routing.
//!
//! Routes are read once at startup from a JSON file shaped like:
//!
//! ```json
//! [
//!   { "slack-event-type": "message", "channel": "slack-messages" },
//!   { "slack-event-type": "view_submission", "channel": "slack-views",
//!     "reply": { "response_action": "clear" } }
//! ]
//! ```
//!
//! The resulting [`RouteTable`] is never mutated while the server runs.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::value::{to_raw_value, RawValue};
use serde_json::Value;

use crate::error::{ConfigError, RouteError};

/// One routing rule from the configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRoute {
    /// Slack event type this rule matches (exact, case-sensitive).
    #[serde(rename = "slack-event-type")]
    pub event_type: String,
    /// Bus topic the raw payload is published to.
    #[serde(rename = "channel")]
    pub topic: String,
    /// Canned JSON reply sent back to Slack instead of the plain acknowledgement.
    ///
    /// Compacted when the table is built; key order is kept as written.
    #[serde(default)]
    pub reply: Option<Box<RawValue>>,
}

impl EventRoute {
    pub fn new(event_type: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            topic: topic.into(),
            reply: None,
        }
    }

    pub fn with_reply(mut self, reply: Box<RawValue>) -> Self {
        self.reply = Some(reply);
        self
    }
}

/// A resolved route for one event type.
#[derive(Debug, Clone, Copy)]
pub struct Route<'a> {
    pub topic: &'a str,
    pub reply: Option<&'a RawValue>,
}

/// Immutable lookup index built from the configured [`EventRoute`]s.
#[derive(Debug, Default)]
pub struct RouteTable {
    topics: HashMap<String, String>,
    replies: HashMap<String, Box<RawValue>>,
}

impl RouteTable {
    /// Build the table, rejecting empty keys, empty topics, duplicates and
    /// non-object replies.
    pub fn new(routes: Vec<EventRoute>) -> Result<Self, RouteError> {
        let mut topics = HashMap::with_capacity(routes.len());
        let mut replies = HashMap::new();

        for (index, route) in routes.into_iter().enumerate() {
            if route.event_type.is_empty() {
                return Err(RouteError::EmptyEventType { index });
            }
            if route.topic.is_empty() {
                return Err(RouteError::EmptyTopic {
                    event_type: route.event_type,
                });
            }
            if topics.contains_key(&route.event_type) {
                return Err(RouteError::DuplicateEventType {
                    event_type: route.event_type,
                });
            }

            if let Some(reply) = route.reply {
                let compact = compact_reply(&route.event_type, &reply)?;
                replies.insert(route.event_type.clone(), compact);
            }

            topics.insert(route.event_type, route.topic);
        }

        Ok(Self { topics, replies })
    }

    /// Parse a JSON array of routes.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let routes: Vec<EventRoute> = serde_json::from_str(json)?;
        Self::new(routes).map_err(serde::de::Error::custom)
    }

    /// Load and validate the route file. Any failure here is fatal at startup.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let routes: Vec<EventRoute> =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        Self::new(routes).map_err(|source| ConfigError::Route {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the topic and optional reply for an event type.
    pub fn lookup(&self, event_type: &str) -> Option<Route<'_>> {
        let topic = self.topics.get(event_type)?;
        Some(Route {
            topic,
            reply: self.replies.get(event_type).map(|r| &**r),
        })
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// Re-serialize a reply object without insignificant whitespace.
fn compact_reply(event_type: &str, reply: &RawValue) -> Result<Box<RawValue>, RouteError> {
    let invalid = |source| RouteError::InvalidReply {
        event_type: event_type.to_string(),
        source,
    };

    let value: Value = serde_json::from_str(reply.get()).map_err(invalid)?;
    if !value.is_object() {
        return Err(RouteError::ReplyNotObject {
            event_type: event_type.to_string(),
        });
    }
    to_raw_value(&value).map_err(invalid)
}
