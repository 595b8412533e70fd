//! Routing keys.
//!
//! A routing key is the `(topic, event_type)` pair of an envelope. It is compared
//! byte-for-byte: no trimming, no case folding.

use std::fmt;

/// Event type the dispatcher handles itself by navigating to `data.url`.
pub const REDIRECT_EVENT: &str = "redirect";

/// `(topic, event_type)` pair used for handler lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutingKey {
    topic: String,
    event_type: String,
}

impl RoutingKey {
    pub fn new(topic: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            event_type: event_type.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

impl fmt::Display for RoutingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.topic, self.event_type)
    }
}
