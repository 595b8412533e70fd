//! Envelope codec.
//!
//! Wire shape (JSON text frame):
//!
//! ```json
//! {
//!   "stream": "<topic>",
//!   "payload": {
//!     "event_type": "<string>",
//!     "status": "success" | "error" | "warning" | "info" | "debug",
//!     "message": "<string>",
//!     "no_toast": true,
//!     "data": { }
//!   }
//! }
//! ```
//!
//! Only `stream` and `payload.event_type` are required. Optional fields are
//! read leniently: an unknown or wrongly typed `status` decodes to
//! [`Status::Unset`], a non-string `message` is dropped, a non-boolean
//! `no_toast` is `false` and a non-object `data` is treated as absent.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::routing::RoutingKey;
use crate::Data;

/// Presentation hint attached to an envelope. Orthogonal to routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    Info,
    Warning,
    Debug,
    /// No status on the wire (`none`).
    #[default]
    #[serde(rename = "none")]
    Unset,
}

impl Status {
    /// Parse a wire status. Unknown values map to `Unset`.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "success" => Status::Success,
            "error" => Status::Error,
            "info" => Status::Info,
            "warning" => Status::Warning,
            "debug" => Status::Debug,
            "none" => Status::Unset,
            other => {
                tracing::debug!(status = %other, "Unknown envelope status, treating as unset");
                Status::Unset
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Error => "error",
            Status::Info => "info",
            Status::Warning => "warning",
            Status::Debug => "debug",
            Status::Unset => "none",
        }
    }

    pub fn is_set(self) -> bool {
        self != Status::Unset
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons an inbound frame could not be turned into an [`Envelope`].
///
/// Fatal for that one frame only.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("frame is not a valid envelope: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
}

/// One message exchanged over the socket.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Envelope {
    pub topic: String,
    pub event_type: String,
    pub status: Status,
    pub message: Option<String>,
    pub no_toast: bool,
    /// Absent on the wire when `None`; handlers see an empty map instead.
    pub data: Option<Data>,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, event_type: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            event_type: event_type.into(),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: Data) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn without_toast(mut self) -> Self {
        self.no_toast = true;
        self
    }

    pub fn routing_key(&self) -> RoutingKey {
        RoutingKey::new(self.topic.clone(), self.event_type.clone())
    }

    /// The payload data, or an empty map when the envelope carried none.
    pub fn data_or_default(&self) -> Data {
        self.data.clone().unwrap_or_default()
    }

    /// JSON value in wire shape. Optional fields are omitted when unset.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(WireEnvelope::from(self)).unwrap_or(Value::Null)
    }

    /// Serialize to a text frame.
    pub fn to_wire(&self) -> String {
        self.to_value().to_string()
    }
}

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(default)]
    stream: Option<String>,
    #[serde(default)]
    payload: Option<WirePayload>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WirePayload {
    #[serde(default)]
    event_type: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "is_unset",
        deserialize_with = "lenient_status"
    )]
    status: Status,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_message"
    )]
    message: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "is_false",
        deserialize_with = "lenient_flag"
    )]
    no_toast: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_data"
    )]
    data: Option<Data>,
}

impl From<&Envelope> for WireEnvelope {
    fn from(envelope: &Envelope) -> Self {
        Self {
            stream: Some(envelope.topic.clone()),
            payload: Some(WirePayload {
                event_type: Some(envelope.event_type.clone()),
                status: envelope.status,
                message: envelope.message.clone(),
                no_toast: envelope.no_toast,
                data: envelope.data.clone(),
            }),
        }
    }
}

fn is_unset(status: &Status) -> bool {
    !status.is_set()
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

fn lenient_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Status, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(status) => Status::from_wire(&status),
        Value::Null => Status::Unset,
        other => {
            tracing::debug!(value = %other, "Non-string envelope status, treating as unset");
            Status::Unset
        }
    })
}

fn lenient_message<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(message) => Some(message),
        Value::Null => None,
        other => {
            tracing::debug!(value = %other, "Non-string envelope message, ignoring");
            None
        }
    })
}

fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => flag,
        Value::Null => false,
        other => {
            tracing::debug!(value = %other, "Non-boolean no_toast, treating as false");
            false
        }
    })
}

fn lenient_data<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Data>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Object(data) => Some(data),
        Value::Null => None,
        other => {
            tracing::debug!(value = %other, "Non-object envelope data, treating as absent");
            None
        }
    })
}

/// Encode an outbound message. Never fails.
pub fn encode(topic: &str, event_type: &str, data: Data) -> String {
    Envelope::new(topic, event_type).with_data(data).to_wire()
}

/// Decode an inbound text frame.
pub fn decode(text: &str) -> Result<Envelope, DecodeError> {
    let wire: WireEnvelope = serde_json::from_str(text)?;
    let topic = wire.stream.ok_or(DecodeError::MissingField("stream"))?;
    let payload = wire.payload.ok_or(DecodeError::MissingField("payload"))?;
    let event_type = payload
        .event_type
        .ok_or(DecodeError::MissingField("payload.event_type"))?;

    Ok(Envelope {
        topic,
        event_type,
        status: payload.status,
        message: payload.message,
        no_toast: payload.no_toast,
        data: payload.data,
    })
}
