//! Outbound message builder
//!
//! Centralizes construction of every envelope the client sends so feature code
//! never assembles `stream`/`payload` by hand.

use serde_json::{json, Value};

use crate::envelope::Envelope;
use crate::events::{DiscussionEvent, KnownEvent, NotificationEvent, PairingEvent};
use crate::Data;

/// Which side of a debate the user wants to argue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stance {
    For,
    Against,
}

impl Stance {
    /// Wire form of `desired_stance`: `true` means "for".
    pub fn is_for(self) -> bool {
        matches!(self, Stance::For)
    }
}

fn object(value: Value) -> Data {
    match value {
        Value::Object(map) => map,
        _ => Data::new(),
    }
}

fn envelope(event: KnownEvent, data: Data) -> Envelope {
    Envelope::new(event.topic().as_str(), event.event_type()).with_data(data)
}

/// Builder for outbound envelopes
///
/// # Usage
///
/// ```rust
/// use opendebate_protocol::{MessageBuilder, Stance};
///
/// let msg = MessageBuilder::request_pairing(Stance::For, 12);
/// assert_eq!(msg.routing_key().to_string(), "pairing.request_pairing");
/// ```
pub struct MessageBuilder;

impl MessageBuilder {
    // =========================================================================
    // Pairing
    // =========================================================================

    /// Create a `pairing.request_pairing` message for one debate and stance
    pub fn request_pairing(desired_stance: Stance, debate_id: i64) -> Envelope {
        envelope(
            PairingEvent::RequestPairing.into(),
            object(json!({
                "desired_stance": desired_stance.is_for(),
                "debate_id": debate_id,
            })),
        )
    }

    /// Create a `pairing.start_search` message
    pub fn start_search() -> Envelope {
        envelope(PairingEvent::StartSearch.into(), Data::new())
    }

    /// Create a `pairing.cancel` message
    pub fn cancel_pairing() -> Envelope {
        envelope(PairingEvent::Cancel.into(), Data::new())
    }

    /// Create a `pairing.keepalive` message (empty data)
    pub fn keepalive() -> Envelope {
        envelope(PairingEvent::Keepalive.into(), Data::new())
    }

    // =========================================================================
    // Discussion
    // =========================================================================

    /// Create a `discussion.new_message` chat message
    pub fn new_chat_message(discussion_id: i64, message: &str) -> Envelope {
        envelope(
            DiscussionEvent::NewMessage.into(),
            object(json!({
                "message": message,
                "discussion_id": discussion_id,
            })),
        )
    }

    /// Create a `discussion.read_messages` message marking a discussion read
    pub fn read_messages(discussion_id: i64) -> Envelope {
        envelope(
            DiscussionEvent::ReadMessages.into(),
            object(json!({ "discussion_id": discussion_id })),
        )
    }

    // =========================================================================
    // Notifications
    // =========================================================================

    /// Create a `notification.set_read` message
    pub fn set_notification_read(notification_id: i64, is_read: bool) -> Envelope {
        envelope(
            NotificationEvent::SetRead.into(),
            object(json!({
                "notification_id": notification_id,
                "is_read": is_read,
            })),
        )
    }
}
