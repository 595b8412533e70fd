//! Typed vocabulary of the routing keys used by the site.
//!
//! Feature code registers handlers and builds messages with these variants;
//! the string form only appears at the transport boundary via
//! [`KnownEvent::routing_key`] and [`KnownEvent::from_key`].

use crate::routing::RoutingKey;

/// Top-level routing namespace (`stream` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Pairing,
    Discussion,
    Notification,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Pairing => "pairing",
            Topic::Discussion => "discussion",
            Topic::Notification => "notification",
        }
    }

    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "pairing" => Some(Topic::Pairing),
            "discussion" => Some(Topic::Discussion),
            "notification" => Some(Topic::Notification),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairingEvent {
    RequestPairing,
    StartSearch,
    MatchFound,
    Cancel,
    Keepalive,
    KeepaliveAck,
}

impl PairingEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            PairingEvent::RequestPairing => "request_pairing",
            PairingEvent::StartSearch => "start_search",
            PairingEvent::MatchFound => "match_found",
            PairingEvent::Cancel => "cancel",
            PairingEvent::Keepalive => "keepalive",
            PairingEvent::KeepaliveAck => "keepalive_ack",
        }
    }

    fn from_wire(value: &str) -> Option<Self> {
        match value {
            "request_pairing" => Some(PairingEvent::RequestPairing),
            "start_search" => Some(PairingEvent::StartSearch),
            "match_found" => Some(PairingEvent::MatchFound),
            "cancel" => Some(PairingEvent::Cancel),
            "keepalive" => Some(PairingEvent::Keepalive),
            "keepalive_ack" => Some(PairingEvent::KeepaliveAck),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscussionEvent {
    NewMessage,
    ReadMessages,
}

impl DiscussionEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            DiscussionEvent::NewMessage => "new_message",
            DiscussionEvent::ReadMessages => "read_messages",
        }
    }

    fn from_wire(value: &str) -> Option<Self> {
        match value {
            "new_message" => Some(DiscussionEvent::NewMessage),
            "read_messages" => Some(DiscussionEvent::ReadMessages),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationEvent {
    NewNotification,
    UpdateNotification,
    SetRead,
}

impl NotificationEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationEvent::NewNotification => "new_notification",
            NotificationEvent::UpdateNotification => "update_notification",
            NotificationEvent::SetRead => "set_read",
        }
    }

    fn from_wire(value: &str) -> Option<Self> {
        match value {
            "new_notification" => Some(NotificationEvent::NewNotification),
            "update_notification" => Some(NotificationEvent::UpdateNotification),
            "set_read" => Some(NotificationEvent::SetRead),
            _ => None,
        }
    }
}

/// A `(topic, event_type)` pair known at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KnownEvent {
    Pairing(PairingEvent),
    Discussion(DiscussionEvent),
    Notification(NotificationEvent),
}

impl KnownEvent {
    pub fn topic(self) -> Topic {
        match self {
            KnownEvent::Pairing(_) => Topic::Pairing,
            KnownEvent::Discussion(_) => Topic::Discussion,
            KnownEvent::Notification(_) => Topic::Notification,
        }
    }

    pub fn event_type(self) -> &'static str {
        match self {
            KnownEvent::Pairing(event) => event.as_str(),
            KnownEvent::Discussion(event) => event.as_str(),
            KnownEvent::Notification(event) => event.as_str(),
        }
    }

    pub fn routing_key(self) -> RoutingKey {
        RoutingKey::new(self.topic().as_str(), self.event_type())
    }

    /// Map a wire routing key back onto the typed vocabulary.
    pub fn from_key(key: &RoutingKey) -> Option<Self> {
        match Topic::from_wire(key.topic())? {
            Topic::Pairing => PairingEvent::from_wire(key.event_type()).map(KnownEvent::Pairing),
            Topic::Discussion => {
                DiscussionEvent::from_wire(key.event_type()).map(KnownEvent::Discussion)
            }
            Topic::Notification => {
                NotificationEvent::from_wire(key.event_type()).map(KnownEvent::Notification)
            }
        }
    }
}

impl From<PairingEvent> for KnownEvent {
    fn from(event: PairingEvent) -> Self {
        KnownEvent::Pairing(event)
    }
}

impl From<DiscussionEvent> for KnownEvent {
    fn from(event: DiscussionEvent) -> Self {
        KnownEvent::Discussion(event)
    }
}

impl From<NotificationEvent> for KnownEvent {
    fn from(event: NotificationEvent) -> Self {
        KnownEvent::Notification(event)
    }
}
