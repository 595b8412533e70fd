//! OpenDebate Protocol - wire types shared by the websocket session client
//!
//! This crate contains everything that crosses the socket:
//! - The `Envelope` and its JSON codec (`encode` / `decode`)
//! - `RoutingKey`, the `topic.event_type` pair handlers are registered under
//! - `KnownEvent`, the typed vocabulary of routing keys the site uses
//! - `MessageBuilder`, constructors for every outbound message
//! - typed payload views (`data_as`) for handlers that want structure
//!
//! # Design Principles
//!
//! 1. **Minimal dependencies** - Only serde, serde_json, thiserror and tracing
//! 2. **No business logic** - Pure data types and serialization
//! 3. **String keys at the edge only** - features route on `KnownEvent`

pub mod envelope;
pub mod events;
pub mod messages;
pub mod payloads;
pub mod routing;

pub use envelope::{decode, encode, DecodeError, Envelope, Status};
pub use events::{DiscussionEvent, KnownEvent, NotificationEvent, PairingEvent, Topic};
pub use messages::{MessageBuilder, Stance};
pub use payloads::{data_as, NotificationPayload, RedirectPayload};
pub use routing::{RoutingKey, REDIRECT_EVENT};

/// Payload map carried by every envelope.
pub type Data = serde_json::Map<String, serde_json::Value>;
