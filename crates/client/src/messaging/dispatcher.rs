//! Inbound dispatch.
//!
//! Order of operations for every frame:
//! 1. decode (undecodable frames are logged and dropped)
//! 2. `redirect` navigation
//! 3. toast for messages and errors
//! 4. fan-out to the registered handlers

use opendebate_protocol::{
    data_as, decode, Data, DecodeError, Envelope, RedirectPayload, RoutingKey, Status, REDIRECT_EVENT,
};
use serde_json::Value;

use super::registry::{Handler, HandlerRegistry};
use crate::ports::{Notice, UiPort};

/// Result of dispatching one decoded frame.
#[derive(Debug, Clone)]
pub struct Dispatched {
    pub envelope: Envelope,
    pub handlers_invoked: usize,
}

#[derive(Debug, Default)]
pub struct Dispatcher {
    registry: HandlerRegistry,
}

impl Dispatcher {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn register(&mut self, key: RoutingKey, handler: Handler) {
        self.registry.register_key(key, handler);
    }

    /// Decode and dispatch a text frame.
    pub fn dispatch(&self, frame: &str, ui: &dyn UiPort) -> Result<Dispatched, DecodeError> {
        let envelope = match decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping undecodable frame");
                return Err(e);
            }
        };
        let handlers_invoked = self.dispatch_envelope(&envelope, ui);
        Ok(Dispatched {
            envelope,
            handlers_invoked,
        })
    }

    /// Dispatch an already decoded envelope. Returns how many handlers ran.
    pub fn dispatch_envelope(&self, envelope: &Envelope, ui: &dyn UiPort) -> usize {
        if envelope.event_type == REDIRECT_EVENT {
            redirect(envelope, ui);
        }

        if let Some(notice) = toast_for(envelope) {
            ui.notify(notice);
        }

        let key = envelope.routing_key();
        let handlers = self.registry.lookup(&key);
        if handlers.is_empty() {
            tracing::debug!(
                key = %key,
                available = ?self.registry.keys().map(ToString::to_string).collect::<Vec<_>>(),
                "No handler for key"
            );
            return 0;
        }

        let data = handler_data(envelope);
        for handler in handlers {
            handler(&data);
        }
        handlers.len()
    }
}

fn redirect(envelope: &Envelope, ui: &dyn UiPort) {
    match data_as::<RedirectPayload>(&envelope.data_or_default()) {
        Ok(RedirectPayload { url }) => {
            tracing::info!(url = %url, "Server requested redirect");
            ui.navigate(&url);
        }
        Err(e) => tracing::warn!(
            topic = %envelope.topic,
            error = %e,
            "Redirect without a usable data.url"
        ),
    }
}

/// Toast for an envelope, if it warrants one.
pub fn toast_for(envelope: &Envelope) -> Option<Notice> {
    if envelope.no_toast {
        return None;
    }
    let is_error = envelope.status == Status::Error;
    if envelope.message.is_none() && !is_error {
        return None;
    }

    let severity = if envelope.status.is_set() {
        envelope.status
    } else {
        Status::Info
    };
    let text = match (is_error, envelope.message.as_deref()) {
        (true, Some(message)) => {
            format!("Error websocket status ({}): {}", envelope.event_type, message)
        }
        (true, None) => format!("Error websocket status ({})", envelope.event_type),
        (false, message) => message.unwrap_or_default().to_string(),
    };

    Some(Notice::new(
        severity,
        text,
        envelope.status == Status::Success,
    ))
}

/// Payload data with `status` merged in when the payload does not carry its own.
pub fn handler_data(envelope: &Envelope) -> Data {
    let mut data = envelope.data_or_default();
    if envelope.status.is_set() && !data.contains_key("status") {
        data.insert(
            "status".to_string(),
            Value::String(envelope.status.as_str().to_string()),
        );
    }
    data
}
