//! Handler registry.
//!
//! Maps a routing key to the callbacks subscribed to it, in registration order.
//! Registering the same callback twice means it runs twice per message.

use std::collections::HashMap;
use std::sync::Arc;

use opendebate_protocol::{Data, RoutingKey};

/// Subscriber callback. Receives the payload data with `status` merged in.
pub type Handler = Arc<dyn Fn(&Data) + Send + Sync + 'static>;

#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<RoutingKey, Vec<Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, topic: &str, event_type: &str, handler: F)
    where
        F: Fn(&Data) + Send + Sync + 'static,
    {
        self.register_key(RoutingKey::new(topic, event_type), Arc::new(handler));
    }

    pub fn register_key(&mut self, key: RoutingKey, handler: Handler) {
        tracing::debug!(key = %key, "Registering handler");
        self.handlers.entry(key).or_default().push(handler);
    }

    /// Handlers for `key` in registration order; empty when none are registered.
    pub fn lookup(&self, key: &RoutingKey) -> &[Handler] {
        self.handlers.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Remove every handler for `key`, returning how many were removed.
    pub fn remove(&mut self, key: &RoutingKey) -> usize {
        self.handlers.remove(key).map_or(0, |removed| removed.len())
    }

    /// Total number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &RoutingKey> {
        self.handlers.keys()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut counts: Vec<(String, usize)> = self
            .handlers
            .iter()
            .map(|(key, handlers)| (key.to_string(), handlers.len()))
            .collect();
        counts.sort();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &counts)
            .finish()
    }
}
