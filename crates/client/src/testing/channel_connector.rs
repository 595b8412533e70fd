//! In-memory connector for driving a session from tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use opendebate_protocol::{decode, Envelope};
use tokio::sync::mpsc;
use url::Url;

use crate::error::TransportError;
use crate::websocket::{Connector, TransportEvent, TransportLink};

/// Outcome of one open attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenScript {
    Accept,
    Refuse(String),
}

struct Shared {
    script: Mutex<VecDeque<OpenScript>>,
    attempts: AtomicUsize,
    accepted_tx: mpsc::UnboundedSender<ServerEnd>,
    accepted_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ServerEnd>>,
}

/// `Connector` backed by channels. Attempts follow the script, then accept.
#[derive(Clone)]
pub struct ChannelConnector {
    shared: Arc<Shared>,
}

impl Default for ChannelConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelConnector {
    pub fn new() -> Self {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                script: Mutex::new(VecDeque::new()),
                attempts: AtomicUsize::new(0),
                accepted_tx,
                accepted_rx: tokio::sync::Mutex::new(accepted_rx),
            }),
        }
    }

    /// Queue the outcome of a future attempt.
    pub fn push(&self, outcome: OpenScript) {
        self.shared
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    /// Refuse the next `count` attempts.
    pub fn refuse_next(&self, count: usize) {
        for _ in 0..count {
            self.push(OpenScript::Refuse("connection refused".to_string()));
        }
    }

    /// Open attempts made so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Wait for the next accepted connection.
    pub async fn next_server(&self) -> Option<ServerEnd> {
        self.shared.accepted_rx.lock().await.recv().await
    }

    /// The next accepted connection, if one is already waiting.
    pub fn try_next_server(&self) -> Option<ServerEnd> {
        self.shared.accepted_rx.try_lock().ok()?.try_recv().ok()
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn open(&self, endpoint: &Url) -> Result<TransportLink, TransportError> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .shared
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(OpenScript::Accept);

        match outcome {
            OpenScript::Refuse(reason) => {
                tracing::debug!(%endpoint, %reason, "Scripted refusal");
                Err(TransportError::Connect(reason))
            }
            OpenScript::Accept => {
                let (out_tx, out_rx) = mpsc::unbounded_channel();
                let (in_tx, in_rx) = mpsc::unbounded_channel();
                let server = ServerEnd {
                    from_client: out_rx,
                    to_client: in_tx,
                };
                self.shared
                    .accepted_tx
                    .send(server)
                    .map_err(|_| TransportError::Connect("test server gone".to_string()))?;
                Ok(TransportLink::new(out_tx, in_rx))
            }
        }
    }
}

/// The server side of an accepted in-memory connection.
#[derive(Debug)]
pub struct ServerEnd {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<TransportEvent>,
}

impl ServerEnd {
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.to_client.send(TransportEvent::Message(text.into()));
    }

    pub fn send_envelope(&self, envelope: &Envelope) {
        self.send_text(envelope.to_wire());
    }

    /// Close from the server side.
    pub fn close(&self) {
        let _ = self.to_client.send(TransportEvent::Closed(None));
    }

    pub fn error(&self, message: impl Into<String>) {
        let _ = self.to_client.send(TransportEvent::Error(message.into()));
    }

    /// Next frame the client wrote. `None` once the client dropped the link.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    pub async fn recv_envelope(&mut self) -> Option<Envelope> {
        let frame = self.recv().await?;
        decode(&frame).ok()
    }

    /// Every frame already written by the client.
    pub fn drain_received(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.from_client.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// True once the client side has dropped its link.
    pub fn is_client_closed(&self) -> bool {
        self.to_client.is_closed()
    }
}
