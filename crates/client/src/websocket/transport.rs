//! Transport abstraction.
//!
//! A [`Connector`] opens one socket and hands back a [`TransportLink`]: a sender
//! for outgoing text frames and a receiver of [`TransportEvent`]s. Dropping the
//! link closes the socket.

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame from the server.
    Message(String),
    /// The socket closed, with the close reason if one was given.
    Closed(Option<String>),
    /// The socket failed.
    Error(String),
}

#[derive(Debug)]
pub struct TransportLink {
    outgoing: mpsc::UnboundedSender<String>,
    incoming: mpsc::UnboundedReceiver<TransportEvent>,
}

impl TransportLink {
    pub fn new(
        outgoing: mpsc::UnboundedSender<String>,
        incoming: mpsc::UnboundedReceiver<TransportEvent>,
    ) -> Self {
        Self { outgoing, incoming }
    }

    /// Hand a frame to the writer. Once the writer has gone away the frame is
    /// returned inside the error so the caller can queue it again.
    pub fn send(&self, frame: String) -> Result<(), mpsc::error::SendError<String>> {
        self.outgoing.send(frame)
    }

    /// Next event from the socket. A silently vanished reader reads as a close.
    pub async fn recv(&mut self) -> TransportEvent {
        self.incoming
            .recv()
            .await
            .unwrap_or(TransportEvent::Closed(None))
    }
}

/// Opens transport links to the server.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open(&self, endpoint: &Url) -> Result<TransportLink, TransportError>;
}
