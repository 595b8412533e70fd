//! WebSocket connector using tokio-tungstenite

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use super::transport::{Connector, TransportEvent, TransportLink};
use crate::error::TransportError;

/// Opens real sockets. Each link gets a reader task and a writer task.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, endpoint: &Url) -> Result<TransportLink, TransportError> {
        let (ws_stream, _) = connect_async(endpoint.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        tracing::info!("Connected to {}", endpoint);

        let (mut write, mut read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<TransportEvent>();

        let reader_tx = in_tx.clone();
        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                let event = match msg {
                    Ok(Message::Text(text)) => TransportEvent::Message(text),
                    Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                        Ok(text) => TransportEvent::Message(text),
                        Err(e) => {
                            tracing::warn!("Dropping non-UTF-8 binary frame: {}", e);
                            continue;
                        }
                    },
                    Ok(Message::Close(frame)) => {
                        tracing::info!("Server closed connection");
                        let reason = frame.map(|f| f.reason.into_owned());
                        let _ = reader_tx.send(TransportEvent::Closed(reason));
                        return;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::error!("WebSocket error: {}", e);
                        let _ = reader_tx.send(TransportEvent::Error(e.to_string()));
                        return;
                    }
                };
                if reader_tx.send(event).is_err() {
                    // link dropped
                    return;
                }
            }
            let _ = reader_tx.send(TransportEvent::Closed(None));
        });

        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if let Err(e) = write.send(Message::Text(frame)).await {
                    tracing::error!("Failed to send message: {}", e);
                    let _ = in_tx.send(TransportEvent::Error(e.to_string()));
                    return;
                }
            }
            // The session dropped the link.
            if let Err(e) = write.close().await {
                tracing::debug!("Error closing socket: {}", e);
            }
        });

        Ok(TransportLink::new(out_tx, in_rx))
    }
}
