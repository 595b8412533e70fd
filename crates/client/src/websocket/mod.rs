//! WebSocket transport
//!
//! - `transport`: the `Connector` port and the `TransportLink` it yields
//! - `client`: tokio-tungstenite based `Connector`

mod client;
mod transport;

pub use client::WsConnector;
pub use transport::{Connector, TransportEvent, TransportLink};
