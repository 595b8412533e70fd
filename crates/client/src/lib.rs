//! OpenDebate Client - persistent websocket session core.
//!
//! One session per page load owns the single socket to the server and gives
//! every feature on the page:
//! - handler registration keyed by `topic.event_type` (`messaging::registry`)
//! - sends that are queued while the socket is down (`messaging::queue`)
//! - bounded, fixed-delay reconnection (`messaging::connection`)
//! - redirect and toast handling for every inbound frame (`messaging::dispatcher`)
//! - an opt-in application heartbeat (`heartbeat`)
//!
//! Rendering is left to the embedder through [`UiPort`].

pub mod config;
pub mod error;
pub mod heartbeat;
pub mod messaging;
pub mod ports;
pub mod scope;
pub mod session;
pub mod timers;
pub mod websocket;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::SessionConfig;
pub use error::{SessionError, TransportError};
pub use heartbeat::{HeartbeatConfig, HeartbeatPhase, LivenessAlert};
pub use messaging::ConnectionState;
pub use ports::{Notice, TracingUi, UiPort};
pub use scope::FeatureScope;
pub use session::{create_session, LivenessOptions, SessionHandle};
pub use websocket::WsConnector;
