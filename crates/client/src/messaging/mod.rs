//! Session messaging core.
//!
//! - `registry`: handlers keyed by `(topic, event_type)`
//! - `queue`: frames waiting for the transport
//! - `connection`: the connection lifecycle state machine
//! - `dispatcher`: decode, cross-cutting side effects, fan-out
//!
//! The session actor (`crate::session`) owns one of each and is the only code
//! that mutates them.

pub mod connection;
pub mod dispatcher;
pub mod queue;
pub mod registry;

pub use connection::{ConnectionLifecycle, ConnectionState, FailureOutcome};
pub use dispatcher::{Dispatched, Dispatcher};
pub use queue::{EnqueueOutcome, OutboundQueue, Overflow, QueuePolicy};
pub use registry::{Handler, HandlerRegistry};
