//! Test doubles for the session.
//!
//! Compiled for this crate's own tests and for dependents that enable the
//! `testing` feature.
//!
//! - `ChannelConnector`: in-memory `Connector` with a scriptable accept/refuse
//!   sequence; each accepted open hands the test a `ServerEnd`
//! - `RecordingUi`: `UiPort` that records every call

mod channel_connector;
mod recording_ui;

pub use channel_connector::{ChannelConnector, OpenScript, ServerEnd};
pub use recording_ui::{RecordingUi, UiRecord};
