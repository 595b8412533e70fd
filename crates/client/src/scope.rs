//! Feature scope.
//!
//! A page feature (the pairing screen, a discussion view) opens a scope when it
//! becomes active and closes it when it goes away. The scope owns every ticker
//! the feature started and the heartbeat it asked for, so leaving the feature
//! cannot leak a timer or leave a keepalive running.

use std::time::Duration;

use crate::error::SessionError;
use crate::session::{LivenessOptions, SessionHandle};
use crate::timers::{TimerId, TimerSet};

#[derive(Debug)]
pub struct FeatureScope {
    name: String,
    session: SessionHandle,
    timers: TimerSet,
    liveness: bool,
    closed: bool,
}

impl FeatureScope {
    pub fn new(name: impl Into<String>, session: SessionHandle) -> Self {
        let name = name.into();
        tracing::debug!(scope = %name, "Feature scope opened");
        Self {
            name,
            session,
            timers: TimerSet::new(),
            liveness: false,
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Periodic UI work (countdowns, relative timestamps) owned by this scope.
    pub fn spawn_ticker<F>(&mut self, period: Duration, tick: F) -> TimerId
    where
        F: FnMut() + Send + 'static,
    {
        self.timers.spawn_interval(period, tick)
    }

    pub fn cancel_ticker(&mut self, id: TimerId) -> bool {
        self.timers.cancel(id)
    }

    pub fn ticker_count(&self) -> usize {
        self.timers.len()
    }

    /// Start the session heartbeat; it is stopped again when the scope closes.
    pub fn start_liveness(&mut self, options: LivenessOptions) -> Result<(), SessionError> {
        self.session.start_heartbeat(options)?;
        self.liveness = true;
        Ok(())
    }

    /// Cancel every ticker and stop the heartbeat this scope started.
    /// Safe to call more than once.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let cancelled = self.timers.cancel_all();
        if self.liveness {
            self.liveness = false;
            if let Err(e) = self.session.stop_heartbeat() {
                tracing::debug!(scope = %self.name, error = %e, "Session already gone");
            }
        }
        tracing::debug!(scope = %self.name, cancelled, "Feature scope closed");
    }
}

impl Drop for FeatureScope {
    fn drop(&mut self) {
        self.close();
    }
}
