//! Connection lifecycle management.
//!
//! `ConnectionLifecycle` is the state machine behind the session's single
//! socket. It decides; the session actor acts (opens sockets, arms the
//! reconnect deadline, flushes the queue).

use std::time::Duration;

use tokio::time::Instant;

/// Connection state for the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected to the server
    Disconnected,
    /// Attempting to establish connection
    Connecting,
    /// Successfully connected
    Connected,
    /// Connection lost, waiting to try again
    Reconnecting { attempts_remaining: u32 },
    /// Connection failed (retry budget exhausted)
    Failed,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }
}

/// What the controller decided after a close or error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// A reconnect is scheduled after `delay`.
    Retry {
        delay: Duration,
        attempts_remaining: u32,
    },
    /// Budget exhausted; the session is now `Failed`.
    GiveUp,
    /// Nothing was in flight (already disconnected or failed).
    Ignored,
}

#[derive(Debug)]
pub struct ConnectionLifecycle {
    state: ConnectionState,
    max_retries: u32,
    retry_delay: Duration,
    retries_remaining: u32,
    reconnect_due: Option<Instant>,
}

impl ConnectionLifecycle {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            max_retries,
            retry_delay,
            retries_remaining: max_retries,
            reconnect_due: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn retries_remaining(&self) -> u32 {
        self.retries_remaining
    }

    pub fn reconnect_due(&self) -> Option<Instant> {
        self.reconnect_due
    }

    /// Begin opening the transport with the given budget.
    ///
    /// Returns `false` (and changes nothing) while already `Connecting` or
    /// `Connected`. A pending backoff is cancelled.
    pub fn request_connect(&mut self, retries_remaining: u32) -> bool {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            tracing::debug!(state = ?self.state, "Ignoring connect request, socket already live");
            return false;
        }
        self.retries_remaining = retries_remaining;
        self.reconnect_due = None;
        self.state = ConnectionState::Connecting;
        true
    }

    /// Transport opened. Every later failure starts from a full budget.
    pub fn on_open(&mut self) {
        self.state = ConnectionState::Connected;
        self.retries_remaining = self.max_retries;
        self.reconnect_due = None;
    }

    /// Transport closed or errored (treated the same), or an open attempt failed.
    pub fn on_failure(&mut self, now: Instant) -> FailureOutcome {
        if !matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            return FailureOutcome::Ignored;
        }

        if self.retries_remaining == 0 {
            self.state = ConnectionState::Failed;
            self.reconnect_due = None;
            return FailureOutcome::GiveUp;
        }

        self.retries_remaining -= 1;
        self.state = ConnectionState::Reconnecting {
            attempts_remaining: self.retries_remaining,
        };
        self.reconnect_due = Some(now + self.retry_delay);
        FailureOutcome::Retry {
            delay: self.retry_delay,
            attempts_remaining: self.retries_remaining,
        }
    }

    /// Returns `true` when the backoff has elapsed and a new attempt should start.
    pub fn poll_reconnect(&mut self, now: Instant) -> bool {
        match self.reconnect_due {
            Some(due) if due <= now => {
                self.reconnect_due = None;
                self.state = ConnectionState::Connecting;
                true
            }
            _ => false,
        }
    }

    /// Intentional disconnect: no retry is scheduled.
    pub fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.reconnect_due = None;
        self.retries_remaining = self.max_retries;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lifecycle(max_retries: u32) -> ConnectionLifecycle {
        ConnectionLifecycle::new(max_retries, Duration::from_millis(3_000))
    }

    #[test]
    fn connect_is_guarded_while_live() {
        let mut lc = lifecycle(3);
        assert!(lc.request_connect(3));
        assert_eq!(lc.state(), ConnectionState::Connecting);
        assert!(!lc.request_connect(3));

        lc.on_open();
        assert!(!lc.request_connect(3));
        assert_eq!(lc.state(), ConnectionState::Connected);
    }

    #[test]
    fn failure_schedules_fixed_backoff_and_decrements() {
        let now = Instant::now();
        let mut lc = lifecycle(2);
        lc.request_connect(2);
        lc.on_open();

        assert_eq!(
            lc.on_failure(now),
            FailureOutcome::Retry {
                delay: Duration::from_millis(3_000),
                attempts_remaining: 1
            }
        );
        assert_eq!(
            lc.state(),
            ConnectionState::Reconnecting {
                attempts_remaining: 1
            }
        );
        assert!(!lc.poll_reconnect(now + Duration::from_millis(2_999)));
        assert!(lc.poll_reconnect(now + Duration::from_millis(3_000)));
        assert_eq!(lc.state(), ConnectionState::Connecting);

        // the open attempt fails too
        assert!(matches!(lc.on_failure(now), FailureOutcome::Retry { attempts_remaining: 0, .. }));
        assert!(lc.poll_reconnect(now + Duration::from_secs(3)));
        assert_eq!(lc.on_failure(now), FailureOutcome::GiveUp);
        assert_eq!(lc.state(), ConnectionState::Failed);
        assert_eq!(lc.reconnect_due(), None);
    }

    #[test]
    fn zero_budget_fails_immediately() {
        let mut lc = lifecycle(5);
        lc.request_connect(0);
        lc.on_open();
        // a successful open re-seeds the budget
        assert_eq!(lc.retries_remaining(), 5);

        let mut lc = lifecycle(5);
        lc.request_connect(0);
        assert_eq!(lc.on_failure(Instant::now()), FailureOutcome::GiveUp);
        assert_eq!(lc.state(), ConnectionState::Failed);
    }

    #[test]
    fn successful_open_restores_full_budget() {
        let now = Instant::now();
        let mut lc = lifecycle(3);
        lc.request_connect(3);
        lc.on_failure(now);
        lc.poll_reconnect(now + Duration::from_secs(3));
        lc.on_failure(now);
        assert_eq!(lc.retries_remaining(), 1);

        lc.poll_reconnect(now + Duration::from_secs(6));
        lc.on_open();
        assert_eq!(lc.retries_remaining(), 3);
        assert!(matches!(
            lc.on_failure(now),
            FailureOutcome::Retry {
                attempts_remaining: 2,
                ..
            }
        ));
    }

    #[test]
    fn connect_during_backoff_cancels_it() {
        let now = Instant::now();
        let mut lc = lifecycle(3);
        lc.request_connect(3);
        lc.on_failure(now);
        assert!(lc.reconnect_due().is_some());

        assert!(lc.request_connect(3));
        assert_eq!(lc.reconnect_due(), None);
        assert_eq!(lc.state(), ConnectionState::Connecting);
    }

    #[test]
    fn failures_after_disconnect_are_ignored() {
        let mut lc = lifecycle(3);
        lc.request_connect(3);
        lc.on_open();
        lc.disconnect();
        assert_eq!(lc.on_failure(Instant::now()), FailureOutcome::Ignored);
        assert_eq!(lc.state(), ConnectionState::Disconnected);
    }
}
