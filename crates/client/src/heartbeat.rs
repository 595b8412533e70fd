//! Application-level heartbeat.
//!
//! `HeartbeatMonitor` is a clock-injected state machine: callers pass the
//! current `Instant` in and act on the returned [`HeartbeatAction`]s. The
//! session actor sleeps until [`HeartbeatMonitor::next_deadline`] and calls
//! [`HeartbeatMonitor::poll`].
//!
//! ```text
//! Idle -> Beating -> AwaitingAck <-> Beating -> Stopped | Exhausted
//! ```

use std::time::Duration;

use opendebate_protocol::Status;
use tokio::time::Instant;

pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 10_000;
pub const DEFAULT_ACK_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_HEARTBEAT_MAX_RETRIES: u32 = 5;
/// Shortest interval or ack timeout a monitor runs with.
pub const MIN_HEARTBEAT_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub interval: Duration,
    pub ack_timeout: Duration,
    /// Consecutive failures tolerated before giving up.
    pub max_retries: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL_MS),
            ack_timeout: Duration::from_millis(DEFAULT_ACK_TIMEOUT_MS),
            max_retries: DEFAULT_HEARTBEAT_MAX_RETRIES,
        }
    }
}

/// Error banner shown while liveness is in doubt. The most recent cause wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LivenessAlert {
    /// No acknowledgment arrived in time.
    ConnectionError,
    /// The server answered the keepalive with `status: error`.
    ServerError(Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatPhase {
    Idle,
    Beating,
    AwaitingAck,
    Stopped,
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatAction {
    SendKeepalive,
    /// The banner changed: show the alert, or clear it on `None`.
    Alert(Option<LivenessAlert>),
    /// Retry budget spent; both timers are cancelled.
    Exhausted,
}

#[derive(Debug)]
pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    phase: HeartbeatPhase,
    retries: u32,
    alert: Option<LivenessAlert>,
    next_beat: Option<Instant>,
    ack_deadline: Option<Instant>,
}

impl HeartbeatMonitor {
    /// Zero periods are raised to [`MIN_HEARTBEAT_PERIOD`] so a beat can never
    /// fall due at the instant it was sent.
    pub fn new(mut config: HeartbeatConfig) -> Self {
        if config.interval < MIN_HEARTBEAT_PERIOD || config.ack_timeout < MIN_HEARTBEAT_PERIOD {
            tracing::warn!(
                interval = ?config.interval,
                ack_timeout = ?config.ack_timeout,
                "Heartbeat period below minimum, clamping"
            );
            config.interval = config.interval.max(MIN_HEARTBEAT_PERIOD);
            config.ack_timeout = config.ack_timeout.max(MIN_HEARTBEAT_PERIOD);
        }
        Self {
            config,
            phase: HeartbeatPhase::Idle,
            retries: 0,
            alert: None,
            next_beat: None,
            ack_deadline: None,
        }
    }

    pub fn config(&self) -> HeartbeatConfig {
        self.config
    }

    pub fn phase(&self) -> HeartbeatPhase {
        self.phase
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn alert(&self) -> Option<&LivenessAlert> {
        self.alert.as_ref()
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self.phase,
            HeartbeatPhase::Beating | HeartbeatPhase::AwaitingAck
        )
    }

    pub fn next_beat(&self) -> Option<Instant> {
        self.next_beat
    }

    pub fn ack_deadline(&self) -> Option<Instant> {
        self.ack_deadline
    }

    /// Earliest pending timer, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.next_beat, self.ack_deadline) {
            (Some(beat), Some(ack)) => Some(beat.min(ack)),
            (beat, ack) => beat.or(ack),
        }
    }

    /// Start (or restart) beating. The first keepalive goes out immediately.
    pub fn start(&mut self, now: Instant) -> Vec<HeartbeatAction> {
        let mut actions = Vec::new();
        self.retries = 0;
        self.set_alert(None, &mut actions);
        self.beat(now, &mut actions);
        actions
    }

    /// An acknowledgment arrived.
    ///
    /// Anything other than `status: error` counts as success.
    pub fn on_ack(&mut self, status: Status, message: Option<String>) -> Vec<HeartbeatAction> {
        let mut actions = Vec::new();
        if !self.is_running() {
            tracing::debug!(phase = ?self.phase, "Ignoring keepalive ack, heartbeat not running");
            return actions;
        }

        self.ack_deadline = None;
        if status == Status::Error {
            self.fail(LivenessAlert::ServerError(message), &mut actions);
        } else {
            self.retries = 0;
            self.phase = HeartbeatPhase::Beating;
            self.set_alert(None, &mut actions);
        }
        actions
    }

    /// Fire whichever timers are due at `now`. An expired ack deadline is
    /// evaluated before a beat due at the same instant.
    pub fn poll(&mut self, now: Instant) -> Vec<HeartbeatAction> {
        let mut actions = Vec::new();
        if !self.is_running() {
            return actions;
        }

        if self.ack_deadline.is_some_and(|deadline| deadline <= now) {
            self.ack_deadline = None;
            tracing::warn!(retries = self.retries + 1, "Keepalive ack timed out");
            self.fail(LivenessAlert::ConnectionError, &mut actions);
            if !self.is_running() {
                return actions;
            }
        }

        if self.next_beat.is_some_and(|due| due <= now) {
            self.beat(now, &mut actions);
        }
        actions
    }

    /// Cancel both timers. Safe to call repeatedly and from any phase.
    pub fn stop(&mut self) -> Vec<HeartbeatAction> {
        let mut actions = Vec::new();
        self.next_beat = None;
        self.ack_deadline = None;
        if self.phase == HeartbeatPhase::Stopped {
            return actions;
        }
        self.phase = HeartbeatPhase::Stopped;
        self.set_alert(None, &mut actions);
        actions
    }

    /// Clear the banner without touching timers or phase.
    pub fn clear_alert(&mut self) -> Vec<HeartbeatAction> {
        let mut actions = Vec::new();
        self.set_alert(None, &mut actions);
        actions
    }

    fn beat(&mut self, now: Instant, actions: &mut Vec<HeartbeatAction>) {
        actions.push(HeartbeatAction::SendKeepalive);
        self.next_beat = Some(now + self.config.interval);
        self.ack_deadline = Some(now + self.config.ack_timeout);
        self.phase = HeartbeatPhase::AwaitingAck;
    }

    fn fail(&mut self, alert: LivenessAlert, actions: &mut Vec<HeartbeatAction>) {
        self.set_alert(Some(alert), actions);
        self.retries += 1;
        self.phase = HeartbeatPhase::Beating;

        if self.retries >= self.config.max_retries {
            tracing::error!(retries = self.retries, "Heartbeat retries exhausted");
            self.next_beat = None;
            self.ack_deadline = None;
            self.phase = HeartbeatPhase::Exhausted;
            actions.push(HeartbeatAction::Exhausted);
        }
    }

    fn set_alert(&mut self, alert: Option<LivenessAlert>, actions: &mut Vec<HeartbeatAction>) {
        if self.alert != alert {
            self.alert = alert.clone();
            actions.push(HeartbeatAction::Alert(alert));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn monitor(max_retries: u32) -> HeartbeatMonitor {
        HeartbeatMonitor::new(HeartbeatConfig {
            interval: secs(10),
            ack_timeout: secs(10),
            max_retries,
        })
    }

    fn keepalives(actions: &[HeartbeatAction]) -> usize {
        actions
            .iter()
            .filter(|a| **a == HeartbeatAction::SendKeepalive)
            .count()
    }

    #[test]
    fn start_sends_immediately_and_arms_both_timers() {
        let t0 = Instant::now();
        let mut hb = monitor(5);
        assert_eq!(hb.phase(), HeartbeatPhase::Idle);

        let actions = hb.start(t0);
        assert_eq!(actions, vec![HeartbeatAction::SendKeepalive]);
        assert_eq!(hb.phase(), HeartbeatPhase::AwaitingAck);
        assert_eq!(hb.next_beat(), Some(t0 + secs(10)));
        assert_eq!(hb.ack_deadline(), Some(t0 + secs(10)));
    }

    #[test]
    fn zero_periods_are_clamped() {
        let t0 = Instant::now();
        let mut hb = HeartbeatMonitor::new(HeartbeatConfig {
            interval: Duration::ZERO,
            ack_timeout: Duration::ZERO,
            max_retries: 5,
        });
        assert_eq!(hb.config().interval, MIN_HEARTBEAT_PERIOD);

        assert_eq!(keepalives(&hb.start(t0)), 1);
        assert_eq!(hb.next_deadline(), Some(t0 + MIN_HEARTBEAT_PERIOD));
        // nothing more is due until time moves
        assert!(hb.poll(t0).is_empty());
    }

    #[test]
    fn successful_ack_clears_error_and_resets_retries() {
        let t0 = Instant::now();
        let mut hb = monitor(5);
        hb.start(t0);

        let actions = hb.poll(t0 + secs(10));
        assert_eq!(
            actions,
            vec![
                HeartbeatAction::Alert(Some(LivenessAlert::ConnectionError)),
                HeartbeatAction::SendKeepalive,
            ]
        );
        assert_eq!(hb.retries(), 1);

        let actions = hb.on_ack(Status::Success, None);
        assert_eq!(actions, vec![HeartbeatAction::Alert(None)]);
        assert_eq!(hb.retries(), 0);
        assert_eq!(hb.alert(), None);
        assert_eq!(hb.ack_deadline(), None);
        assert_eq!(hb.phase(), HeartbeatPhase::Beating);
    }

    #[test]
    fn server_error_replaces_connection_error() {
        let t0 = Instant::now();
        let mut hb = monitor(5);
        hb.start(t0);
        hb.poll(t0 + secs(10));

        let actions = hb.on_ack(Status::Error, Some("No active request".into()));
        assert_eq!(
            actions,
            vec![HeartbeatAction::Alert(Some(LivenessAlert::ServerError(Some(
                "No active request".into()
            ))))]
        );
        assert_eq!(hb.retries(), 2);
    }

    #[test]
    fn repeated_timeouts_do_not_repeat_the_alert() {
        let t0 = Instant::now();
        let mut hb = monitor(5);
        hb.start(t0);
        hb.poll(t0 + secs(10));

        let actions = hb.poll(t0 + secs(20));
        assert_eq!(actions, vec![HeartbeatAction::SendKeepalive]);
        assert_eq!(hb.retries(), 2);
    }

    #[test]
    fn consecutive_timeouts_exhaust_the_budget() {
        let t0 = Instant::now();
        let mut hb = monitor(5);
        let mut sent = keepalives(&hb.start(t0));

        for n in 1..=5 {
            let actions = hb.poll(t0 + secs(10 * n));
            sent += keepalives(&actions);
            if n == 5 {
                assert!(actions.contains(&HeartbeatAction::Exhausted));
            }
        }

        assert_eq!(hb.phase(), HeartbeatPhase::Exhausted);
        assert_eq!(hb.next_deadline(), None);
        assert_eq!(sent, 5);
        assert!(hb.poll(t0 + secs(60)).is_empty());
        // the banner stays up until someone stops the heartbeat
        assert_eq!(hb.alert(), Some(&LivenessAlert::ConnectionError));
    }

    #[test]
    fn stop_is_idempotent() {
        let t0 = Instant::now();
        let mut hb = monitor(5);
        hb.start(t0);
        hb.poll(t0 + secs(10));

        assert_eq!(hb.stop(), vec![HeartbeatAction::Alert(None)]);
        assert_eq!(hb.phase(), HeartbeatPhase::Stopped);
        assert_eq!(hb.next_deadline(), None);

        assert!(hb.stop().is_empty());
        assert_eq!(hb.phase(), HeartbeatPhase::Stopped);
        assert_eq!(hb.next_deadline(), None);
        assert!(hb.poll(t0 + secs(30)).is_empty());
    }

    #[test]
    fn ack_after_stop_is_ignored() {
        let mut hb = monitor(5);
        hb.start(Instant::now());
        hb.stop();
        assert!(hb.on_ack(Status::Error, None).is_empty());
        assert_eq!(hb.retries(), 0);
    }

    #[test]
    fn clear_alert_keeps_exhausted_phase() {
        let t0 = Instant::now();
        let mut hb = monitor(1);
        hb.start(t0);
        hb.poll(t0 + secs(10));

        assert_eq!(hb.clear_alert(), vec![HeartbeatAction::Alert(None)]);
        assert!(hb.clear_alert().is_empty());
        assert_eq!(hb.phase(), HeartbeatPhase::Exhausted);
    }

    #[test]
    fn restart_after_exhaustion_resets_state() {
        let t0 = Instant::now();
        let mut hb = monitor(1);
        hb.start(t0);
        assert!(hb.poll(t0 + secs(10)).contains(&HeartbeatAction::Exhausted));

        let actions = hb.start(t0 + secs(20));
        assert_eq!(
            actions,
            vec![HeartbeatAction::Alert(None), HeartbeatAction::SendKeepalive]
        );
        assert_eq!(hb.retries(), 0);
        assert!(hb.is_running());
    }
}
