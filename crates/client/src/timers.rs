//! Scoped timer set.
//!
//! Every periodic task a feature starts is registered here so that
//! tearing the feature down is one `cancel_all` over a bounded map. Dropping
//! the set cancels everything it still owns.

use std::collections::HashMap;
use std::time::Duration;

use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

pub type TimerId = u64;

/// Shortest period a ticker runs at.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
pub struct TimerSet {
    timers: HashMap<TimerId, AbortHandle>,
    next_id: TimerId,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `tick` every `period`, first after one full period. A zero
    /// period is raised to [`MIN_PERIOD`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_interval<F>(&mut self, period: Duration, mut tick: F) -> TimerId
    where
        F: FnMut() + Send + 'static,
    {
        let period = period.max(MIN_PERIOD);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                tick();
            }
        });
        self.insert(handle.abort_handle())
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.timers.remove(&id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every owned timer. Returns how many were cancelled.
    pub fn cancel_all(&mut self) -> usize {
        let count = self.timers.len();
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
        count
    }

    /// Number of timers still owned.
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    fn insert(&mut self, handle: AbortHandle) -> TimerId {
        let id = self.next_id;
        self.next_id += 1;
        self.timers.insert(id, handle);
        id
    }
}

impl Drop for TimerSet {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
