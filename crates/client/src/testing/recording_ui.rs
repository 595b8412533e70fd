//! Recording `UiPort`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::heartbeat::LivenessAlert;
use crate::messaging::ConnectionState;
use crate::ports::{Notice, UiPort};

/// Everything pushed to the UI, in call order per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiRecord {
    pub notices: Vec<Notice>,
    pub navigations: Vec<String>,
    pub states: Vec<ConnectionState>,
    pub alerts: Vec<Option<LivenessAlert>>,
}

#[derive(Debug, Clone, Default)]
pub struct RecordingUi {
    record: Arc<Mutex<UiRecord>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> UiRecord {
        self.lock().clone()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.lock().notices.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    pub fn states(&self) -> Vec<ConnectionState> {
        self.lock().states.clone()
    }

    pub fn alerts(&self) -> Vec<Option<LivenessAlert>> {
        self.lock().alerts.clone()
    }

    /// The banner as the user would currently see it.
    pub fn current_alert(&self) -> Option<LivenessAlert> {
        self.lock().alerts.last().cloned().flatten()
    }

    fn lock(&self) -> MutexGuard<'_, UiRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UiPort for RecordingUi {
    fn notify(&self, notice: Notice) {
        self.lock().notices.push(notice);
    }

    fn navigate(&self, url: &str) {
        self.lock().navigations.push(url.to_string());
    }

    fn connection_changed(&self, state: ConnectionState) {
        self.lock().states.push(state);
    }

    fn liveness_alert(&self, alert: Option<LivenessAlert>) {
        self.lock().alerts.push(alert);
    }
}
