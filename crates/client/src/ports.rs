//! UI collaborator port.
//!
//! The session never renders anything itself. Toasts, navigation, the
//! connection indicator and the liveness banner are all pushed through
//! [`UiPort`], which the embedding application implements.

use opendebate_protocol::Status;

use crate::heartbeat::LivenessAlert;
use crate::messaging::ConnectionState;

/// A transient notification (toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Status,
    pub text: String,
    /// Hide automatically after a short delay instead of waiting for dismissal.
    pub autohide: bool,
}

impl Notice {
    pub fn new(severity: Status, text: impl Into<String>, autohide: bool) -> Self {
        Self {
            severity,
            text: text.into(),
            autohide,
        }
    }
}

/// Port for everything the session surfaces to the user.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait UiPort: Send + Sync {
    /// Show a toast.
    fn notify(&self, notice: Notice);

    /// Navigate the whole page to `url`.
    fn navigate(&self, url: &str);

    /// Connection state changed.
    fn connection_changed(&self, state: ConnectionState);

    /// Show (`Some`) or clear (`None`) the liveness error banner.
    fn liveness_alert(&self, alert: Option<LivenessAlert>);
}

/// `UiPort` that only logs. Used by the command line client.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingUi;

impl UiPort for TracingUi {
    fn notify(&self, notice: Notice) {
        match notice.severity {
            Status::Error => tracing::error!(autohide = notice.autohide, "{}", notice.text),
            Status::Warning => tracing::warn!(autohide = notice.autohide, "{}", notice.text),
            Status::Debug => tracing::debug!(autohide = notice.autohide, "{}", notice.text),
            _ => tracing::info!(
                severity = %notice.severity,
                autohide = notice.autohide,
                "{}",
                notice.text
            ),
        }
    }

    fn navigate(&self, url: &str) {
        tracing::info!(url = %url, "Navigation requested");
    }

    fn connection_changed(&self, state: ConnectionState) {
        tracing::info!(state = ?state, "Connection state changed");
    }

    fn liveness_alert(&self, alert: Option<LivenessAlert>) {
        match alert {
            Some(alert) => tracing::warn!(alert = ?alert, "Liveness alert raised"),
            None => tracing::info!("Liveness alert cleared"),
        }
    }
}
