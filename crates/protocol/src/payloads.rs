//! Typed views of inbound payload data.
//!
//! Handlers receive the raw `Data` map. Features that want structure call
//! [`data_as`] with one of these types (or their own).

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::envelope::DecodeError;
use crate::Data;

/// Deserialize handler data into `T`.
pub fn data_as<T: DeserializeOwned>(data: &Data) -> Result<T, DecodeError> {
    Ok(serde_json::from_value(serde_json::Value::Object(data.clone()))?)
}

/// Data of `notification.new_notification` and `notification.update_notification`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NotificationPayload {
    pub notification_id: i64,
    pub message: String,
    pub read: bool,
    /// ISO 8601 timestamp.
    pub created_at: String,
    /// Empty when the notification points nowhere.
    #[serde(default)]
    pub redirect_url: String,
}

/// Data of a `redirect` event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RedirectPayload {
    pub url: String,
}
