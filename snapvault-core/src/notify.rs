/*!
Notification sink port.

The vault tells the sink about completed captures and restores. Delivery is
fire-and-forget: the vault never consumes a return value, and a sink that
fails must swallow its own error rather than fail the operation.
*/

use serde::{Deserialize, Serialize};

/// Notification categories understood by the application's notification
/// center.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationCategory {
    System,
    Update,
    Alert,
    Payment,
    Session,
}

/// Best-effort consumer of vault event notifications.
pub trait NotificationSink {
    fn notify(&self, title: &str, message: &str, category: NotificationCategory);
}

/// Sink that emits notifications as tracing events.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, title: &str, message: &str, category: NotificationCategory) {
        tracing::info!(?category, title, message, "notification");
    }
}

/// Sink that discards all notifications.
#[derive(Debug, Default, Clone)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _title: &str, _message: &str, _category: NotificationCategory) {}
}
