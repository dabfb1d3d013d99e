use serde::Serialize;
use sn_core::notification::{Notification, NotificationType};
use sn_core::settings::Settings;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationView {
    pub id: i64,
    pub notif_type: NotificationType,
    pub dismissed: bool,
    pub first_shown: String,
    pub last_shown: String,
}

impl From<Notification> for NotificationView {
    fn from(notification: Notification) -> Self {
        Self {
            id: notification.id,
            notif_type: notification.kind,
            dismissed: notification.dismissed,
            first_shown: notification.first_shown.to_rfc3339(),
            last_shown: notification.last_shown.to_rfc3339(),
        }
    }
}

/// Per-request view: general settings plus what this requester should see.
/// Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct UserSettings {
    #[serde(flatten)]
    pub settings: Settings,
    pub notifications: Vec<NotificationView>,
    pub needs_reindexing: bool,
}
