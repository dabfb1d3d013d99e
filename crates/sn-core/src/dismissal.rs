use sqlx::SqlitePool;

use crate::identity::User;
use crate::notification::{self, Notification, NotificationError};

/// Anonymous requesters pass; an identified requester must own the row.
pub fn authorize_dismiss(
    notification: &Notification,
    requester: Option<&User>,
) -> Result<(), NotificationError> {
    match requester {
        None => Ok(()),
        Some(user) if notification.owner.as_deref() == Some(user.user_id.as_str()) => Ok(()),
        Some(_) => Err(NotificationError::Forbidden(notification.id)),
    }
}

/// Lookup, ownership check, then dismiss. Unknown ids and foreign rows leave
/// the table untouched.
pub async fn dismiss_for_requester(
    pool: &SqlitePool,
    notification_id: i64,
    requester: Option<&User>,
) -> Result<Notification, NotificationError> {
    let mut conn = pool.acquire().await?;
    let mut notification = notification::get_by_id(&mut conn, notification_id, requester).await?;
    notification::dismiss(&mut conn, &mut notification).await?;
    tracing::info!(
        notification_id,
        requester = requester.map(|user| user.user_id.as_str()).unwrap_or("anonymous"),
        "notification dismissed"
    );
    Ok(notification)
}
