//! Notification rows.
//!
//! Plain CRUD over the `notifications` table. Functions take a connection so
//! they compose inside a caller-owned transaction. Nothing here prevents two
//! active rows of the same kind for one owner; see [`crate::reconcile`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqliteConnection};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::identity::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Reindex,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Reindex => "reindex",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationType {
    type Err = NotificationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "reindex" => Ok(NotificationType::Reindex),
            other => Err(NotificationError::InvalidRow(format!(
                "unknown notification type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: i64,
    /// `None` for notifications raised for the anonymous requester.
    pub owner: Option<String>,
    pub kind: NotificationType,
    pub dismissed: bool,
    pub first_shown: DateTime<Utc>,
    pub last_shown: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification not found: {0}")]
    NotFound(i64),

    #[error("not authorized to access notification {0}")]
    Forbidden(i64),

    #[error("invalid notification row: {0}")]
    InvalidRow(String),

    #[error("notification database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: i64,
    user_id: Option<String>,
    notif_type: String,
    dismissed: bool,
    first_shown: i64,
    last_shown: i64,
}

impl NotificationRow {
    fn into_domain(self) -> Result<Notification, NotificationError> {
        let timestamp = |millis: i64| {
            crate::millis_to_datetime(millis)
                .ok_or_else(|| NotificationError::InvalidRow(format!("invalid timestamp {millis}")))
        };
        Ok(Notification {
            id: self.id,
            owner: self.user_id,
            kind: self.notif_type.parse()?,
            dismissed: self.dismissed,
            first_shown: timestamp(self.first_shown)?,
            last_shown: timestamp(self.last_shown)?,
        })
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, notif_type, dismissed, first_shown, last_shown FROM notifications";

/// Always inserts; duplicate prevention belongs to the caller.
pub async fn create(
    conn: &mut SqliteConnection,
    owner: Option<&str>,
    kind: NotificationType,
) -> Result<Notification, NotificationError> {
    let now = crate::now_millis();
    let row = sqlx::query_as::<_, NotificationRow>(
        "INSERT INTO notifications (user_id, notif_type, dismissed, first_shown, last_shown) \
         VALUES (?, ?, 0, ?, ?) \
         RETURNING id, user_id, notif_type, dismissed, first_shown, last_shown",
    )
    .bind(owner)
    .bind(kind.as_str())
    .bind(now)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!(notification_id = row.id, kind = %kind, "notification created");
    row.into_domain()
}

pub async fn get_by_id(
    conn: &mut SqliteConnection,
    id: i64,
    requester: Option<&User>,
) -> Result<Notification, NotificationError> {
    let row = sqlx::query_as::<_, NotificationRow>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Err(NotificationError::NotFound(id));
    };
    let notification = row.into_domain()?;
    crate::dismissal::authorize_dismiss(&notification, requester)?;
    Ok(notification)
}

/// All rows for the owner scope and kind, dismissed included, oldest first.
/// `owner = None` selects the anonymous scope.
pub async fn list_by_owner_and_kind(
    conn: &mut SqliteConnection,
    owner: Option<&str>,
    kind: NotificationType,
) -> Result<Vec<Notification>, NotificationError> {
    list_for_owner(conn, owner, Some(kind), true).await
}

pub async fn list_for_owner(
    conn: &mut SqliteConnection,
    owner: Option<&str>,
    kind: Option<NotificationType>,
    include_dismissed: bool,
) -> Result<Vec<Notification>, NotificationError> {
    // `IS` matches NULL against NULL, which keeps the anonymous scope in the
    // same statement as the per-user one.
    let mut sql = format!("{SELECT_COLUMNS} WHERE user_id IS ?");
    if kind.is_some() {
        sql.push_str(" AND notif_type = ?");
    }
    if !include_dismissed {
        sql.push_str(" AND dismissed = 0");
    }
    sql.push_str(" ORDER BY first_shown ASC, id ASC");

    let mut query = sqlx::query_as::<_, NotificationRow>(&sql).bind(owner);
    if let Some(kind) = kind {
        query = query.bind(kind.as_str());
    }
    let rows = query.fetch_all(&mut *conn).await?;
    rows.into_iter().map(NotificationRow::into_domain).collect()
}

/// Idempotent: dismissing a dismissed notification changes nothing.
pub async fn dismiss(
    conn: &mut SqliteConnection,
    notification: &mut Notification,
) -> Result<(), NotificationError> {
    sqlx::query("UPDATE notifications SET dismissed = 1 WHERE id = ?")
        .bind(notification.id)
        .execute(&mut *conn)
        .await?;
    notification.dismissed = true;
    Ok(())
}

/// Dismisses every active notification of `kind` across all owners. Returns
/// the number of rows that changed.
pub async fn dismiss_all_by_kind(
    conn: &mut SqliteConnection,
    kind: NotificationType,
) -> Result<u64, NotificationError> {
    let result =
        sqlx::query("UPDATE notifications SET dismissed = 1 WHERE notif_type = ? AND dismissed = 0")
            .bind(kind.as_str())
            .execute(&mut *conn)
            .await?;
    Ok(result.rows_affected())
}

pub async fn touch_last_shown(
    conn: &mut SqliteConnection,
    notification: &mut Notification,
) -> Result<(), NotificationError> {
    let now = crate::now_millis();
    sqlx::query("UPDATE notifications SET last_shown = ? WHERE id = ?")
        .bind(now)
        .bind(notification.id)
        .execute(&mut *conn)
        .await?;
    if let Some(last_shown) = crate::millis_to_datetime(now) {
        notification.last_shown = last_shown;
    }
    Ok(())
}
