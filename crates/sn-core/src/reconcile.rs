//! Keeps reindex notifications in step with the `needs_reindexing` flag.
//!
//! Runs on every settings fetch, so it never fails: a missing flag or a
//! database error degrades to "no notifications". At most one active reindex
//! notification per owner is expected, but no constraint enforces it; when
//! concurrent fetches leave duplicates behind, the oldest row is used and the
//! rest are left alone.

use sqlx::{SqliteConnection, SqlitePool};

use crate::identity::{is_admin, AuthMode, User};
use crate::kv_store::{load_flag, ConfigError, DynamicConfigStore, KV_REINDEX_KEY};
use crate::notification::{self, Notification, NotificationError, NotificationType};

pub async fn reconcile_reindex_notifications(
    pool: &SqlitePool,
    flags: &dyn DynamicConfigStore,
    requester: Option<&User>,
    auth_mode: AuthMode,
) -> Vec<Notification> {
    // Basic users cannot trigger a reindex, so they are never told about one.
    if !is_admin(requester, auth_mode) {
        return Vec::new();
    }

    let needs_reindex = match load_flag(flags, KV_REINDEX_KEY).await {
        Ok(value) => value,
        Err(ConfigError::NotFound(_)) => {
            tracing::warn!(key = KV_REINDEX_KEY, "reindex flag is missing");
            return Vec::new();
        }
        Err(err) => {
            tracing::warn!(key = KV_REINDEX_KEY, error = %err, "reindex flag is unreadable");
            return Vec::new();
        }
    };

    let owner = requester.map(|user| user.user_id.as_str());
    match sync_in_transaction(pool, owner, needs_reindex).await {
        Ok(notifications) => notifications,
        Err(err) => {
            tracing::error!(error = %err, "reindex notification reconciliation failed");
            Vec::new()
        }
    }
}

async fn sync_in_transaction(
    pool: &SqlitePool,
    owner: Option<&str>,
    needs_reindex: bool,
) -> Result<Vec<Notification>, NotificationError> {
    let mut tx = pool.begin().await?;
    match sync(&mut tx, owner, needs_reindex).await {
        Ok(notifications) => {
            tx.commit().await?;
            Ok(notifications)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::error!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

async fn sync(
    conn: &mut SqliteConnection,
    owner: Option<&str>,
    needs_reindex: bool,
) -> Result<Vec<Notification>, NotificationError> {
    if !needs_reindex {
        // The flag is node-wide: once it clears nobody should keep seeing it.
        let dismissed = notification::dismiss_all_by_kind(conn, NotificationType::Reindex).await?;
        if dismissed > 0 {
            tracing::info!(dismissed, "reindex notifications cleared");
        }
        return Ok(Vec::new());
    }

    let existing =
        notification::list_by_owner_and_kind(conn, owner, NotificationType::Reindex).await?;
    let active: Vec<Notification> = existing.into_iter().filter(|n| !n.dismissed).collect();

    let Some(mut current) = active.first().cloned() else {
        let created = notification::create(conn, owner, NotificationType::Reindex).await?;
        return Ok(vec![created]);
    };

    if active.len() > 1 {
        tracing::error!(
            owner = owner.unwrap_or("anonymous"),
            count = active.len(),
            kept = current.id,
            "multiple active reindex notifications"
        );
    }

    notification::touch_last_shown(conn, &mut current).await?;
    Ok(vec![current])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::UserRole;
    use crate::kv_store::MemoryConfigStore;
    use serde_json::json;

    fn admin(user_id: &str) -> User {
        User {
            user_id: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            role: UserRole::Admin,
        }
    }

    async fn flags(value: Option<bool>) -> MemoryConfigStore {
        let store = MemoryConfigStore::new();
        if let Some(value) = value {
            store.store(KV_REINDEX_KEY, json!(value)).await.unwrap();
        }
        store
    }

    async fn all_reindex(pool: &SqlitePool, owner: Option<&str>) -> Vec<Notification> {
        let mut conn = pool.acquire().await.unwrap();
        notification::list_by_owner_and_kind(&mut conn, owner, NotificationType::Reindex)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn repeated_fetch_reuses_single_notification() {
        let pool = crate::migrations::migrated_pool().await;
        let flags = flags(Some(true)).await;
        let u1 = admin("u1");

        let first = reconcile_reindex_notifications(&pool, &flags, Some(&u1), AuthMode::Required).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second =
            reconcile_reindex_notifications(&pool, &flags, Some(&u1), AuthMode::Required).await;

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].id, second[0].id);
        assert!(second[0].last_shown > first[0].last_shown);
        assert_eq!(all_reindex(&pool, Some("u1")).await.len(), 1);
    }

    #[tokio::test]
    async fn cleared_flag_dismisses_everyone() {
        let pool = crate::migrations::migrated_pool().await;
        let raised = flags(Some(true)).await;
        reconcile_reindex_notifications(&pool, &raised, Some(&admin("u1")), AuthMode::Required).await;
        reconcile_reindex_notifications(&pool, &raised, Some(&admin("u2")), AuthMode::Required).await;

        let cleared = flags(Some(false)).await;
        let shown =
            reconcile_reindex_notifications(&pool, &cleared, Some(&admin("u1")), AuthMode::Required)
                .await;

        assert!(shown.is_empty());
        for owner in ["u1", "u2"] {
            let rows = all_reindex(&pool, Some(owner)).await;
            assert_eq!(rows.len(), 1);
            assert!(rows[0].dismissed);
        }
    }

    #[tokio::test]
    async fn raised_again_creates_fresh_notification() {
        let pool = crate::migrations::migrated_pool().await;
        let u1 = admin("u1");
        let flags = flags(Some(true)).await;

        let n1 = reconcile_reindex_notifications(&pool, &flags, Some(&u1), AuthMode::Required).await;
        flags.store(KV_REINDEX_KEY, json!(false)).await.unwrap();
        let cleared =
            reconcile_reindex_notifications(&pool, &flags, Some(&u1), AuthMode::Required).await;
        flags.store(KV_REINDEX_KEY, json!(true)).await.unwrap();
        let n2 = reconcile_reindex_notifications(&pool, &flags, Some(&u1), AuthMode::Required).await;

        assert!(cleared.is_empty());
        assert_eq!(n2.len(), 1);
        assert_ne!(n1[0].id, n2[0].id);
        assert!(!n2[0].dismissed);

        let rows = all_reindex(&pool, Some("u1")).await;
        assert_eq!(rows.len(), 2);
        assert!(rows[0].dismissed);
        assert_eq!(rows[0].id, n1[0].id);
    }

    #[tokio::test]
    async fn non_admins_see_nothing_and_change_nothing() {
        let pool = crate::migrations::migrated_pool().await;
        let flags = flags(Some(true)).await;
        let basic = User {
            role: UserRole::Basic,
            ..admin("u3")
        };

        let shown =
            reconcile_reindex_notifications(&pool, &flags, Some(&basic), AuthMode::Required).await;
        let anonymous = reconcile_reindex_notifications(&pool, &flags, None, AuthMode::Required).await;

        assert!(shown.is_empty());
        assert!(anonymous.is_empty());
        assert!(all_reindex(&pool, Some("u3")).await.is_empty());
    }

    #[tokio::test]
    async fn auth_off_uses_anonymous_scope() {
        let pool = crate::migrations::migrated_pool().await;
        let flags = flags(Some(true)).await;

        let shown = reconcile_reindex_notifications(&pool, &flags, None, AuthMode::Off).await;

        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].owner, None);
        assert_eq!(all_reindex(&pool, None).await.len(), 1);
    }

    #[tokio::test]
    async fn missing_flag_returns_empty_without_mutation() {
        let pool = crate::migrations::migrated_pool().await;
        {
            let mut conn = pool.acquire().await.unwrap();
            notification::create(&mut conn, Some("u1"), NotificationType::Reindex)
                .await
                .unwrap();
        }
        let flags = flags(None).await;

        let shown =
            reconcile_reindex_notifications(&pool, &flags, Some(&admin("u1")), AuthMode::Required)
                .await;

        assert!(shown.is_empty());
        assert!(!all_reindex(&pool, Some("u1")).await[0].dismissed);
    }

    #[tokio::test]
    async fn duplicates_collapse_to_oldest() {
        let pool = crate::migrations::migrated_pool().await;
        let (oldest, newer) = {
            let mut conn = pool.acquire().await.unwrap();
            let oldest = notification::create(&mut conn, Some("u1"), NotificationType::Reindex)
                .await
                .unwrap();
            let newer = notification::create(&mut conn, Some("u1"), NotificationType::Reindex)
                .await
                .unwrap();
            (oldest, newer)
        };
        let flags = flags(Some(true)).await;

        let shown =
            reconcile_reindex_notifications(&pool, &flags, Some(&admin("u1")), AuthMode::Required)
                .await;

        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].id, oldest.id);
        let rows = all_reindex(&pool, Some("u1")).await;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().any(|n| n.id == newer.id && !n.dismissed));
    }

    #[tokio::test]
    async fn persistence_failure_degrades_to_empty() {
        let pool = crate::migrations::migrated_pool().await;
        sqlx::query("DROP TABLE notifications")
            .execute(&pool)
            .await
            .unwrap();

        for value in [true, false] {
            let flags = flags(Some(value)).await;
            let shown =
                reconcile_reindex_notifications(&pool, &flags, Some(&admin("u1")), AuthMode::Required)
                    .await;
            assert!(shown.is_empty());
        }
    }
}
