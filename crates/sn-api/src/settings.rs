use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sn_core::identity::User;
use sn_core::kv_store::{load_flag, ConfigError, KV_REINDEX_KEY};
use sn_core::reconcile::reconcile_reindex_notifications;
use sn_core::settings::{self as general, Settings};

use crate::auth::{current_admin_user, current_user};
use crate::dto::{NotificationView, UserSettings};
use crate::{ApiResult, AppState};

pub async fn fetch_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<UserSettings>> {
    let user = current_user(&state, &headers).await?;
    Ok(Json(fetch_user_settings(&state, user.as_ref()).await?))
}

/// Settings and notifications are served from one call so a polling client
/// costs one round trip. Only the general settings load may fail the request;
/// notifications degrade to empty and a missing flag reads as `false`.
pub async fn fetch_user_settings(
    state: &AppState,
    requester: Option<&User>,
) -> ApiResult<UserSettings> {
    let settings = general::load_settings(state.config_store.as_ref()).await?;

    let notifications = reconcile_reindex_notifications(
        &state.pool,
        state.config_store.as_ref(),
        requester,
        state.auth_mode,
    )
    .await;

    let needs_reindexing = match load_flag(state.config_store.as_ref(), KV_REINDEX_KEY).await {
        Ok(value) => value,
        Err(ConfigError::NotFound(_)) => false,
        Err(err) => return Err(err.into()),
    };

    Ok(UserSettings {
        settings,
        notifications: notifications
            .into_iter()
            .map(NotificationView::from)
            .collect(),
        needs_reindexing,
    })
}

pub async fn put_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(settings): Json<Settings>,
) -> ApiResult<StatusCode> {
    let admin = current_admin_user(&state, &headers).await?;
    settings.check_validity()?;
    general::store_settings(state.config_store.as_ref(), &settings).await?;

    tracing::info!(
        updated_by = admin.as_ref().map(|user| user.user_id.as_str()).unwrap_or("anonymous"),
        "general settings replaced"
    );
    Ok(StatusCode::NO_CONTENT)
}
