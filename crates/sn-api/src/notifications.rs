use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use sn_core::{dismissal, notification};

use crate::auth::current_user;
use crate::dto::NotificationView;
use crate::{ApiResult, AppState};

pub async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Vec<NotificationView>>> {
    let user = current_user(&state, &headers).await?;
    let owner = user.as_ref().map(|user| user.user_id.as_str());

    let mut conn = state.pool.acquire().await?;
    let notifications = notification::list_for_owner(&mut conn, owner, None, false).await?;
    Ok(Json(
        notifications.into_iter().map(NotificationView::from).collect(),
    ))
}

/// Shared by `/notifications/{id}/dismiss` and the legacy
/// `/settings/notifications/{id}/dismiss` route.
pub async fn dismiss_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<i64>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    let user = current_user(&state, &headers).await?;
    dismissal::dismiss_for_requester(&state.pool, notification_id, user.as_ref()).await?;
    Ok(StatusCode::NO_CONTENT)
}
