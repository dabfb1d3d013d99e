use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum_extra::extract::cookie::CookieJar;
use sn_core::identity::{self, AuthMode, User};

use crate::{ApiError, ApiResult, AppState};

pub(crate) const SESSION_COOKIE: &str = "sn_session";

fn session_id(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Resolves the requester. `Ok(None)` only when auth is off and the caller
/// sent no credentials; presented credentials are always checked.
pub(crate) async fn current_user(state: &AppState, headers: &HeaderMap) -> ApiResult<Option<User>> {
    let Some(session_id) = session_id(headers) else {
        return match state.auth_mode {
            AuthMode::Off => Ok(None),
            AuthMode::Required => Err(ApiError::new(
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "missing session",
            )),
        };
    };

    let user = identity::resolve_session(&state.pool, &session_id).await?;
    Ok(Some(user))
}

pub(crate) async fn current_admin_user(
    state: &AppState,
    headers: &HeaderMap,
) -> ApiResult<Option<User>> {
    let user = current_user(state, headers).await?;
    if !identity::is_admin(user.as_ref(), state.auth_mode) {
        return Err(ApiError::new(
            StatusCode::FORBIDDEN,
            "ADMIN_REQUIRED",
            "admin role required",
        ));
    }
    Ok(user)
}
