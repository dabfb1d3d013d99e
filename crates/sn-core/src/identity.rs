//! Requester identities.
//!
//! Authentication happens upstream; this module only resolves an opaque
//! session id to a [`User`]. A requester is `Option<User>` everywhere: `None`
//! is the anonymous caller permitted when auth is switched off.

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Basic,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Basic => "basic",
            UserRole::Admin => "admin",
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(UserRole::Basic),
            "admin" => Ok(UserRole::Admin),
            other => Err(IdentityError::InvalidRole(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub user_id: String,
    pub email: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    Off,
    #[default]
    Required,
}

impl FromStr for AuthMode {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" | "disabled" => Ok(AuthMode::Off),
            "required" => Ok(AuthMode::Required),
            other => Err(IdentityError::InvalidAuthMode(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("invalid auth mode: {0}")]
    InvalidAuthMode(String),

    #[error("email is required")]
    MissingEmail,

    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("invalid session")]
    InvalidSession,

    #[error("session expired")]
    SessionExpired,

    #[error("identity database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// With auth off every caller, anonymous included, administers the node.
pub fn is_admin(requester: Option<&User>, auth_mode: AuthMode) -> bool {
    match (auth_mode, requester) {
        (AuthMode::Off, _) => true,
        (AuthMode::Required, Some(user)) => user.role == UserRole::Admin,
        (AuthMode::Required, None) => false,
    }
}

pub async fn create_user(
    pool: &SqlitePool,
    email: &str,
    role: UserRole,
) -> Result<User, IdentityError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(IdentityError::MissingEmail);
    }
    let user_id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO users (user_id, email, role, created_at) VALUES (?, ?, ?, ?)")
        .bind(&user_id)
        .bind(email)
        .bind(role.as_str())
        .bind(crate::now_millis())
        .execute(pool)
        .await?;

    tracing::info!(user_id = %user_id, role = %role, "user created");
    Ok(User {
        user_id,
        email: email.to_string(),
        role,
    })
}

pub async fn issue_session(
    pool: &SqlitePool,
    user_id: &str,
    ttl: chrono::Duration,
) -> Result<String, IdentityError> {
    let exists = sqlx::query_scalar::<_, String>("SELECT user_id FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    if exists.is_none() {
        return Err(IdentityError::UserNotFound(user_id.to_string()));
    }

    let session_id = Uuid::new_v4().to_string();
    let now = crate::now_millis();
    sqlx::query(
        "INSERT INTO user_sessions (session_id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(&session_id)
    .bind(user_id)
    .bind(now + ttl.num_milliseconds())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(session_id)
}

pub async fn resolve_session(pool: &SqlitePool, session_id: &str) -> Result<User, IdentityError> {
    let row = sqlx::query(
        "SELECT u.user_id, u.email, u.role, s.expires_at \
         FROM user_sessions s \
         JOIN users u ON s.user_id = u.user_id \
         WHERE s.session_id = ?",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Err(IdentityError::InvalidSession);
    };

    let expires_at: i64 = row.try_get("expires_at")?;
    if crate::now_millis() > expires_at {
        return Err(IdentityError::SessionExpired);
    }

    let role: String = row.try_get("role")?;
    Ok(User {
        user_id: row.try_get("user_id")?,
        email: row.try_get("email")?,
        role: role.parse()?,
    })
}
