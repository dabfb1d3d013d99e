use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use sn_core::file_store::FileStoreError;
use sn_core::identity::{AuthMode, IdentityError};
use sn_core::kv_store::{ConfigError, DynamicConfigStore, SqliteConfigStore};
use sn_core::notification::NotificationError;
use sn_core::settings::SettingsError;
use sn_core::{config, db, http, logging, migrations, server};
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;

mod auth;
mod dto;
mod files;
mod notifications;
mod settings;


pub use dto::{NotificationView, UserSettings};
pub use settings::fetch_user_settings;

pub const SERVICE_NAME: &str = "sn-api";

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config_store: Arc<dyn DynamicConfigStore>,
    pub auth_mode: AuthMode,
}

impl AppState {
    /// State backed entirely by `pool`, dynamic config included.
    pub fn new(pool: SqlitePool, auth_mode: AuthMode) -> Self {
        let config_store = Arc::new(SqliteConfigStore::new(pool.clone()));
        Self {
            pool,
            config_store,
            auth_mode,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
    details: Option<Value>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    fn internal(code: &'static str, err: impl std::fmt::Display) -> Self {
        tracing::error!(code, error = %err, "request failed");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, err.to_string())
    }

    fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::internal("DB_ERROR", err)
    }
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound(id) => {
                ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", "Notification not found")
                    .with_details(serde_json::json!({ "notification_id": id }))
            }
            NotificationError::Forbidden(id) => ApiError::new(
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Not authorized to dismiss this notification",
            )
            .with_details(serde_json::json!({ "notification_id": id })),
            other => ApiError::internal("DB_ERROR", other),
        }
    }
}

impl From<SettingsError> for ApiError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Validation(message) => {
                ApiError::new(StatusCode::BAD_REQUEST, "INVALID_SETTINGS", message)
            }
            SettingsError::Config(err) => err.into(),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::internal("CONFIG_ERROR", err)
    }
}

impl From<FileStoreError> for ApiError {
    fn from(err: FileStoreError) -> Self {
        match err {
            FileStoreError::NotFound(_) => {
                ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
            }
            FileStoreError::Empty(_) | FileStoreError::UnsupportedType(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, "INVALID_FILE", err.to_string())
            }
            other => ApiError::internal("FILE_STORE_ERROR", other),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidSession | IdentityError::SessionExpired => {
                ApiError::new(StatusCode::UNAUTHORIZED, "AUTH_REQUIRED", err.to_string())
            }
            other => ApiError::internal("IDENTITY_ERROR", other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = ErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };
        (self.status, Json(payload)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct HealthStatus {
    status: String,
}

pub struct ApiConfig {
    pub addr: SocketAddr,
    pub database_url: String,
    pub auth_mode: AuthMode,
    pub max_body_bytes: usize,
}

pub fn load_config() -> Result<ApiConfig> {
    let addr = config::socket_addr_from_env("SN_API_ADDR", "0.0.0.0:8080")?;
    let database_url = config::env_or("DATABASE_URL", "sqlite:settings-node.db");
    let auth_mode = config::env_or("SN_AUTH_MODE", "required").parse::<AuthMode>()?;
    let max_body_bytes = config::u64_from_env("SN_MAX_UPLOAD_BYTES", 20 * 1024 * 1024)?;
    Ok(ApiConfig {
        addr,
        database_url,
        auth_mode,
        max_body_bytes: usize::try_from(max_body_bytes)?,
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/:notification_id/dismiss",
            post(notifications::dismiss_notification),
        )
        .route("/settings", get(settings::fetch_settings))
        .route(
            "/settings/notifications/:notification_id/dismiss",
            post(notifications::dismiss_notification),
        )
        .route("/admin/settings", put(settings::put_settings))
        .route("/chat/file", post(files::upload_chat_files))
        .route("/file/:file_id", get(files::fetch_file))
        .route("/query/file/:file_id", get(files::fetch_file))
        .with_state(state)
}

pub async fn run(config: ApiConfig) -> Result<()> {
    logging::init(SERVICE_NAME);

    let pool = db::connect(&config.database_url).await?;
    migrations::run(&pool).await?;
    tracing::info!(auth_mode = ?config.auth_mode, "database ready");

    let state = AppState::new(pool, config.auth_mode);
    let router = http::apply_standard_layers(router(state), SERVICE_NAME, config.max_body_bytes);
    server::serve(config.addr, router).await
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    match db::check_ready(&state.pool).await {
        Ok(_) => (StatusCode::OK, Json(HealthStatus { status: "ok".into() })),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthStatus {
                status: "unavailable".into(),
            }),
        ),
    }
}
