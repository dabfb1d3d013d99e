//! Process-wide key/value configuration.
//!
//! Maintenance flags (such as the pending-reindex marker) and the general
//! settings document both live here. Callers only see the
//! [`DynamicConfigStore`] trait so tests can swap in [`MemoryConfigStore`].

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

pub const KV_REINDEX_KEY: &str = "needs_reindexing";
pub const KV_SETTINGS_KEY: &str = "general_settings";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config key not found: {0}")]
    NotFound(String),

    #[error("invalid value for config key {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("config store database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("config value serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConfigError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ConfigError::NotFound(_))
    }
}

#[async_trait]
pub trait DynamicConfigStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Value, ConfigError>;
    async fn store(&self, key: &str, value: Value) -> Result<(), ConfigError>;
    async fn delete(&self, key: &str) -> Result<(), ConfigError>;
}

pub async fn load_flag(store: &dyn DynamicConfigStore, key: &str) -> Result<bool, ConfigError> {
    let value = store.load(key).await?;
    value.as_bool().ok_or_else(|| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected boolean, found {value}"),
    })
}

pub struct SqliteConfigStore {
    pool: SqlitePool,
}

impl SqliteConfigStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DynamicConfigStore for SqliteConfigStore {
    async fn load(&self, key: &str) -> Result<Value, ConfigError> {
        let row = sqlx::query("SELECT value_json FROM dynamic_configs WHERE config_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Err(ConfigError::NotFound(key.to_string()));
        };
        let raw: String = row.try_get("value_json")?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn store(&self, key: &str, value: Value) -> Result<(), ConfigError> {
        let raw = serde_json::to_string(&value)?;
        sqlx::query(
            "INSERT INTO dynamic_configs (config_key, value_json, updated_at) \
             VALUES (?, ?, ?) \
             ON CONFLICT (config_key) DO UPDATE SET value_json = excluded.value_json, \
             updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(raw)
        .bind(crate::now_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ConfigError> {
        sqlx::query("DELETE FROM dynamic_configs WHERE config_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryConfigStore {
    values: RwLock<HashMap<String, Value>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DynamicConfigStore for MemoryConfigStore {
    async fn load(&self, key: &str) -> Result<Value, ConfigError> {
        self.values
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))
    }

    async fn store(&self, key: &str, value: Value) -> Result<(), ConfigError> {
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), ConfigError> {
        self.values.write().await.remove(key);
        Ok(())
    }
}
