use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::kv_store::{ConfigError, DynamicConfigStore, KV_SETTINGS_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Chat,
    #[default]
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub chat_page_enabled: bool,
    pub search_page_enabled: bool,
    pub default_page: PageType,
    pub maximum_chat_retention_days: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chat_page_enabled: true,
            search_page_enabled: true,
            default_page: PageType::Search,
            maximum_chat_retention_days: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Settings {
    pub fn check_validity(&self) -> Result<(), SettingsError> {
        if !self.chat_page_enabled && !self.search_page_enabled {
            return Err(SettingsError::Validation(
                "one of `search_page_enabled` and `chat_page_enabled` must be true".to_string(),
            ));
        }
        if self.default_page == PageType::Chat && !self.chat_page_enabled {
            return Err(SettingsError::Validation(
                "the default page cannot be 'chat' if the chat page is disabled".to_string(),
            ));
        }
        if self.default_page == PageType::Search && !self.search_page_enabled {
            return Err(SettingsError::Validation(
                "the default page cannot be 'search' if the search page is disabled".to_string(),
            ));
        }
        if self.maximum_chat_retention_days == Some(0) {
            return Err(SettingsError::Validation(
                "`maximum_chat_retention_days` must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reads the stored settings document. A missing document is seeded with the
/// defaults; every other store failure is returned to the caller.
pub async fn load_settings(store: &dyn DynamicConfigStore) -> Result<Settings, SettingsError> {
    match store.load(KV_SETTINGS_KEY).await {
        Ok(value) => Ok(serde_json::from_value(value).map_err(ConfigError::from)?),
        Err(ConfigError::NotFound(_)) => {
            let settings = Settings::default();
            store_settings(store, &settings).await?;
            Ok(settings)
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn store_settings(
    store: &dyn DynamicConfigStore,
    settings: &Settings,
) -> Result<(), SettingsError> {
    let value = serde_json::to_value(settings).map_err(ConfigError::from)?;
    store.store(KV_SETTINGS_KEY, value).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv_store::MemoryConfigStore;
    use serde_json::json;

    #[test]
    fn defaults_are_valid() {
        assert!(Settings::default().check_validity().is_ok());
    }

    #[test]
    fn both_pages_disabled_is_rejected() {
        let settings = Settings {
            chat_page_enabled: false,
            search_page_enabled: false,
            ..Settings::default()
        };
        assert!(matches!(
            settings.check_validity(),
            Err(SettingsError::Validation(_))
        ));
    }

    #[test]
    fn default_page_must_be_enabled() {
        let settings = Settings {
            chat_page_enabled: false,
            default_page: PageType::Chat,
            ..Settings::default()
        };
        assert!(settings.check_validity().is_err());

        let settings = Settings {
            search_page_enabled: false,
            default_page: PageType::Search,
            ..Settings::default()
        };
        assert!(settings.check_validity().is_err());
    }

    #[test]
    fn zero_retention_is_rejected() {
        let settings = Settings {
            maximum_chat_retention_days: Some(0),
            ..Settings::default()
        };
        assert!(settings.check_validity().is_err());
    }

    #[test]
    fn partial_documents_fill_defaults() {
        let settings: Settings = serde_json::from_value(json!({"default_page": "chat"})).unwrap();
        assert_eq!(settings.default_page, PageType::Chat);
        assert!(settings.chat_page_enabled);
    }

    #[tokio::test]
    async fn load_settings_seeds_defaults_when_missing() {
        let store = MemoryConfigStore::new();
        let settings = load_settings(&store).await.unwrap();
        assert_eq!(settings, Settings::default());
        assert!(store.load(KV_SETTINGS_KEY).await.is_ok());
    }

    #[tokio::test]
    async fn store_then_load_returns_replacement() {
        let store = MemoryConfigStore::new();
        let replacement = Settings {
            default_page: PageType::Chat,
            maximum_chat_retention_days: Some(30),
            ..Settings::default()
        };
        store_settings(&store, &replacement).await.unwrap();
        assert_eq!(load_settings(&store).await.unwrap(), replacement);
    }
}
