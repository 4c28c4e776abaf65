//! Plugin settings store
//!
//! Holds the user-editable `ecowitt-host` setting, persists it to a JSON
//! file and publishes every edit on a watch channel so the poll scheduler
//! can re-sync right away.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tokio::sync::{watch, RwLock};

use crate::error::SettingsError;
use crate::models::{GatewayConfig, Setting};

pub const ECOWITT_HOST_KEY: &str = "ecowitt-host";

pub struct SettingsStore {
    /// None keeps settings in memory only
    path: Option<PathBuf>,
    values: RwLock<BTreeMap<String, String>>,
    config_tx: watch::Sender<GatewayConfig>,
}

impl SettingsStore {
    /// Load settings from `path`, seeding `ecowitt-host` from process config
    /// when the file has no value for it.
    pub async fn load(path: impl Into<PathBuf>, seed_host: &str) -> Result<Self, SettingsError> {
        let path = path.into();

        let mut values: BTreeMap<String, String> = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("[Settings] {} not found, starting empty", path.display());
                BTreeMap::new()
            }
            Err(e) => return Err(e.into()),
        };

        if !values.contains_key(ECOWITT_HOST_KEY) && !seed_host.trim().is_empty() {
            values.insert(ECOWITT_HOST_KEY.to_string(), seed_host.trim().to_string());
        }

        Ok(Self::from_values(Some(path), values))
    }

    pub fn in_memory(host: &str) -> Self {
        let mut values = BTreeMap::new();
        if !host.is_empty() {
            values.insert(ECOWITT_HOST_KEY.to_string(), host.to_string());
        }
        Self::from_values(None, values)
    }

    fn from_values(path: Option<PathBuf>, values: BTreeMap<String, String>) -> Self {
        let config = gateway_config_from(&values);
        let (config_tx, _) = watch::channel(config);

        Self {
            path,
            values: RwLock::new(values),
            config_tx,
        }
    }

    /// Current gateway configuration snapshot
    pub fn gateway_config(&self) -> GatewayConfig {
        self.config_tx.borrow().clone()
    }

    /// Receiver notified on every accepted `ecowitt-host` edit
    pub fn subscribe(&self) -> watch::Receiver<GatewayConfig> {
        self.config_tx.subscribe()
    }

    pub async fn get_ecowitt_host(&self) -> Option<String> {
        self.values.read().await.get(ECOWITT_HOST_KEY).cloned()
    }

    /// Settings as presented to the user
    pub async fn get_settings(&self) -> Vec<Setting> {
        vec![Setting {
            key: ECOWITT_HOST_KEY.to_string(),
            title: "Ecowitt Gateway Hostname".to_string(),
            value: self.get_ecowitt_host().await,
            description:
                "The hostname or IP address of your Ecowitt Gateway. Example http://192.168.0.137"
                    .to_string(),
        }]
    }

    /// Store a setting and announce the new gateway configuration.
    ///
    /// Empty values are refused and leave the stored value untouched.
    pub async fn put_setting(&self, key: &str, value: Option<&str>) -> Result<(), SettingsError> {
        if key != ECOWITT_HOST_KEY {
            return Err(SettingsError::UnknownKey(key.to_string()));
        }

        let value = value
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                tracing::warn!("[Settings] Failed to update {}, value is empty", key);
                SettingsError::EmptyValue(key.to_string())
            })?;

        // Held until the watch is updated so file, map and subscribers agree
        let mut values = self.values.write().await;
        let mut updated = values.clone();
        updated.insert(key.to_string(), value.to_string());

        self.persist(&updated).await?;

        *values = updated;
        tracing::info!("[Settings] Updated {} = {}", key, value);
        self.config_tx.send_replace(gateway_config_from(&values));

        Ok(())
    }

    async fn persist(&self, values: &BTreeMap<String, String>) -> Result<(), SettingsError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(values)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

fn gateway_config_from(values: &BTreeMap<String, String>) -> GatewayConfig {
    GatewayConfig::new(values.get(ECOWITT_HOST_KEY).cloned().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_settings_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("ecowitt-settings-{}-{}", name, std::process::id()))
            .join("settings.json")
    }

    #[tokio::test]
    async fn test_get_settings_lists_host() {
        let store = SettingsStore::in_memory("http://192.168.0.137");
        let settings = store.get_settings().await;

        assert_eq!(settings.len(), 1);
        assert_eq!(settings[0].key, "ecowitt-host");
        assert_eq!(settings[0].title, "Ecowitt Gateway Hostname");
        assert_eq!(settings[0].value.as_deref(), Some("http://192.168.0.137"));
    }

    #[tokio::test]
    async fn test_put_setting_notifies_subscribers() {
        let store = SettingsStore::in_memory("");
        let mut rx = store.subscribe();
        assert!(!store.gateway_config().is_configured());

        store
            .put_setting(ECOWITT_HOST_KEY, Some("http://10.0.0.5"))
            .await
            .unwrap();

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().host, "http://10.0.0.5");
        assert_eq!(store.gateway_config().host, "http://10.0.0.5");
    }

    #[tokio::test]
    async fn test_put_setting_rejects_empty_and_unknown() {
        let store = SettingsStore::in_memory("http://10.0.0.5");
        let rx = store.subscribe();

        assert!(matches!(
            store.put_setting(ECOWITT_HOST_KEY, Some("  ")).await,
            Err(SettingsError::EmptyValue(_))
        ));
        assert!(matches!(
            store.put_setting(ECOWITT_HOST_KEY, None).await,
            Err(SettingsError::EmptyValue(_))
        ));
        assert!(matches!(
            store.put_setting("poll-interval", Some("5")).await,
            Err(SettingsError::UnknownKey(_))
        ));

        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.get_ecowitt_host().await.as_deref(), Some("http://10.0.0.5"));
    }

    #[tokio::test]
    async fn test_persist_and_reload() {
        let path = temp_settings_path("reload");
        let _ = tokio::fs::remove_file(&path).await;

        let store = SettingsStore::load(&path, "").await.unwrap();
        assert!(store.get_ecowitt_host().await.is_none());
        store
            .put_setting(ECOWITT_HOST_KEY, Some("http://192.168.0.137"))
            .await
            .unwrap();

        // A seed host must not override the persisted value
        let reloaded = SettingsStore::load(&path, "http://10.9.9.9").await.unwrap();
        assert_eq!(reloaded.gateway_config().host, "http://192.168.0.137");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_failed_persist_keeps_previous_host() {
        let path = temp_settings_path("unwritable");
        let blocker = path.parent().unwrap().to_path_buf();
        let _ = tokio::fs::remove_dir_all(&blocker).await;
        let _ = tokio::fs::remove_file(&blocker).await;

        let store = SettingsStore::load(&path, "http://old").await.unwrap();
        let rx = store.subscribe();

        // A regular file where the settings directory should be
        tokio::fs::write(&blocker, b"").await.unwrap();

        let result = store.put_setting(ECOWITT_HOST_KEY, Some("http://new")).await;

        assert!(matches!(result, Err(SettingsError::Io(_))));
        assert_eq!(store.get_ecowitt_host().await.as_deref(), Some("http://old"));
        assert_eq!(store.gateway_config().host, "http://old");
        assert!(!rx.has_changed().unwrap());

        let _ = tokio::fs::remove_file(&blocker).await;
    }

    #[tokio::test]
    async fn test_seed_host_used_when_file_missing() {
        let path = temp_settings_path("seed");
        let _ = tokio::fs::remove_file(&path).await;

        let store = SettingsStore::load(&path, "http://10.9.9.9").await.unwrap();
        assert_eq!(store.gateway_config().host, "http://10.9.9.9");
    }
}
