//! Configuration module

use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub gateway: GatewaySettings,
    #[serde(default)]
    pub settings: SettingsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Process-level gateway polling settings.
///
/// `host` only seeds the `ecowitt-host` plugin setting when the settings
/// file has no value yet; after that the settings store is authoritative.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Keep devices whose channel disappears from a poll
    #[serde(default = "default_true")]
    pub retain_stale: bool,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            retain_stale: true,
        }
    }
}

impl GatewaySettings {
    pub fn poll_interval(&self) -> Duration {
        // A zero period would panic inside tokio::time::interval
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettingsConfig {
    #[serde(default = "default_settings_path")]
    pub path: String,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8090
}

fn default_poll_interval() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    3
}

fn default_true() -> bool {
    true
}

fn default_settings_path() -> String {
    "data/settings.json".to_string()
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("ECOWITT").separator("__"))
            .build()?;

        let config: Config = settings.try_deserialize()?;

        Ok(config)
    }
}
