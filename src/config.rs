//! # Application Configuration
//!
//! Loads the device triple, broker endpoint and session settings from a TOML file,
//! then applies environment overrides for the identity fields. A missing file is
//! not an error: the built-in demo device is used instead.
//!
//! The file is only ever read. Nothing here serializes the device secret.
//!
//! ```toml
//! [device]
//! product_key = "a11xsrWmW14"
//! device_name = "paho_android"
//! device_secret = "..."
//!
//! [broker]
//! region = "cn-shanghai"
//! port = 443
//!
//! [session]
//! max_reconnect_attempts = 3
//! ```

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::credential::{DeviceIdentity, DEFAULT_VERSION_TAG};

const CONFIG_DIR: &str = "aiot-mqtt-demo";
const CONFIG_FILE: &str = "config.toml";

pub const CONFIG_PATH_ENV: &str = "AIOT_DEMO_CONFIG";
pub const PRODUCT_KEY_ENV: &str = "AIOT_PRODUCT_KEY";
pub const DEVICE_NAME_ENV: &str = "AIOT_DEVICE_NAME";
pub const DEVICE_SECRET_ENV: &str = "AIOT_DEVICE_SECRET";

/// Demo device registered for the sample application
const DEMO_PRODUCT_KEY: &str = "a11xsrWmW14";
const DEMO_DEVICE_NAME: &str = "paho_android";
const DEMO_DEVICE_SECRET: &str = "tLMT9QWD36U2SArglGqcHCDK9rK9nOrA";

/// Top-level configuration, one section per concern
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceIdentity,
    pub broker: BrokerConfig,
    pub session: SessionConfig,
    pub ui: UIConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: DeviceIdentity::new(DEMO_PRODUCT_KEY, DEMO_DEVICE_NAME, DEMO_DEVICE_SECRET),
            broker: BrokerConfig::default(),
            session: SessionConfig::default(),
            ui: UIConfig::default(),
        }
    }
}

/// Broker endpoint and CONNECT options
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BrokerConfig {
    /// Explicit broker URL, e.g. "tcp://host:1883". Overrides `region`/`port`.
    pub url: Option<String>,
    /// Platform region used to build the default host name
    pub region: String,
    pub port: u16,
    pub tls: bool,
    pub keep_alive_secs: u64,
    pub connect_timeout_secs: u64,
    /// Client library tag embedded in the client id
    pub version_tag: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: None,
            region: "cn-shanghai".to_string(),
            port: 443,
            tls: false,
            keep_alive_secs: 60,
            connect_timeout_secs: 10,
            version_tag: DEFAULT_VERSION_TAG.to_string(),
        }
    }
}

impl BrokerConfig {
    /// Broker URL for `identity`, either the explicit one or the regional default
    /// `{product_key}.iot-as-mqtt.{region}.aliyuncs.com`
    pub fn endpoint(&self, identity: &DeviceIdentity) -> String {
        match &self.url {
            Some(url) => url.clone(),
            None => {
                let scheme = if self.tls { "ssl" } else { "tcp" };
                format!(
                    "{}://{}.iot-as-mqtt.{}.aliyuncs.com:{}",
                    scheme, identity.product_key, self.region, self.port
                )
            }
        }
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Reconnect behaviour and channel sizing of the MQTT task
#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Consecutive failed sessions before the task gives up
    pub max_reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub channel_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 3,
            reconnect_delay_ms: 2000,
            channel_capacity: 100,
        }
    }
}

impl SessionConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct UIConfig {
    pub window_title: String,
    /// Maximum number of entries kept in the message log
    pub log_limit: usize,
    pub fps: u8,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            window_title: "AIoT MQTT Demo".to_string(),
            log_limit: 200,
            fps: 30,
        }
    }
}

impl AppConfig {
    /// Loads the config file (if any) and applies environment overrides
    pub async fn load() -> Result<Self> {
        let path = config_path();
        let mut config = Self::load_from(&path).await?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Reads `path`, falling back to defaults when the file does not exist
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            warn!(
                "Config file {} does not exist, using demo device defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

        let config = Self::from_toml_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| eyre!("Failed to parse config file: {}", e))
    }

    /// Overrides identity fields with non-empty values returned by `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(product_key) = non_empty(PRODUCT_KEY_ENV) {
            debug!("Product key taken from {}", PRODUCT_KEY_ENV);
            self.device.product_key = product_key;
        }
        if let Some(device_name) = non_empty(DEVICE_NAME_ENV) {
            debug!("Device name taken from {}", DEVICE_NAME_ENV);
            self.device.device_name = device_name;
        }
        if let Some(device_secret) = non_empty(DEVICE_SECRET_ENV) {
            debug!("Device secret taken from {}", DEVICE_SECRET_ENV);
            self.device.device_secret = device_secret.into();
        }
    }
}

/// Config file location: `$AIOT_DEMO_CONFIG`, else `<config dir>/aiot-mqtt-demo/config.toml`
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }

    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    path
}
