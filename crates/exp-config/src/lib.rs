//! Typed view of the export bridge's TOML configuration.
//!
//! Mirrors the `exp` / `mqtt` / `routes` tables described by the service's
//! configuration contract. Loading prefers an on-disk file; when the file
//! is absent or unreadable, defaults are taken from `MF_EXPORT_*`
//! environment variables and an initial file is written so subsequent
//! restarts read back the same configuration.

mod env;
mod error;
mod tls;

pub use error::ConfigError;
pub use tls::TlsMaterial;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration loaded at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "exp")]
    pub server: ServerConf,
    #[serde(default)]
    pub mqtt: MqttConf,
    #[serde(default)]
    pub routes: Vec<RouteConf>,
    #[serde(skip)]
    pub file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConf {
    #[serde(rename = "nats")]
    pub nats_url: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Replay cache connection URL. Empty means no cache is attached —
    /// the engine then surfaces `NoCacheConfigured` on publish failure
    /// instead of stashing.
    #[serde(default, rename = "cache_url")]
    pub cache_url: String,
    #[serde(default, rename = "cache_pass")]
    pub cache_password: String,
    #[serde(default, rename = "cache_db")]
    pub cache_db: u8,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    8170
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConf {
    pub host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub mtls: bool,
    #[serde(default)]
    pub skip_tls_ver: bool,
    #[serde(default)]
    pub retain: bool,
    #[serde(default = "default_qos")]
    pub qos: u8,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub ca_path: String,
    #[serde(default)]
    pub cert_path: String,
    #[serde(default)]
    pub priv_key_path: String,
    /// Loaded once from `ca_path`/`cert_path`/`priv_key_path` after parsing.
    /// Never round-tripped through TOML.
    #[serde(skip)]
    pub tls_material: Option<TlsMaterial>,
}

fn default_qos() -> u8 {
    0
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: String::new(),
            username: String::new(),
            password: String::new(),
            mtls: false,
            skip_tls_ver: false,
            retain: false,
            qos: default_qos(),
            channel: String::new(),
            ca_path: String::new(),
            cert_path: String::new(),
            priv_key_path: String::new(),
            tls_material: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteConf {
    pub mqtt_topic: String,
    pub nats_topic: String,
    #[serde(default)]
    pub subtopic: String,
    #[serde(default = "default_route_type", rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub workers: usize,
}

fn default_route_type() -> String {
    "default".to_string()
}

impl Config {
    /// Load configuration from `path`, falling back to `MF_EXPORT_*`
    /// environment defaults and persisting them to `path` when the file
    /// is missing or fails to parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = match Self::from_file(path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "config file unavailable, falling back to environment defaults"
                );
                let config = env::from_env(path.to_path_buf());
                config.save()?;
                config
            }
        };
        if config.mqtt.mtls {
            config.mqtt.tls_material = Some(tls::load(&config.mqtt)?);
        }
        Ok(config)
    }

    /// Parse a config file from disk without touching the environment.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&data)?;
        config.file = path.to_path_buf();
        Ok(config)
    }

    /// Persist this configuration back to `self.file` as TOML.
    pub fn save(&self) -> Result<(), ConfigError> {
        let body = toml::to_string_pretty(self)?;
        std::fs::write(&self.file, body)?;
        Ok(())
    }
}
