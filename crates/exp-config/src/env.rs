//! `MF_EXPORT_*` environment variable defaults, used when no config file
//! can be read at startup.

use crate::{Config, MqttConf, ServerConf};
use std::path::PathBuf;

fn var(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn bool_var(key: &str) -> bool {
    std::env::var(key)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

fn u16_var(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn u8_var(key: &str, default: u8) -> u8 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Build a `Config` entirely from `MF_EXPORT_*` environment variables.
/// Recognized names mirror the TOML keys one-to-one and are part of the
/// deployment contract.
pub fn from_env(file: PathBuf) -> Config {
    Config {
        server: ServerConf {
            nats_url: var_or("MF_EXPORT_NATS", "nats://localhost:4222"),
            log_level: var_or("MF_EXPORT_LOG_LEVEL", "info"),
            port: u16_var("MF_EXPORT_PORT", 8170),
            cache_url: var("MF_EXPORT_CACHE_URL"),
            cache_password: var("MF_EXPORT_CACHE_PASS"),
            cache_db: u8_var("MF_EXPORT_CACHE_DB", 0),
        },
        mqtt: MqttConf {
            host: var_or("MF_EXPORT_MQTT_HOST", "tcp://localhost:1883"),
            username: var("MF_EXPORT_MQTT_USERNAME"),
            password: var("MF_EXPORT_MQTT_PASSWORD"),
            mtls: bool_var("MF_EXPORT_MQTT_MTLS"),
            skip_tls_ver: bool_var("MF_EXPORT_MQTT_SKIP_TLS_VER"),
            retain: bool_var("MF_EXPORT_MQTT_RETAIN"),
            qos: u8_var("MF_EXPORT_MQTT_QOS", 0),
            channel: var("MF_EXPORT_MQTT_CHANNEL"),
            ca_path: var("MF_EXPORT_MQTT_CA_PATH"),
            cert_path: var("MF_EXPORT_MQTT_CERT_PATH"),
            priv_key_path: var("MF_EXPORT_MQTT_PRIV_KEY_PATH"),
            tls_material: None,
        },
        routes: Vec::new(),
        file,
    }
}
