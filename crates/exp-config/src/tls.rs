//! Certificate material loading for mTLS connections to the MQTT broker.
//!
//! The config only ever carries file *paths*; the bytes are read once,
//! here, after parsing, and cached on the config as `TlsMaterial` so the
//! publisher never touches the filesystem again after startup.

use crate::{ConfigError, MqttConf};

/// Certificate/key bytes loaded from the paths in `MqttConf`.
#[derive(Debug, Clone)]
pub struct TlsMaterial {
    pub ca: Option<Vec<u8>>,
    pub client_cert: Option<Vec<u8>>,
    pub client_key: Option<Vec<u8>>,
}

pub fn load(mqtt: &MqttConf) -> Result<TlsMaterial, ConfigError> {
    let ca = read_optional(&mqtt.ca_path)?;
    let client_cert = read_optional(&mqtt.cert_path)?;
    let client_key = read_optional(&mqtt.priv_key_path)?;
    Ok(TlsMaterial {
        ca,
        client_cert,
        client_key,
    })
}

fn read_optional(path: &str) -> Result<Option<Vec<u8>>, ConfigError> {
    if path.is_empty() {
        return Ok(None);
    }
    std::fs::read(path)
        .map(Some)
        .map_err(|e| ConfigError::Certificate(format!("{path}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_paths_yield_no_material() {
        let mqtt = MqttConf {
            host: "tcp://localhost:1883".into(),
            ..Default::default()
        };
        let material = load(&mqtt).unwrap();
        assert!(material.ca.is_none());
        assert!(material.client_cert.is_none());
        assert!(material.client_key.is_none());
    }

    #[test]
    fn unreadable_ca_path_is_an_error() {
        let mqtt = MqttConf {
            host: "tcp://localhost:1883".into(),
            ca_path: "/nonexistent/ca.pem".into(),
            ..Default::default()
        };
        let err = load(&mqtt).unwrap_err();
        assert!(err.to_string().contains("ca.pem"));
    }
}
