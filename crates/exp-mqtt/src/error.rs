//! MQTT channel error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MqttError {
    #[error("client is not connected to the broker")]
    NotConnected,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("TLS error: {0}")]
    Tls(String),
}

pub type MqttResult<T> = Result<T, MqttError>;
