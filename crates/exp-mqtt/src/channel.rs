//! The `MqttChannel` — a single MQTT client connection to the external
//! broker, with connection-status tracking and edge-triggered connect/lost
//! notification.

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

use crate::error::{MqttError, MqttResult};
use crate::tls;
use exp_config::MqttConf;

/// Abstraction over "publish a payload to a topic", so the engine can be
/// exercised against a `MockChannel` without a broker.
#[async_trait]
pub trait Channel: Send + Sync {
    async fn publish(&self, topic: &str, payload: &[u8]) -> MqttResult<()>;
    async fn is_connected(&self) -> bool;
}

fn to_qos(qos: u8) -> QoS {
    match qos {
        1 => QoS::AtLeastOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtMostOnce,
    }
}

/// A connection to the external MQTT broker.
///
/// Construction (`new`) builds the client and returns its `EventLoop`
/// separately — the caller must drive it via [`MqttChannel::run_event_loop`]
/// in a spawned task.
pub struct MqttChannel {
    client: AsyncClient,
    qos: QoS,
    retain: bool,
    connected: Mutex<bool>,
    connected_tx: mpsc::Sender<bool>,
}

impl MqttChannel {
    /// Build a channel and its event loop. `client_id` is the engine id
    /// (`"export-<username>"`).
    ///
    /// Returns the channel, its event loop (to be driven by
    /// [`run_event_loop`](Self::run_event_loop)), and the receiving half of
    /// the connect/lost edge-notification channel (capacity 1). Fails if
    /// `mtls` is set and the configured certificate material doesn't build
    /// into a valid TLS transport.
    pub fn new(conf: &MqttConf, client_id: &str) -> MqttResult<(Self, EventLoop, mpsc::Receiver<bool>)> {
        let mut options = MqttOptions::new(client_id, host_only(&conf.host), port_of(&conf.host));
        options.set_clean_session(true);
        options.set_keep_alive(Duration::from_secs(30));
        if !conf.username.is_empty() {
            options.set_credentials(conf.username.clone(), conf.password.clone());
        }
        if conf.mtls {
            options.set_transport(tls::build_transport(conf)?);
        }

        let (client, eventloop) = AsyncClient::new(options, 64);
        let (tx, rx) = mpsc::channel(1);

        Ok((
            Self {
                client,
                qos: to_qos(conf.qos),
                retain: conf.retain,
                connected: Mutex::new(false),
                connected_tx: tx,
            },
            eventloop,
            rx,
        ))
    }

    /// Drive the MQTT event loop. Runs until cancelled; reconnection is
    /// handled by `rumqttc` itself, so a poll error is logged and retried
    /// rather than treated as fatal.
    pub async fn run_event_loop(&self, mut eventloop: EventLoop) {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    self.set_connected(true).await;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::error!(error = %e, "mqtt event loop error, retrying");
                    self.set_connected(false).await;
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Disconnect from the broker. Best-effort: a disconnect error is
    /// logged, not propagated, since the caller is already tearing down.
    pub async fn disconnect(&self) {
        if let Err(e) = self.client.disconnect().await {
            tracing::warn!(error = %e, "mqtt disconnect failed");
        }
    }

    async fn set_connected(&self, value: bool) {
        let mut guard = self.connected.lock().await;
        if *guard != value {
            *guard = value;
            // Non-blocking: a full slot means an edge is already pending,
            // which is all the replay loop needs.
            let _ = self.connected_tx.try_send(value);
            tracing::debug!(connected = value, "mqtt connection state changed");
        }
    }
}

#[async_trait]
impl Channel for MqttChannel {
    async fn publish(&self, topic: &str, payload: &[u8]) -> MqttResult<()> {
        if !*self.connected.lock().await {
            return Err(MqttError::NotConnected);
        }
        self.client
            .publish(topic, self.qos, self.retain, payload)
            .await
            .map_err(|e| MqttError::Publish(e.to_string()))
    }

    async fn is_connected(&self) -> bool {
        *self.connected.lock().await
    }
}

fn host_only(host: &str) -> String {
    strip_scheme(host)
        .split(':')
        .next()
        .unwrap_or(host)
        .to_string()
}

fn port_of(host: &str) -> u16 {
    strip_scheme(host)
        .split(':')
        .nth(1)
        .and_then(|p| p.parse().ok())
        .unwrap_or(1883)
}

fn strip_scheme(host: &str) -> &str {
    host.split("://").next_back().unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port_from_scheme_uri() {
        assert_eq!(host_only("tcp://broker.example.com:1883"), "broker.example.com");
        assert_eq!(port_of("tcp://broker.example.com:1883"), 1883);
        assert_eq!(host_only("ssl://broker.example.com:8883"), "broker.example.com");
        assert_eq!(port_of("ssl://broker.example.com:8883"), 8883);
    }

    #[test]
    fn defaults_port_when_missing() {
        assert_eq!(port_of("tcp://broker.example.com"), 1883);
    }

    #[tokio::test]
    async fn publish_fails_fast_when_disconnected() {
        let conf = MqttConf {
            host: "tcp://localhost:1883".into(),
            ..Default::default()
        };
        let (channel, _eventloop, _rx) = MqttChannel::new(&conf, "export-test").unwrap();
        let err = channel.publish("X/a", b"hello").await.unwrap_err();
        assert!(matches!(err, MqttError::NotConnected));
    }
}
