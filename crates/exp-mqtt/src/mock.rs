//! Mock MQTT channel for testing without a real broker.

use async_trait::async_trait;
use std::sync::Mutex;

use crate::channel::Channel;
use crate::error::MqttResult;

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Mock implementation of [`Channel`] that records publishes and can be
/// toggled connected/disconnected to exercise the stash-on-failure path.
pub struct MockChannel {
    published: Mutex<Vec<PublishedMessage>>,
    connected: Mutex<bool>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            connected: Mutex::new(true),
        }
    }

    pub fn disconnected() -> Self {
        Self {
            published: Mutex::new(Vec::new()),
            connected: Mutex::new(false),
        }
    }

    pub fn set_connected(&self, value: bool) {
        *self.connected.lock().unwrap() = value;
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_to(&self, topic: &str) -> Vec<PublishedMessage> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Channel for MockChannel {
    async fn publish(&self, topic: &str, payload: &[u8]) -> MqttResult<()> {
        if !*self.connected.lock().unwrap() {
            return Err(crate::error::MqttError::NotConnected);
        }
        self.published.lock().unwrap().push(PublishedMessage {
            topic: topic.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        *self.connected.lock().unwrap()
    }
}
