//! NATS-backed `Bus` implementation.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::error::{BusError, BusResult};
use crate::message::BusMessage;
use crate::{Bus, Subscription};

/// A connection to the internal NATS bus.
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    pub async fn connect(url: &str) -> BusResult<Self> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Bus for NatsBus {
    async fn queue_subscribe(
        &self,
        subject: &str,
        queue: &str,
        capacity: usize,
    ) -> BusResult<(mpsc::Receiver<BusMessage>, Subscription)> {
        let mut subscriber = self
            .client
            .queue_subscribe(subject.to_string(), queue.to_string())
            .await
            .map_err(|e| BusError::Subscribe {
                subject: subject.to_string(),
                source: e.to_string(),
            })?;

        let (tx, rx) = mpsc::channel(capacity);
        let subject_owned = subject.to_string();
        let handle = tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                let delivered = BusMessage {
                    subject: msg.subject.to_string(),
                    data: msg.payload,
                };
                // Blocking send: a full channel applies backpressure to the
                // bus subscription itself, per the routing contract.
                if tx.send(delivered).await.is_err() {
                    break;
                }
            }
            tracing::debug!(subject = %subject_owned, "bus subscription ended");
        });

        Ok((rx, Subscription::new(handle.abort_handle())))
    }

    async fn publish(&self, subject: &str, payload: Vec<u8>) -> BusResult<()> {
        self.client
            .publish(subject.to_string(), payload.into())
            .await
            .map_err(|e| BusError::Publish(e.to_string()))
    }
}
