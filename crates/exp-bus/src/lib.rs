//! Internal bus client: subject-addressed pub/sub with queue-group
//! semantics. Backed by NATS core (no JetStream needed — the durability
//! story lives in the replay cache, not the bus).

pub mod error;
pub mod message;
pub mod mock;
pub mod nats;

pub use error::{BusError, BusResult};
pub use message::BusMessage;
pub use mock::MockBus;
pub use nats::NatsBus;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// A handle to one `queue_subscribe` registration. Calling [`Subscription::stop`]
/// ends the subscription's forwarding task, which drops its sender half and
/// so closes the route's inbound channel — letting workers drain the
/// backlog and exit on their next `recv()`.
pub struct Subscription {
    forwarder: AbortHandle,
}

impl Subscription {
    pub fn new(forwarder: AbortHandle) -> Self {
        Self { forwarder }
    }

    /// Stop forwarding new bus deliveries into the inbound channel.
    pub fn stop(&self) {
        self.forwarder.abort();
    }
}

/// Abstraction over the internal message bus, so the engine can be
/// exercised against an in-memory fake without a running NATS server.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Subscribe to `subject` under queue group `queue`. Deliveries are
    /// forwarded into a channel of the given `capacity`; the forwarding
    /// task blocks (applying backpressure to the bus) when that channel
    /// is full. The returned [`Subscription`] lets the caller stop that
    /// forwarding on shutdown.
    async fn queue_subscribe(
        &self,
        subject: &str,
        queue: &str,
        capacity: usize,
    ) -> BusResult<(mpsc::Receiver<BusMessage>, Subscription)>;

    /// Publish a message on `subject` (used by the heartbeat emitter).
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> BusResult<()>;
}
