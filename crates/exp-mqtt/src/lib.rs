//! MQTT connection to the external broker.
//!
//! `MqttChannel` owns a single `rumqttc` client/event-loop pair, tracks
//! connection status behind a lock, and exposes a single-slot edge
//! notification channel so a replay loop can wait for the next
//! connect/lost transition without accumulating stale events.

pub mod channel;
pub mod error;
pub mod mock;
pub mod publish;
pub mod tls;

pub use channel::{Channel, MqttChannel};
pub use error::{MqttError, MqttResult};
pub use mock::MockChannel;
pub use publish::{Publish, PublishError};
