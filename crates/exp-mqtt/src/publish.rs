//! The route-facing publish contract.
//!
//! Distinct from [`crate::Channel`]: `Channel` is "send bytes to the
//! broker", while `Publish` is "deliver this message, stashing it if the
//! broker attempt fails" — the engine implements this trait so route
//! workers can hold an `Arc<dyn Publish>` without depending on the
//! engine's own generic parameters.

use async_trait::async_trait;

pub type PublishError = Box<dyn std::error::Error + Send + Sync>;

#[async_trait]
pub trait Publish: Send + Sync {
    async fn publish(&self, subject: &str, topic: &str, payload: &[u8]) -> Result<(), PublishError>;
}
