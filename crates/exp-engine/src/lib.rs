//! Routing and delivery engine: accepts a declarative mapping from
//! internal bus subjects to external MQTT topics, fans incoming messages
//! into per-route worker pools, transforms payloads when configured,
//! publishes under a connection whose state may change, and — when a
//! durable cache is attached — stashes undelivered messages for replay.

pub mod engine;
pub mod error;
pub mod route;
pub mod subject;
pub mod transform;

pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use route::{Route, RouteError};
pub use subject::{SubjectError, validate_subject};
pub use transform::{TransformError, TransformKind, transform};

/// `"export-<username>"`, used as the MQTT client id and as the consumer
/// name in the replay cache's consumer group.
pub fn engine_id(username: &str) -> String {
    format!("export-{username}")
}
