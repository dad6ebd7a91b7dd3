//! Periodic heartbeat publisher.
//!
//! Publishes an empty-bodied message on `"heartbeat.export.service"` so
//! fleet tooling watching the bus can tell this export instance is alive.

use std::sync::Arc;
use std::time::Duration;

use exp_bus::Bus;

use crate::http::Metrics;

pub const HEARTBEAT_SUBJECT: &str = "heartbeat.export.service";
const INTERVAL: Duration = Duration::from_secs(10);

/// Run the heartbeat loop, publishing at a fixed 10s interval. Runs
/// forever until the task is cancelled; intended to be spawned as a
/// background tokio task.
pub async fn run<B: Bus + 'static>(bus: Arc<B>, metrics: Arc<Metrics>) {
    let mut ticker = tokio::time::interval(INTERVAL);
    loop {
        ticker.tick().await;
        if let Err(e) = bus.publish(HEARTBEAT_SUBJECT, Vec::new()).await {
            tracing::warn!(error = %e, "failed to publish heartbeat");
        } else {
            metrics.record_heartbeat();
            tracing::debug!("heartbeat sent");
        }
    }
}
