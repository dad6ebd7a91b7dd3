//! Shared test harness wiring `Engine` to in-memory fakes for every
//! collaborator (bus, cache, MQTT channel), exercising the real routing
//! and replay code paths without a NATS server, Redis instance, or MQTT
//! broker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use exp_bus::MockBus;
use exp_cache::MockCache;
use exp_config::RouteConf;
use exp_engine::Engine;
use exp_mqtt::{Channel, MockChannel};

pub struct Harness {
    pub engine: Arc<Engine<MockBus, MockCache>>,
    pub bus: Arc<MockBus>,
    pub channel: Arc<MockChannel>,
    pub connected_tx: mpsc::Sender<bool>,
}

pub fn route(nats_topic: &str, kind: &str, workers: usize) -> RouteConf {
    RouteConf {
        mqtt_topic: "X".into(),
        nats_topic: nats_topic.into(),
        subtopic: String::new(),
        kind: kind.into(),
        workers,
    }
}

impl Harness {
    /// Build a harness with no cache attached, publisher starts connected.
    pub async fn connected(routes: Vec<RouteConf>) -> Self {
        Self::build(Arc::new(MockChannel::new()), None, routes).await
    }

    /// Build a harness with a cache attached, publisher starts connected.
    pub async fn with_cache(routes: Vec<RouteConf>) -> (Self, Arc<MockCache>) {
        let cache = Arc::new(MockCache::new());
        let harness = Self::build(Arc::new(MockChannel::new()), Some(Arc::clone(&cache)), routes).await;
        (harness, cache)
    }

    /// Build a harness whose publisher starts disconnected and has no
    /// cache attached, so publish failures surface `NoCacheConfigured`.
    pub async fn build_disconnected_no_cache(routes: Vec<RouteConf>) -> Self {
        let harness = Self::build(Arc::new(MockChannel::disconnected()), None, routes).await;
        harness.connected_tx.send(false).await.unwrap();
        harness
    }

    /// Build a harness whose publisher starts disconnected, with a cache
    /// attached so failed publishes are stashed.
    pub async fn disconnected_with_cache(routes: Vec<RouteConf>) -> (Self, Arc<MockCache>) {
        let cache = Arc::new(MockCache::new());
        let harness = Self::build(
            Arc::new(MockChannel::disconnected()),
            Some(Arc::clone(&cache)),
            routes,
        )
        .await;
        harness.connected_tx.send(false).await.unwrap();
        (harness, cache)
    }

    async fn build(
        channel: Arc<MockChannel>,
        cache: Option<Arc<MockCache>>,
        routes: Vec<RouteConf>,
    ) -> Self {
        let bus = Arc::new(MockBus::new());
        let (tx, rx) = mpsc::channel(1);
        tx.send(true).await.unwrap();

        let engine = Engine::new(
            "export-test".to_string(),
            Arc::clone(&bus),
            cache,
            Arc::clone(&channel) as Arc<dyn Channel>,
            rx,
            routes,
        )
        .await;

        Self {
            engine: Arc::new(engine),
            bus,
            channel,
            connected_tx: tx,
        }
    }

    pub fn start(&self) -> Result<(), exp_engine::EngineError> {
        self.engine.start("export")
    }

    pub async fn subscribe(&self) {
        self.engine.subscribe().await.unwrap();
    }

    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(40)).await;
    }

    pub async fn go_connected(&self) {
        self.channel.set_connected(true);
        self.connected_tx.send(true).await.unwrap();
    }
}
