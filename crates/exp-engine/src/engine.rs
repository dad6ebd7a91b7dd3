//! Owns the route table, binds routes to bus subscriptions, starts
//! workers, implements the publish-or-stash contract, and runs the
//! replay loop.

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use exp_bus::{Bus, BusMessage, Subscription};
use exp_cache::{Cache, CachedRecord};
use exp_config::RouteConf;
use exp_mqtt::{Channel, Publish, PublishError};

use crate::error::{EngineError, EngineResult};
use crate::route::Route;
use crate::transform::transform;

const QUEUE_GROUP: &str = "export";
const REPLAY_BATCH: usize = 100;
const DEBUG_SLICE_LEN: usize = 50;

struct StartedState {
    routes: Vec<Route>,
    // Populated by `subscribe`/`start` after the `OnceLock` is set, so
    // these need their own interior mutability.
    subscriptions: Mutex<Vec<Subscription>>,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
    replay_handles: Mutex<Vec<JoinHandle<()>>>,
}

/// The routing and delivery engine. Generic over the bus and cache
/// implementations so it can be exercised in tests against in-memory
/// fakes (`MockBus`, `MockCache`) without a running NATS or Redis
/// instance.
pub struct Engine<B: Bus, C: Cache> {
    id: String,
    bus: Arc<B>,
    cache: Option<Arc<C>>,
    channel: Arc<dyn Channel>,
    connected: watch::Receiver<bool>,
    route_confs: Vec<RouteConf>,
    state: OnceLock<StartedState>,
}

impl<B: Bus + 'static, C: Cache + 'static> Engine<B, C> {
    /// Open the MQTT connection (blocking until the first connect
    /// result) and build an engine ready for `start`. `connected_rx` is
    /// the edge-triggered single-slot channel returned by
    /// `MqttChannel::new`; it is fanned out internally into a
    /// `tokio::sync::watch` so every per-route replay loop can await the
    /// next transition independently.
    pub async fn new(
        id: String,
        bus: Arc<B>,
        cache: Option<Arc<C>>,
        channel: Arc<dyn Channel>,
        connected_rx: mpsc::Receiver<bool>,
        route_confs: Vec<RouteConf>,
    ) -> Self {
        let (tx, mut rx) = watch::channel(false);
        tokio::spawn(async move {
            let mut connected_rx = connected_rx;
            while let Some(value) = connected_rx.recv().await {
                let _ = tx.send(value);
            }
        });

        if !*rx.borrow() {
            let _ = rx.changed().await;
        }

        Self {
            id,
            bus,
            cache,
            channel,
            connected: rx,
            route_confs,
            state: OnceLock::new(),
        }
    }

    /// Build the route table from config, validating each subject and
    /// rejecting duplicate route keys. Fails with `NoRoutesConfigured`
    /// if the table is empty after filtering. Launches the replay loop
    /// per route iff a cache is attached.
    pub fn start(self: &Arc<Self>, queue: &str) -> EngineResult<()> {
        let mut seen = HashSet::new();
        let mut routes = Vec::new();

        for conf in &self.route_confs {
            match Route::from_conf(conf) {
                Ok(route) => {
                    if !seen.insert(route.nats_topic.clone()) {
                        tracing::warn!(
                            nats_topic = %route.nats_topic,
                            "duplicate route key, skipping"
                        );
                        continue;
                    }
                    routes.push(route);
                }
                Err(e) => {
                    tracing::warn!(
                        nats_topic = %conf.nats_topic,
                        error = %e,
                        "invalid route, skipping"
                    );
                }
            }
        }

        if routes.is_empty() {
            return Err(EngineError::NoRoutesConfigured);
        }

        let state = StartedState {
            routes,
            subscriptions: Mutex::new(Vec::new()),
            worker_handles: Mutex::new(Vec::new()),
            replay_handles: Mutex::new(Vec::new()),
        };

        self.state
            .set(state)
            .unwrap_or_else(|_| panic!("Engine::start called more than once"));

        let state = self.state.get().unwrap();
        if let Some(cache) = &self.cache {
            for route in &state.routes {
                let engine = Arc::clone(self);
                let cache = Arc::clone(cache);
                let route = route.clone();
                let handle = tokio::spawn(async move {
                    replay_loop(engine, cache, route).await;
                });
                state.replay_handles.try_lock().unwrap().push(handle);
            }
        }

        let _ = queue;
        Ok(())
    }

    /// Register a bus subscription per route under the shared queue
    /// group and spawn `workers` worker tasks per route. Subscription
    /// handles and worker task handles are retained so `shutdown` can
    /// stop them in order.
    pub async fn subscribe(self: &Arc<Self>) -> EngineResult<()> {
        let state = self
            .state
            .get()
            .expect("Engine::start must be called before Engine::subscribe");

        for route in &state.routes {
            let (rx, subscription) = self
                .bus
                .queue_subscribe(&route.subject, QUEUE_GROUP, route.workers)
                .await?;
            state.subscriptions.lock().await.push(subscription);
            let inbox = Arc::new(Mutex::new(rx));

            for _ in 0..route.workers {
                let engine = Arc::clone(self);
                let inbox = Arc::clone(&inbox);
                let route = route.clone();
                let handle = tokio::spawn(async move {
                    worker_loop(engine, route, inbox).await;
                });
                state.worker_handles.lock().await.push(handle);
            }
        }

        Ok(())
    }

    /// Ordered shutdown, per the bridge's documented shutdown sequence:
    /// stop the bus subscriptions (so each route's inbound channel's
    /// sender half drops), wait for workers to drain their channel and
    /// exit, then stop the per-route replay loops.
    pub async fn shutdown(self: &Arc<Self>) {
        let Some(state) = self.state.get() else {
            return;
        };

        for subscription in state.subscriptions.lock().await.drain(..) {
            subscription.stop();
        }

        for handle in state.worker_handles.lock().await.drain(..) {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "route worker task panicked during shutdown");
            }
        }

        for handle in state.replay_handles.lock().await.drain(..) {
            handle.abort();
        }
    }

    async fn publish_or_stash(&self, subject: &str, topic: &str, payload: &[u8]) -> EngineResult<()> {
        match self.channel.publish(topic, payload).await {
            Ok(()) => Ok(()),
            Err(e) => match &self.cache {
                Some(cache) => {
                    let record = CachedRecord::new(topic, String::from_utf8_lossy(payload));
                    cache
                        .append(subject, &record)
                        .await
                        .map_err(EngineError::FailedToAddToStream)?;
                    Ok(())
                }
                None => Err(EngineError::NoCacheConfigured(e)),
            },
        }
    }
}

#[async_trait]
impl<B: Bus + 'static, C: Cache + 'static> Publish for Engine<B, C> {
    async fn publish(&self, subject: &str, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        self.publish_or_stash(subject, topic, payload)
            .await
            .map_err(|e| Box::new(e) as PublishError)
    }
}

async fn worker_loop<B: Bus + 'static, C: Cache + 'static>(
    engine: Arc<Engine<B, C>>,
    route: Route,
    inbox: Arc<Mutex<mpsc::Receiver<BusMessage>>>,
) {
    loop {
        let received = {
            let mut rx = inbox.lock().await;
            rx.recv().await
        };
        let Some(msg) = received else {
            break;
        };

        let payload = match transform(&route.kind, &msg.data) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(subject = %msg.subject, error = %e, "failed to transform message");
                continue;
            }
        };

        let topic = route.outbound_topic(&msg.subject);
        if let Err(e) = Publish::publish(engine.as_ref(), &msg.subject, &topic, &payload).await {
            tracing::error!(subject = %msg.subject, topic = %topic, error = %e, "failed to publish on route");
        }
        log_published(&msg.subject, &payload);
    }
    tracing::debug!(route = %route.nats_topic, "route worker exiting, channel closed");
}

fn log_published(subject: &str, payload: &[u8]) {
    let len = payload.len().min(DEBUG_SLICE_LEN);
    let preview = String::from_utf8_lossy(&payload[..len]);
    tracing::debug!(subject = %subject, payload = %preview, "published");
}

/// Drain stashed records for one route and republish them once the
/// publisher is connected. Runs for the engine's lifetime; a read error
/// is logged and retried rather than propagated.
async fn replay_loop<B: Bus + 'static, C: Cache + 'static>(
    engine: Arc<Engine<B, C>>,
    cache: Arc<C>,
    route: Route,
) {
    if let Err(e) = cache.group_create(&route.nats_topic, QUEUE_GROUP).await {
        tracing::warn!(route = %route.nats_topic, error = %e, "failed to create consumer group");
    }

    let mut connected = engine.connected.clone();

    loop {
        if !*connected.borrow() {
            if connected.changed().await.is_err() {
                return;
            }
            continue;
        }

        match cache
            .read_group(&route.nats_topic, QUEUE_GROUP, &engine.id, REPLAY_BATCH)
            .await
        {
            Ok(batch) => {
                if batch.decode_failures > 0 {
                    tracing::warn!(
                        route = %route.nats_topic,
                        failures = batch.decode_failures,
                        "failed to decode some cached records"
                    );
                }
                if batch.entries.is_empty() {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
                if !*connected.borrow() && connected.changed().await.is_err() {
                    return;
                }
                for (_id, record) in batch.entries {
                    if let Err(e) = engine.channel.publish(&record.topic, record.payload.as_bytes()).await {
                        tracing::error!(topic = %record.topic, error = %e, "replay publish failed");
                    }
                }
            }
            Err(e) => {
                tracing::error!(route = %route.nats_topic, error = %e, "replay read failed, retrying");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exp_bus::MockBus;
    use exp_cache::MockCache;
    use exp_mqtt::MockChannel;
    use exp_config::RouteConf;

    fn route_conf(nats_topic: &str, kind: &str, workers: usize) -> RouteConf {
        RouteConf {
            mqtt_topic: "X".into(),
            nats_topic: nats_topic.into(),
            subtopic: String::new(),
            kind: kind.into(),
            workers,
        }
    }

    /// Build an engine wired to fakes, pre-seeding the connect signal so
    /// `Engine::new` doesn't block forever waiting for a first connect.
    async fn build_engine(
        channel: Arc<MockChannel>,
        cache: Option<Arc<MockCache>>,
        route_confs: Vec<RouteConf>,
    ) -> (Arc<Engine<MockBus, MockCache>>, Arc<MockBus>, mpsc::Sender<bool>) {
        let bus = Arc::new(MockBus::new());
        let (tx, rx) = mpsc::channel(1);
        tx.send(true).await.unwrap();

        let engine = Engine::new(
            "export-test".to_string(),
            Arc::clone(&bus),
            cache,
            channel as Arc<dyn Channel>,
            rx,
            route_confs,
        )
        .await;

        (Arc::new(engine), bus, tx)
    }

    #[tokio::test]
    async fn default_route_publishes_delivered_message() {
        let channel = Arc::new(MockChannel::new());
        let (engine, bus, _tx) = build_engine(
            Arc::clone(&channel),
            None,
            vec![route_conf("a", "default", 2)],
        )
        .await;

        engine.start("export").unwrap();
        engine.subscribe().await.unwrap();

        bus.deliver("export.a.dev1", &b"hello"[..]).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let published = channel.published_to("X/export/a/dev1");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].payload, b"hello");
    }

    #[tokio::test]
    async fn mfx_route_publishes_decoded_inner_payload() {
        use base64::Engine as _;

        let channel = Arc::new(MockChannel::new());
        let (engine, bus, _tx) = build_engine(
            Arc::clone(&channel),
            None,
            vec![route_conf("a", "mfx", 2)],
        )
        .await;

        engine.start("export").unwrap();
        engine.subscribe().await.unwrap();

        let encoded = base64::engine::general_purpose::STANDARD.encode(b"p");
        let envelope = serde_json::json!({"channel": "a", "payload": encoded});
        bus.deliver("export.a.dev1", serde_json::to_vec(&envelope).unwrap())
            .await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let published = channel.published_to("X/export/a/dev1");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].payload, b"p");
    }

    #[tokio::test]
    async fn disconnected_publish_stashes_to_cache() {
        let channel = Arc::new(MockChannel::disconnected());
        let cache = Arc::new(MockCache::new());
        let (engine, bus, tx) = build_engine(
            Arc::clone(&channel),
            Some(Arc::clone(&cache)),
            vec![route_conf("a", "default", 2)],
        )
        .await;

        engine.start("export").unwrap();
        // Let the spawned replay loop's group_create land before stashing.
        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.subscribe().await.unwrap();

        // Reflect the disconnect on the engine's own watch signal so the
        // replay loop doesn't try to republish prematurely.
        tx.send(false).await.unwrap();

        bus.deliver("export.a.dev1", &b"hello"[..]).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(channel.published().is_empty());
        assert_eq!(cache.len("a"), 1);
    }

    #[tokio::test]
    async fn reconnect_replays_stashed_record() {
        let channel = Arc::new(MockChannel::disconnected());
        let cache = Arc::new(MockCache::new());
        let (engine, bus, tx) = build_engine(
            Arc::clone(&channel),
            Some(Arc::clone(&cache)),
            vec![route_conf("a", "default", 2)],
        )
        .await;

        engine.start("export").unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.subscribe().await.unwrap();

        tx.send(false).await.unwrap();
        bus.deliver("export.a.dev1", &b"hello"[..]).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.len("a"), 1);

        channel.set_connected(true);
        tx.send(true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let published = channel.published_to("X/export/a/dev1");
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].payload, b"hello");
    }

    #[tokio::test]
    async fn invalid_only_route_fails_start_with_no_routes_configured() {
        let channel = Arc::new(MockChannel::new());
        let (engine, _bus, _tx) =
            build_engine(channel, None, vec![route_conf("a. .b", "default", 1)]).await;

        let err = engine.start("export").unwrap_err();
        assert!(matches!(err, EngineError::NoRoutesConfigured));
    }

    #[tokio::test]
    async fn empty_routes_list_fails_start() {
        let channel = Arc::new(MockChannel::new());
        let (engine, _bus, _tx) = build_engine(channel, None, vec![]).await;

        let err = engine.start("export").unwrap_err();
        assert!(matches!(err, EngineError::NoRoutesConfigured));
    }

    #[tokio::test]
    async fn duplicate_route_keys_are_collapsed_to_one() {
        let channel = Arc::new(MockChannel::new());
        let (engine, bus, _tx) = build_engine(
            Arc::clone(&channel),
            None,
            vec![route_conf("a", "default", 1), route_conf("a", "default", 1)],
        )
        .await;

        engine.start("export").unwrap();
        engine.subscribe().await.unwrap();

        // Only one subscription should have been registered for "a".
        bus.deliver("export.a.dev1", &b"hello"[..]).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(channel.published_to("X/export/a/dev1").len(), 1);
    }

    #[tokio::test]
    async fn unrecognized_route_kind_is_subscribed_and_drops_messages_per_delivery() {
        let channel = Arc::new(MockChannel::new());
        let (engine, bus, _tx) = build_engine(
            Arc::clone(&channel),
            None,
            vec![route_conf("a", "typo'd-kind", 1)],
        )
        .await;

        // A bad `type` is not a startup error: the route table still has
        // one entry, so `start` must succeed rather than failing with
        // `NoRoutesConfigured`.
        engine.start("export").unwrap();
        engine.subscribe().await.unwrap();

        bus.deliver("export.a.dev1", &b"hello"[..]).await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(channel.published_to("X/export/a/dev1").is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_subscription_and_drains_workers() {
        let channel = Arc::new(MockChannel::new());
        let (engine, bus, _tx) = build_engine(
            Arc::clone(&channel),
            None,
            vec![route_conf("a", "default", 2)],
        )
        .await;

        engine.start("export").unwrap();
        engine.subscribe().await.unwrap();

        bus.deliver("export.a.dev1", &b"hello"[..]).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(channel.published_to("X/export/a/dev1").len(), 1);

        // Stops the subscription's forwarder, which drops the inbound
        // channel's sender half; workers drain and exit, and `shutdown`
        // joins them before returning.
        engine.shutdown().await;

        // A delivery after shutdown has nowhere to go: no forwarder is
        // running, so no worker sees it and nothing new is published.
        bus.deliver("export.a.dev2", &b"world"[..]).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(channel.published_to("X/export/a/dev2").is_empty());
    }

    #[tokio::test]
    async fn publish_without_cache_surfaces_no_cache_configured() {
        let channel = Arc::new(MockChannel::disconnected());
        let (engine, _bus, _tx) =
            build_engine(channel, None, vec![route_conf("a", "default", 1)]).await;
        engine.start("export").unwrap();

        let err = Publish::publish(engine.as_ref(), "export.a.dev1", "X/a/dev1", b"hello")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no cache is configured"));
    }
}
