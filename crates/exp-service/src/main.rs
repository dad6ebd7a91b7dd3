//! NATS-to-MQTT export bridge — process bootstrap.
//!
//! Loads configuration, opens the MQTT connection, builds the routing
//! engine, subscribes every route, and runs the heartbeat emitter and
//! the HTTP host surface until a shutdown signal arrives.

mod heartbeat;
mod http;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use exp_bus::NatsBus;
use exp_cache::RedisCache;
use exp_config::Config;
use exp_engine::{Engine, engine_id};
use exp_mqtt::{Channel, MqttChannel};

use crate::http::{AppState, Metrics, build_router};

const QUEUE_GROUP: &str = "export";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/etc/export/config.toml"));

    let config = Config::load(&config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone())),
        )
        .json()
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config_path = %config_path.display(),
        "export bridge starting"
    );

    let id = engine_id(&config.mqtt.username);

    let (channel, eventloop, connected_rx) = MqttChannel::new(&config.mqtt, &id)?;
    let channel = Arc::new(channel);
    let eventloop_channel = Arc::clone(&channel);
    tokio::spawn(async move { eventloop_channel.run_event_loop(eventloop).await });

    let bus = Arc::new(NatsBus::connect(&config.server.nats_url).await?);

    let cache = if config.server.cache_url.is_empty() {
        None
    } else {
        Some(Arc::new(
            RedisCache::connect_with(
                &config.server.cache_url,
                &config.server.cache_password,
                config.server.cache_db,
            )
            .await?,
        ))
    };

    let mqtt_channel = Arc::clone(&channel);
    let engine = Arc::new(
        Engine::new(
            id,
            Arc::clone(&bus),
            cache,
            channel as Arc<dyn Channel>,
            connected_rx,
            config.routes,
        )
        .await,
    );

    engine.start(QUEUE_GROUP)?;
    engine.subscribe().await?;
    tracing::info!("routes subscribed, export bridge ready");

    let metrics = Arc::new(Metrics::default());
    let heartbeat_task = tokio::spawn(heartbeat::run(Arc::clone(&bus), Arc::clone(&metrics)));

    let state = AppState {
        metrics,
        started_at: Instant::now(),
    };
    let app = build_router(state);
    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "host surface listening");

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "http server exited");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    heartbeat_task.abort();

    // Ordered shutdown: unsubscribe from the bus (each route's inbound
    // channel closes as its forwarder stops), let workers drain and
    // exit, then disconnect the MQTT client. The bus and cache clients
    // have no explicit async close — dropping them tears down their
    // underlying connections.
    engine.shutdown().await;
    mqtt_channel.disconnect().await;
    drop(engine);
    drop(bus);

    tracing::info!("export bridge stopped");
    Ok(())
}
