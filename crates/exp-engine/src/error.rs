use thiserror::Error;

use exp_bus::BusError;
use exp_cache::CacheError;
use exp_mqtt::MqttError;

use crate::route::RouteError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no routes configured")]
    NoRoutesConfigured,

    #[error("publish failed and no cache is configured: {0}")]
    NoCacheConfigured(#[source] MqttError),

    #[error("failed to add message to replay stream: {0}")]
    FailedToAddToStream(#[source] CacheError),

    #[error(transparent)]
    Route(#[from] RouteError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

pub type EngineResult<T> = Result<T, EngineError>;
