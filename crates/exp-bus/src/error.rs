use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to connect to bus: {0}")]
    Connect(String),

    #[error("failed to subscribe to {subject}: {source}")]
    Subscribe { subject: String, source: String },

    #[error("failed to publish: {0}")]
    Publish(String),
}

pub type BusResult<T> = Result<T, BusError>;
