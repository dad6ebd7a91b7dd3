use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to connect to cache: {0}")]
    Connect(String),

    #[error("failed to append to stream {stream}: {source}")]
    Append { stream: String, source: String },

    #[error("failed to create group {group} on stream {stream}: {source}")]
    GroupCreate {
        stream: String,
        group: String,
        source: String,
    },

    #[error("failed to read group {group} on stream {stream}: {source}")]
    ReadGroup {
        stream: String,
        group: String,
        source: String,
    },

    #[error("failed to delete {id} from stream {stream}: {source}")]
    Delete {
        stream: String,
        id: String,
        source: String,
    },
}

pub type CacheResult<T> = Result<T, CacheError>;
