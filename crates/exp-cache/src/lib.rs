//! Replay cache: an append-only durable stream keyed per subject,
//! supporting blocking consumer-group reads and capped retention.
//!
//! A message enters the cache only after a publish attempt has failed;
//! successful publishes leave no trace here.

pub mod error;
pub mod mock;
pub mod record;
pub mod redis_cache;

pub use error::{CacheError, CacheResult};
pub use mock::MockCache;
pub use record::CachedRecord;
pub use redis_cache::RedisCache;

use async_trait::async_trait;

/// One batch read from [`Cache::read_group`]: successfully decoded
/// records plus a count of entries that failed to decode (logged and
/// dropped by the caller, never propagated).
#[derive(Debug, Default)]
pub struct ReadGroupBatch {
    pub entries: Vec<(String, CachedRecord)>,
    pub decode_failures: usize,
}

/// Abstraction over the replay cache store, so the engine can be tested
/// against an in-memory fake without a Redis server.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Append `record` to `stream`, capped at an approximate maximum
    /// length. Returns the assigned record id.
    async fn append(&self, stream: &str, record: &CachedRecord) -> CacheResult<String>;

    /// Idempotently create consumer group `group` on `stream`, starting
    /// at the current tail (only new entries are delivered). An
    /// already-exists error is expected and should be tolerated by the
    /// caller, not surfaced as a fatal error.
    async fn group_create(&self, stream: &str, group: &str) -> CacheResult<()>;

    /// Blocking consumer-group read of up to `count` messages from
    /// `stream` under `group`/`consumer`.
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> CacheResult<ReadGroupBatch>;

    /// Remove a record from a stream. Not used on the replay path — the
    /// length cap is what actually trims the stream — but kept because
    /// the store protocol supports it and tooling may want it.
    async fn delete(&self, stream: &str, id: &str) -> CacheResult<u64>;
}
