//! Redis Streams-backed [`Cache`] implementation.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::collections::HashMap;

use crate::error::{CacheError, CacheResult};
use crate::record::CachedRecord;
use crate::{Cache, ReadGroupBatch};

const APPROX_MAX_LEN: usize = 1000;

/// A connection to the Redis instance backing the replay cache.
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url).map_err(|e| CacheError::Connect(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| CacheError::Connect(e.to_string()))?;
        Ok(Self { conn })
    }

    /// Connect using the `exp.cache_url`/`cache_pass`/`cache_db` config
    /// triple, building the `redis://[:password@]host[/db]` URL the
    /// `redis` crate expects.
    pub async fn connect_with(host: &str, password: &str, db: u8) -> CacheResult<Self> {
        let auth = if password.is_empty() {
            String::new()
        } else {
            format!(":{password}@")
        };
        let scheme_stripped = host.trim_start_matches("redis://");
        let url = format!("redis://{auth}{scheme_stripped}/{db}");
        Self::connect(&url).await
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn append(&self, stream: &str, record: &CachedRecord) -> CacheResult<String> {
        let mut conn = self.conn.clone();
        let fields = record.encode();
        conn.xadd_maxlen(stream, StreamMaxlen::Approx(APPROX_MAX_LEN), "*", &fields)
            .await
            .map_err(|e| CacheError::Append {
                stream: stream.to_string(),
                source: e.to_string(),
            })
    }

    async fn group_create(&self, stream: &str, group: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let result: redis::RedisResult<()> =
            conn.xgroup_create_mkstream(stream, group, "$").await;
        match result {
            Ok(()) => Ok(()),
            // BUSYGROUP: the group already exists — idempotent no-op.
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                tracing::debug!(stream, group, "consumer group already exists");
                Ok(())
            }
            Err(e) => Err(CacheError::GroupCreate {
                stream: stream.to_string(),
                group: group.to_string(),
                source: e.to_string(),
            }),
        }
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
    ) -> CacheResult<ReadGroupBatch> {
        let mut conn = self.conn.clone();
        let opts = StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(0);

        let reply: StreamReadReply = conn
            .xread_options(&[stream], &[">"], &opts)
            .await
            .map_err(|e| CacheError::ReadGroup {
                stream: stream.to_string(),
                group: group.to_string(),
                source: e.to_string(),
            })?;

        let mut batch = ReadGroupBatch::default();
        for key in reply.keys {
            for id in key.ids {
                let fields: HashMap<String, String> = id
                    .map
                    .iter()
                    .filter_map(|(k, v)| {
                        redis::from_redis_value::<String>(v)
                            .ok()
                            .map(|v| (k.clone(), v))
                    })
                    .collect();
                match CachedRecord::decode(&fields) {
                    Some(record) => batch.entries.push((id.id.clone(), record)),
                    None => batch.decode_failures += 1,
                }
            }
        }
        Ok(batch)
    }

    async fn delete(&self, stream: &str, id: &str) -> CacheResult<u64> {
        let mut conn = self.conn.clone();
        conn.xdel(stream, &[id])
            .await
            .map_err(|e| CacheError::Delete {
                stream: stream.to_string(),
                id: id.to_string(),
                source: e.to_string(),
            })
    }
}
