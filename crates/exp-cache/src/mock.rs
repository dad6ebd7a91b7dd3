//! In-memory fake cache for engine and service tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{CacheError, CacheResult};
use crate::record::CachedRecord;
use crate::{Cache, ReadGroupBatch};

struct Stream {
    entries: Vec<(String, CachedRecord)>,
    groups: Vec<String>,
    cursor: HashMap<String, usize>,
    next_id: u64,
}

impl Stream {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            groups: Vec::new(),
            cursor: HashMap::new(),
            next_id: 1,
        }
    }
}

/// A [`Cache`] backed by a plain in-process map, for tests that don't
/// want a real Redis instance.
#[derive(Default)]
pub struct MockCache {
    streams: Mutex<HashMap<String, Stream>>,
}

impl MockCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently stored in `stream` (not yet deleted).
    pub fn len(&self, stream: &str) -> usize {
        self.streams
            .lock()
            .unwrap()
            .get(stream)
            .map(|s| s.entries.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Cache for MockCache {
    async fn append(&self, stream: &str, record: &CachedRecord) -> CacheResult<String> {
        let mut streams = self.streams.lock().unwrap();
        let entry = streams.entry(stream.to_string()).or_insert_with(Stream::new);
        let id = format!("{}-0", entry.next_id);
        entry.next_id += 1;
        entry.entries.push((id.clone(), record.clone()));
        Ok(id)
    }

    async fn group_create(&self, stream: &str, group: &str) -> CacheResult<()> {
        let mut streams = self.streams.lock().unwrap();
        let entry = streams.entry(stream.to_string()).or_insert_with(Stream::new);
        if !entry.groups.contains(&group.to_string()) {
            entry.groups.push(group.to_string());
            entry.cursor.insert(group.to_string(), entry.entries.len());
        }
        Ok(())
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        _consumer: &str,
        count: usize,
    ) -> CacheResult<ReadGroupBatch> {
        let mut streams = self.streams.lock().unwrap();
        let entry = streams
            .get_mut(stream)
            .ok_or_else(|| CacheError::ReadGroup {
                stream: stream.to_string(),
                group: group.to_string(),
                source: "no such stream".to_string(),
            })?;
        let cursor = entry.cursor.entry(group.to_string()).or_insert(0);
        let mut batch = ReadGroupBatch::default();
        let end = (*cursor + count).min(entry.entries.len());
        for (id, record) in &entry.entries[*cursor..end] {
            batch.entries.push((id.clone(), record.clone()));
        }
        *cursor = end;
        Ok(batch)
    }

    async fn delete(&self, stream: &str, id: &str) -> CacheResult<u64> {
        let mut streams = self.streams.lock().unwrap();
        let Some(entry) = streams.get_mut(stream) else {
            return Ok(0);
        };
        let before = entry.entries.len();
        entry.entries.retain(|(entry_id, _)| entry_id != id);
        Ok((before - entry.entries.len()) as u64)
    }
}
