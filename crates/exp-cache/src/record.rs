//! The cached-record wire shape: `{topic, payload}`, encoded as a stream
//! field map.

/// A message stashed because a publish attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRecord {
    pub topic: String,
    pub payload: String,
}

impl CachedRecord {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    pub fn encode(&self) -> Vec<(&'static str, String)> {
        vec![("topic", self.topic.clone()), ("payload", self.payload.clone())]
    }

    /// Decode from a field map; a missing `topic` or `payload` field is
    /// the `DecodingData` error the engine counts against the batch.
    pub fn decode(fields: &std::collections::HashMap<String, String>) -> Option<Self> {
        Some(Self {
            topic: fields.get("topic")?.clone(),
            payload: fields.get("payload")?.clone(),
        })
    }
}
