//! Maps a route's declared kind to a payload-decoding function.

use base64::Engine as _;
use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("route type is not supported: {0}")]
    UnsupportedType(String),
    #[error("failed to decode envelope: {0}")]
    Decode(String),
}

/// A route's declared transformation kind. Unrecognized kind strings are
/// carried through as `Unknown` rather than rejected at parse time — the
/// route table doesn't know at construction whether a kind is one this
/// binary supports; that's a per-message decision made in [`transform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformKind {
    Default,
    Mfx,
    Unknown(String),
}

impl TransformKind {
    pub fn parse(kind: &str) -> Self {
        match kind {
            "default" => Self::Default,
            "mfx" => Self::Mfx,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// The platform's wire envelope: a JSON object carrying a base64-encoded
/// `payload` field alongside routing metadata that this bridge doesn't
/// need to inspect.
#[derive(Debug, Deserialize)]
struct MfxEnvelope {
    #[serde(default)]
    #[allow(dead_code)]
    channel: String,
    #[serde(default)]
    #[allow(dead_code)]
    subtopic: String,
    #[serde(default)]
    #[allow(dead_code)]
    publisher: String,
    payload: String,
}

/// Transform one delivered message's payload according to `kind`. An
/// `Unknown` kind always fails here, at the per-message step the spec
/// describes — it is never rejected earlier, at route-table construction.
pub fn transform(kind: &TransformKind, data: &[u8]) -> Result<Bytes, TransformError> {
    match kind {
        TransformKind::Default => Ok(Bytes::copy_from_slice(data)),
        TransformKind::Mfx => decode_mfx(data),
        TransformKind::Unknown(raw) => Err(TransformError::UnsupportedType(raw.clone())),
    }
}

fn decode_mfx(data: &[u8]) -> Result<Bytes, TransformError> {
    let envelope: MfxEnvelope =
        serde_json::from_slice(data).map_err(|e| TransformError::Decode(e.to_string()))?;
    let payload = base64::engine::general_purpose::STANDARD
        .decode(envelope.payload)
        .map_err(|e| TransformError::Decode(e.to_string()))?;
    Ok(Bytes::from(payload))
}
