//! The message shape delivered from the bus to a route.

use bytes::Bytes;

/// A message delivered from the bus. `subject` is the concrete subject the
/// message was published on, which may extend past the route's wildcard
/// prefix (e.g. `export.a.dev1` for a route subscribed to `export.a.>`).
#[derive(Debug, Clone)]
pub struct BusMessage {
    pub subject: String,
    pub data: Bytes,
}
