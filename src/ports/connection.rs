//! Connection port - one connected client as seen by the broadcast core.

use serde_json::Value as JsonValue;

use crate::domain::foundation::ConnectionId;

/// A connected client.
///
/// Implemented by the transport layer (WebSocket, long-polling). The
/// broadcast adapter keys connections by [`ConnectionId`] and holds only
/// `Weak` references to them - the transport owns the connection's lifetime
/// and must call `leave_all` on the adapter when the connection closes so
/// stale ids drain from the room index.
pub trait Connection: Send + Sync {
    /// Stable identifier for this connection.
    fn id(&self) -> &ConnectionId;

    /// Deliver a named event to the client.
    ///
    /// Fire-and-forget from the adapter's perspective: implementations
    /// enqueue the frame on their outbound channel and surface transport
    /// failures through their own close path, never to the broadcaster.
    fn emit(&self, event: &str, args: &[JsonValue]);
}
