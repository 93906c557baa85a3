//! Roomcast - Real-time room broadcast server core.
//!
//! Connections join named rooms inside namespaces, and the server broadcasts
//! events to rooms, whole namespaces, or single connections. A cluster of
//! server processes cooperates through a shared pub/sub message bus (Redis in
//! production) so that an event published on any node reaches subscribers
//! attached to every other node.
//!
//! The transport (WebSocket/long-polling framing, handshake, heartbeat) and
//! the packet parser are external collaborators: they hand fully decoded
//! events to [`application::Namespace`] and implement [`ports::Connection`]
//! for delivery back to the client.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
