//! Broadcast port - room membership and event fanout for one namespace.
//!
//! The namespace layer is agnostic to whether broadcasting is single-node
//! or clustered; both adapters implement this contract. Rooms are non-empty
//! strings scoped to the namespace; a room exists exactly as long as it has
//! members.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::Connection;

/// Callback invoked for each member during [`Broadcast::for_each`].
pub type EachFn<'a> = &'a mut (dyn FnMut(&Arc<dyn Connection>) + Send);

/// Port for room membership and event fanout within one namespace.
///
/// All operations return promptly except `len` and `all_rooms`, which in a
/// clustered deployment suspend until every peer has answered or a deadline
/// elapses. Fire-and-forget semantics apply to the cross-node side of
/// `send`, `send_all` and `clear`: bus failures are never surfaced here.
#[async_trait]
pub trait Broadcast: Send + Sync {
    /// Add a connection to a room, creating the room if absent. Idempotent.
    async fn join(&self, room: &str, conn: &Arc<dyn Connection>);

    /// Remove a connection from a room; the room is dropped when its last
    /// member leaves. No error if either is absent.
    async fn leave(&self, room: &str, conn: &Arc<dyn Connection>);

    /// Remove a connection from every room. The transport layer must call
    /// this when a connection closes.
    async fn leave_all(&self, conn: &Arc<dyn Connection>);

    /// Drop a room outright, cluster-wide.
    async fn clear(&self, room: &str);

    /// Emit an event to every member of a room, cluster-wide.
    async fn send(&self, room: &str, event: &str, args: &[JsonValue]);

    /// Emit an event to every room in the namespace, cluster-wide. A
    /// connection in k rooms receives the event k times - rooms are
    /// independent fanout sets.
    async fn send_all(&self, event: &str, args: &[JsonValue]);

    /// Invoke `f` for each local member of a room. The set iterated is a
    /// snapshot; membership changes during iteration do not break the walk.
    async fn for_each(&self, room: &str, f: EachFn<'_>);

    /// Number of connections in a room across the cluster.
    async fn len(&self, room: &str) -> usize;

    /// With `None`, every room in the namespace across the cluster; with a
    /// connection, the rooms that connection is in (local knowledge -
    /// membership of a specific connection is inherently local).
    async fn rooms(&self, conn: Option<&Arc<dyn Connection>>) -> Vec<String>;

    /// Every room in the namespace across the cluster.
    async fn all_rooms(&self) -> Vec<String>;

    /// Release bus connections and stop the receive loop. Local-only
    /// adapters treat this as a no-op.
    async fn shutdown(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time check that the trait is object-safe
    #[allow(dead_code)]
    fn assert_object_safe(_: &dyn Broadcast) {}

    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}
}
