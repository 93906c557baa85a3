//! Clustered broadcast adapter.
//!
//! Composes the local room index with a remote bridge over the message
//! bus. Membership (`join`, `leave`, `leave_all`, `for_each`, `rooms` of a
//! connection) is purely local - a connection lives on exactly one node.
//! Fanout (`send`, `send_all`, `clear`) applies locally first and forwards
//! to the peers fire-and-forget. Introspection (`len`, `all_rooms`)
//! aggregates answers from every node through the request coordinator.

mod bridge;
mod envelope;
mod requests;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use self::bridge::RemoteBridge;
use super::local::RoomIndex;
use super::AdapterError;
use crate::config::AdapterConfig;
use crate::ports::{Broadcast, Connection, EachFn, MessageBus};

/// Broadcast adapter for one namespace of one node in a cluster.
pub struct ClusterBroadcast {
    index: Arc<RoomIndex>,
    bridge: Arc<RemoteBridge>,
}

impl ClusterBroadcast {
    /// Connect a namespace to the cluster: subscribe the bridge and start
    /// its receive loop. Fails if the bus rejects the subscriptions.
    pub async fn connect(
        nsp: &str,
        config: &AdapterConfig,
        bus: Arc<dyn MessageBus>,
    ) -> Result<Self, AdapterError> {
        let index = Arc::new(RoomIndex::new());
        let bridge = RemoteBridge::connect(
            nsp,
            &config.prefix,
            config.request_timeout(),
            bus,
            Arc::clone(&index),
        )
        .await?;

        Ok(Self { index, bridge })
    }
}

#[async_trait]
impl Broadcast for ClusterBroadcast {
    async fn join(&self, room: &str, conn: &Arc<dyn Connection>) {
        self.index.join(room, conn).await;
    }

    async fn leave(&self, room: &str, conn: &Arc<dyn Connection>) {
        self.index.leave(room, conn).await;
    }

    async fn leave_all(&self, conn: &Arc<dyn Connection>) {
        self.index.leave_all(conn).await;
    }

    async fn clear(&self, room: &str) {
        self.index.clear(room).await;
        self.bridge.clear(room);
    }

    async fn send(&self, room: &str, event: &str, args: &[JsonValue]) {
        self.index.send(room, event, args).await;
        self.bridge.send(room, event, args);
    }

    async fn send_all(&self, event: &str, args: &[JsonValue]) {
        self.index.send_all(event, args).await;
        self.bridge.send_all(event, args);
    }

    async fn for_each(&self, room: &str, f: EachFn<'_>) {
        self.index.for_each(room, f).await;
    }

    async fn len(&self, room: &str) -> usize {
        self.bridge.room_len(room).await
    }

    async fn rooms(&self, conn: Option<&Arc<dyn Connection>>) -> Vec<String> {
        match conn {
            Some(conn) => self.index.rooms_of(conn).await,
            None => self.bridge.all_rooms().await,
        }
    }

    async fn all_rooms(&self) -> Vec<String> {
        self.bridge.all_rooms().await
    }

    async fn shutdown(&self) {
        self.bridge.shutdown();
    }
}
