//! Remote bridge - the node's connection to its peers.
//!
//! Owns the channel naming scheme, the outbound publishes, and the receive
//! loop that demultiplexes inbound frames. Given a configured prefix, the
//! namespace `nsp` and this node's `uid`:
//!
//! - broadcasts go out on `{prefix}#{nsp}#{uid}` and come in via the
//!   pattern `{prefix}#{nsp}#*` (own publishes are dropped by uid);
//! - cluster queries share `{prefix}-request#{nsp}`;
//! - query answers share `{prefix}-response#{nsp}`.
//!
//! Outbound publishes are fire-and-forget: serialization or bus failures
//! are logged at debug and dropped, the local fanout having already been
//! applied by the facade. When the subscription stream ends the loop exits
//! and the bridge is degraded - local operations continue, cluster queries
//! run into their deadline.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tokio::sync::watch;

use super::envelope::{BroadcastEnvelope, RequestEnvelope, RequestKind, ResponseEnvelope};
use super::requests::{Aggregate, RequestRegistry};
use crate::adapters::broadcast::local::RoomIndex;
use crate::adapters::broadcast::AdapterError;
use crate::domain::foundation::{NodeId, RequestId};
use crate::ports::{BusMessage, MessageBus, Subscription};

pub(crate) struct RemoteBridge {
    nsp: String,
    uid: NodeId,
    /// `uid` pre-rendered for channel suffix comparisons in the hot path.
    uid_tag: String,
    bus: Arc<dyn MessageBus>,
    index: Arc<RoomIndex>,
    registry: RequestRegistry,
    publish_channel: String,
    request_channel: String,
    response_channel: String,
    request_timeout: Duration,
    shutdown_tx: watch::Sender<bool>,
}

impl RemoteBridge {
    /// Subscribe to the namespace's channels and start the receive loop.
    ///
    /// Fails only on subscribe errors at startup; everything after is
    /// fire-and-forget or deadline-bounded.
    pub(crate) async fn connect(
        nsp: &str,
        prefix: &str,
        request_timeout: Duration,
        bus: Arc<dyn MessageBus>,
        index: Arc<RoomIndex>,
    ) -> Result<Arc<Self>, AdapterError> {
        let uid = NodeId::new();
        let publish_channel = format!("{prefix}#{nsp}#{uid}");
        let pattern = format!("{prefix}#{nsp}#*");
        let request_channel = format!("{prefix}-request#{nsp}");
        let response_channel = format!("{prefix}-response#{nsp}");

        let subscription = bus
            .subscribe(
                &[request_channel.clone(), response_channel.clone()],
                &[pattern],
            )
            .await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let bridge = Arc::new(Self {
            nsp: nsp.to_string(),
            uid,
            uid_tag: uid.to_string(),
            bus,
            index,
            registry: RequestRegistry::new(),
            publish_channel,
            request_channel,
            response_channel,
            request_timeout,
            shutdown_tx,
        });

        tokio::spawn({
            let bridge = Arc::clone(&bridge);
            async move { bridge.receive_loop(subscription, shutdown_rx).await }
        });

        Ok(bridge)
    }

    /// Node identity, for tests asserting suppression behavior.
    #[cfg(test)]
    pub(crate) fn uid(&self) -> NodeId {
        self.uid
    }

    // === Outbound ===

    /// Forward a room-targeted send to the peers.
    pub(crate) fn send(&self, room: &str, event: &str, args: &[JsonValue]) {
        self.publish_detached(
            self.publish_channel.clone(),
            &BroadcastEnvelope::to_room(room, event, args),
        );
    }

    /// Forward a namespace-wide send to the peers.
    pub(crate) fn send_all(&self, event: &str, args: &[JsonValue]) {
        self.publish_detached(
            self.publish_channel.clone(),
            &BroadcastEnvelope::to_namespace(event, args),
        );
    }

    /// Ask the peers to drop a room. The caller has already cleared the
    /// local index; the originator tag keeps this node from re-applying
    /// its own request.
    pub(crate) fn clear(&self, room: &str) {
        self.publish_detached(
            self.request_channel.clone(),
            &RequestEnvelope::clear_room(RequestId::new(), room, self.uid),
        );
    }

    /// Cluster-wide member count for a room.
    ///
    /// Every request-channel subscriber answers, this node included - the
    /// local count arrives through the response path like any peer's. On a
    /// degraded bus the local count stands alone.
    pub(crate) async fn room_len(&self, room: &str) -> usize {
        let expected = match self.peer_count().await {
            Some(n) if n > 0 => n,
            _ => return self.index.len_room(room).await,
        };

        let id = RequestId::new();
        let rx = self.registry.register(id, expected, Aggregate::Connections(0));

        if !self
            .publish_request(&RequestEnvelope::room_len(id, room))
            .await
        {
            self.registry.remove(&id);
            return self.index.len_room(room).await;
        }

        let _ = tokio::time::timeout(self.request_timeout, rx).await;
        match self.registry.remove(&id) {
            Some(Aggregate::Connections(total)) => total,
            _ => 0,
        }
    }

    /// Union of room names across the cluster.
    pub(crate) async fn all_rooms(&self) -> Vec<String> {
        let expected = match self.peer_count().await {
            Some(n) if n > 0 => n,
            _ => return self.index.all_rooms().await,
        };

        let id = RequestId::new();
        let rx = self
            .registry
            .register(id, expected, Aggregate::Rooms(HashSet::new()));

        if !self.publish_request(&RequestEnvelope::all_rooms(id)).await {
            self.registry.remove(&id);
            return self.index.all_rooms().await;
        }

        let _ = tokio::time::timeout(self.request_timeout, rx).await;
        match self.registry.remove(&id) {
            Some(Aggregate::Rooms(rooms)) => rooms.into_iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Stop the receive loop. The subscription drops with it, releasing
    /// the subscriber connection.
    pub(crate) fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    async fn peer_count(&self) -> Option<usize> {
        match self.bus.num_subscribers(&self.request_channel).await {
            Ok(n) => Some(n),
            Err(err) => {
                tracing::debug!(
                    nsp = %self.nsp,
                    error = %err,
                    "subscriber count unavailable, answering locally"
                );
                None
            }
        }
    }

    async fn publish_request(&self, request: &RequestEnvelope) -> bool {
        let payload = match serde_json::to_vec(request) {
            Ok(payload) => payload,
            Err(_) => return false,
        };
        match self.bus.publish(&self.request_channel, payload).await {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(nsp = %self.nsp, error = %err, "request publish failed");
                false
            }
        }
    }

    fn publish_detached(&self, channel: String, message: &impl Serialize) {
        let payload = match serde_json::to_vec(message) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::debug!(error = %err, "dropping unserializable publish");
                return;
            }
        };

        let bus = Arc::clone(&self.bus);
        tokio::spawn(async move {
            if let Err(err) = bus.publish(&channel, payload).await {
                tracing::debug!(channel = %channel, error = %err, "dropping failed publish");
            }
        });
    }

    // === Inbound ===

    async fn receive_loop(
        self: Arc<Self>,
        mut subscription: Subscription,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::debug!(nsp = %self.nsp, "receive loop stopped");
                        return;
                    }
                }

                frame = subscription.recv() => {
                    match frame {
                        Some(frame) => self.dispatch(frame).await,
                        None => {
                            tracing::warn!(
                                nsp = %self.nsp,
                                "bus subscription ended, cluster queries degraded to their deadline"
                            );
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn dispatch(&self, frame: BusMessage) {
        if frame.channel == self.request_channel {
            self.on_request(&frame.payload).await;
        } else if frame.channel == self.response_channel {
            self.on_response(&frame.payload);
        } else {
            self.on_broadcast(&frame.channel, &frame.payload).await;
        }
    }

    async fn on_broadcast(&self, channel: &str, payload: &[u8]) {
        let mut parts = channel.rsplit('#');
        let (Some(uid), Some(nsp)) = (parts.next(), parts.next()) else {
            tracing::debug!(channel = %channel, "dropping broadcast with unparsable channel");
            return;
        };

        if nsp != self.nsp {
            tracing::debug!(channel = %channel, "dropping misrouted broadcast");
            return;
        }
        if uid == self.uid_tag {
            // Own echo off the pattern subscription.
            return;
        }

        let envelope: BroadcastEnvelope = match serde_json::from_slice(payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::debug!(error = %err, "dropping malformed broadcast");
                return;
            }
        };

        if envelope.room().is_empty() {
            self.index.send_all(envelope.event(), &envelope.args).await;
        } else {
            self.index
                .send(envelope.room(), envelope.event(), &envelope.args)
                .await;
        }
    }

    async fn on_request(&self, payload: &[u8]) {
        let request: RequestEnvelope = match serde_json::from_slice(payload) {
            Ok(request) => request,
            Err(err) => {
                tracing::debug!(error = %err, "dropping malformed request");
                return;
            }
        };

        match request.kind {
            RequestKind::RoomLen => {
                let room = request.room.unwrap_or_default();
                let connections = self.index.len_room(&room).await;
                self.respond(&ResponseEnvelope::room_len(request.id, connections))
                    .await;
            }
            RequestKind::AllRooms => {
                let rooms = self.index.all_rooms().await;
                self.respond(&ResponseEnvelope::all_rooms(request.id, rooms))
                    .await;
            }
            RequestKind::ClearRoom => {
                if request.origin == Some(self.uid) {
                    // Originator already cleared its own index.
                    return;
                }
                if let Some(room) = request.room {
                    self.index.clear(&room).await;
                }
            }
        }
    }

    fn on_response(&self, payload: &[u8]) {
        let response: ResponseEnvelope = match serde_json::from_slice(payload) {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(error = %err, "dropping malformed response");
                return;
            }
        };

        self.registry.absorb(&response);
    }

    async fn respond(&self, response: &ResponseEnvelope) {
        let payload = match serde_json::to_vec(response) {
            Ok(payload) => payload,
            Err(_) => return,
        };
        if let Err(err) = self.bus.publish(&self.response_channel, payload).await {
            tracing::debug!(nsp = %self.nsp, error = %err, "dropping failed response publish");
        }
    }
}
