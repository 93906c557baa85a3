//! Local room index and the single-node broadcast adapter.
//!
//! The index is an in-memory map of room name → members, where a member is
//! a weak handle to a transport-owned connection. Holding weak handles keeps
//! the adapter from extending a connection's life; the transport calls
//! `leave_all` on close so stale ids drain promptly.
//!
//! # Thread Safety
//!
//! A `RwLock` guards the room table since fanouts (reads) vastly outnumber
//! joins and leaves (writes). Every iteration snapshots the membership under
//! the read guard and emits after releasing it, so concurrent mutation never
//! breaks a walk and `for_each` never observes a half-applied join or leave.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::RwLock;

use crate::domain::foundation::ConnectionId;
use crate::ports::{Broadcast, Connection, EachFn};

type Members = HashMap<ConnectionId, Weak<dyn Connection>>;

/// In-memory map of room name → connection membership for one namespace.
///
/// Invariants:
/// - a room is present iff its member map is non-empty (`clear` and the
///   last `leave` both drop the entry);
/// - a connection id appears at most once per room (`join` is idempotent).
pub struct RoomIndex {
    rooms: RwLock<HashMap<String, Members>>,
}

impl RoomIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    /// Add a connection to a room, creating the room if absent.
    pub async fn join(&self, room: &str, conn: &Arc<dyn Connection>) {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room.to_string())
            .or_default()
            .insert(conn.id().clone(), Arc::downgrade(conn));
    }

    /// Remove a connection from a room; drops the room when it empties.
    pub async fn leave(&self, room: &str, conn: &Arc<dyn Connection>) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(room) {
            members.remove(conn.id());
            if members.is_empty() {
                rooms.remove(room);
            }
        }
    }

    /// Remove a connection from every room it is in.
    pub async fn leave_all(&self, conn: &Arc<dyn Connection>) {
        let mut rooms = self.rooms.write().await;
        rooms.retain(|_, members| {
            members.remove(conn.id());
            !members.is_empty()
        });
    }

    /// Drop a room outright.
    pub async fn clear(&self, room: &str) {
        self.rooms.write().await.remove(room);
    }

    /// Snapshot of the live members of a room.
    ///
    /// Weak handles whose connection has already been dropped are skipped;
    /// their ids remain in the index until the transport's `leave_all`.
    pub async fn members(&self, room: &str) -> Vec<Arc<dyn Connection>> {
        let snapshot: Vec<Weak<dyn Connection>> = {
            let rooms = self.rooms.read().await;
            match rooms.get(room) {
                Some(members) => members.values().cloned().collect(),
                None => return Vec::new(),
            }
        };

        snapshot.iter().filter_map(Weak::upgrade).collect()
    }

    /// Emit an event to every member of a room.
    pub async fn send(&self, room: &str, event: &str, args: &[JsonValue]) {
        for conn in self.members(room).await {
            conn.emit(event, args);
        }
    }

    /// Emit an event to every room. A connection in k rooms receives the
    /// event k times - rooms are independent fanout sets.
    pub async fn send_all(&self, event: &str, args: &[JsonValue]) {
        let snapshot: Vec<Vec<Weak<dyn Connection>>> = {
            let rooms = self.rooms.read().await;
            rooms
                .values()
                .map(|members| members.values().cloned().collect())
                .collect()
        };

        for members in snapshot {
            for conn in members.iter().filter_map(Weak::upgrade) {
                conn.emit(event, args);
            }
        }
    }

    /// Invoke `f` for each live member of a room, over a snapshot.
    pub async fn for_each(&self, room: &str, f: EachFn<'_>) {
        for conn in self.members(room).await {
            f(&conn);
        }
    }

    /// Names of every current room.
    pub async fn all_rooms(&self) -> Vec<String> {
        self.rooms.read().await.keys().cloned().collect()
    }

    /// Number of connections in a room, or 0 for an absent room.
    pub async fn len_room(&self, room: &str) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(room).map(|members| members.len()).unwrap_or(0)
    }

    /// Every room containing the given connection. Linear in total
    /// membership.
    pub async fn rooms_of(&self, conn: &Arc<dyn Connection>) -> Vec<String> {
        let rooms = self.rooms.read().await;
        rooms
            .iter()
            .filter(|(_, members)| members.contains_key(conn.id()))
            .map(|(room, _)| room.clone())
            .collect()
    }
}

impl Default for RoomIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Single-node broadcast adapter: the room index with nothing behind it.
///
/// Selected when no bus is configured. `len` and `all_rooms` answer from
/// local state directly; `clear`, `send` and `send_all` have no cross-node
/// side.
pub struct LocalBroadcast {
    index: RoomIndex,
}

impl LocalBroadcast {
    /// Create a local-only adapter with an empty index.
    pub fn new() -> Self {
        Self {
            index: RoomIndex::new(),
        }
    }
}

impl Default for LocalBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broadcast for LocalBroadcast {
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
    }

    async fn send(&self, room: &str, event: &str, args: &[JsonValue]) {
        self.index.send(room, event, args).await;
    }

    async fn send_all(&self, event: &str, args: &[JsonValue]) {
        self.index.send_all(event, args).await;
    }

    async fn for_each(&self, room: &str, f: EachFn<'_>) {
        self.index.for_each(room, f).await;
    }

    async fn len(&self, room: &str) -> usize {
        self.index.len_room(room).await
    }

    async fn rooms(&self, conn: Option<&Arc<dyn Connection>>) -> Vec<String> {
        match conn {
            Some(conn) => self.index.rooms_of(conn).await,
            None => self.index.all_rooms().await,
        }
    }

    async fn all_rooms(&self) -> Vec<String> {
        self.index.all_rooms().await
    }

    async fn shutdown(&self) {}
}
