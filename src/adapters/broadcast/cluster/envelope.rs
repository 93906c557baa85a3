//! Wire envelopes for cross-node traffic.
//!
//! Three frame families travel over the bus, all JSON:
//!
//! - broadcasts, on a node's own publish channel:
//!   `{"opts":[<room>,<event>],"args":[...]}` with an empty room meaning
//!   the whole namespace;
//! - requests, on the shared request channel, discriminated by the string
//!   `RequestType` ("0" room-len, "1" clear-room, "2" all-rooms);
//! - responses, on the shared response channel, echoing `RequestType` and
//!   `RequestID` plus the kind-specific payload.
//!
//! Field names are the cross-node protocol; peers written against the same
//! bus contract interoperate byte-for-byte.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::domain::foundation::{NodeId, RequestId};

/// Discriminant multiplexing the three request kinds over one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestKind {
    /// Cluster-wide member count for one room.
    #[serde(rename = "0")]
    RoomLen,
    /// Cluster-wide room drop. Fire-and-forget, no response.
    #[serde(rename = "1")]
    ClearRoom,
    /// Union of every room name across the cluster.
    #[serde(rename = "2")]
    AllRooms,
}

/// Event broadcast published on a node's own channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastEnvelope {
    /// `[room, event]`; an empty room targets every room in the namespace.
    pub opts: (String, String),
    /// Event arguments, forwarded verbatim.
    pub args: Vec<JsonValue>,
}

impl BroadcastEnvelope {
    /// Envelope for a room-targeted send.
    pub fn to_room(room: &str, event: &str, args: &[JsonValue]) -> Self {
        Self {
            opts: (room.to_string(), event.to_string()),
            args: args.to_vec(),
        }
    }

    /// Envelope for a namespace-wide send (empty room sentinel).
    pub fn to_namespace(event: &str, args: &[JsonValue]) -> Self {
        Self::to_room("", event, args)
    }

    /// Target room, or `""` for a namespace-wide send.
    pub fn room(&self) -> &str {
        &self.opts.0
    }

    /// Event name.
    pub fn event(&self) -> &str {
        &self.opts.1
    }
}

/// Cluster query published on the shared request channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(rename = "RequestType")]
    pub kind: RequestKind,

    #[serde(rename = "RequestID")]
    pub id: RequestId,

    /// Target room for `RoomLen` and `ClearRoom`.
    #[serde(rename = "Room", skip_serializing_if = "Option::is_none", default)]
    pub room: Option<String>,

    /// Originating node for `ClearRoom`; the originator already cleared its
    /// own index and must not re-apply the request.
    #[serde(rename = "UUID", skip_serializing_if = "Option::is_none", default)]
    pub origin: Option<NodeId>,
}

impl RequestEnvelope {
    /// Room-len query for one room.
    pub fn room_len(id: RequestId, room: &str) -> Self {
        Self {
            kind: RequestKind::RoomLen,
            id,
            room: Some(room.to_string()),
            origin: None,
        }
    }

    /// Clear-room request tagged with its originator.
    pub fn clear_room(id: RequestId, room: &str, origin: NodeId) -> Self {
        Self {
            kind: RequestKind::ClearRoom,
            id,
            room: Some(room.to_string()),
            origin: Some(origin),
        }
    }

    /// All-rooms query.
    pub fn all_rooms(id: RequestId) -> Self {
        Self {
            kind: RequestKind::AllRooms,
            id,
            room: None,
            origin: None,
        }
    }
}

/// Partial answer published on the shared response channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "RequestType")]
    pub kind: RequestKind,

    #[serde(rename = "RequestID")]
    pub id: RequestId,

    /// Local member count, for `RoomLen`.
    #[serde(
        rename = "Connections",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub connections: Option<usize>,

    /// Local room names, for `AllRooms`.
    #[serde(rename = "Rooms", skip_serializing_if = "Option::is_none", default)]
    pub rooms: Option<Vec<String>>,
}

impl ResponseEnvelope {
    /// Answer to a room-len query.
    pub fn room_len(id: RequestId, connections: usize) -> Self {
        Self {
            kind: RequestKind::RoomLen,
            id,
            connections: Some(connections),
            rooms: None,
        }
    }

    /// Answer to an all-rooms query.
    pub fn all_rooms(id: RequestId, rooms: Vec<String>) -> Self {
        Self {
            kind: RequestKind::AllRooms,
            id,
            connections: None,
            rooms: Some(rooms),
        }
    }
}
