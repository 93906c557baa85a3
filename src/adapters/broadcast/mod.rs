//! Broadcast adapters - single-node and clustered fanout.
//!
//! Both adapters implement the [`Broadcast`](crate::ports::Broadcast) port;
//! the namespace layer never knows which one it holds.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!                 │        Namespace layer        │
//!                 └──────────────┬───────────────┘
//!                                │ Broadcast port
//!              ┌─────────────────┴─────────────────┐
//!              ▼                                    ▼
//!    ┌──────────────────┐              ┌─────────────────────────┐
//!    │  LocalBroadcast  │              │    ClusterBroadcast      │
//!    │   RoomIndex      │              │  RoomIndex + RemoteBridge│
//!    └──────────────────┘              │     + request registry   │
//!                                      └───────────┬─────────────┘
//!                                                  │ MessageBus port
//!                                                  ▼
//!                                      Redis (prod) / in-memory (test)
//! ```

pub mod cluster;
pub mod local;

pub use cluster::ClusterBroadcast;
pub use local::{LocalBroadcast, RoomIndex};

use thiserror::Error;

use crate::ports::BusError;

/// Errors surfaced while constructing a broadcast adapter.
///
/// Everything past construction is fire-and-forget: publish failures are
/// logged and dropped, and a dead bus degrades cluster queries to their
/// deadline rather than erroring.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Dialing or subscribing the message bus failed at startup.
    #[error("message bus error: {0}")]
    Bus(#[from] BusError),
}
