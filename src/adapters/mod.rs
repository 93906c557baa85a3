//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the broadcast core to external systems:
//! - `broadcast` - Broadcast port implementations (local-only, clustered)
//! - `bus` - Message bus implementations (Redis, in-memory)

pub mod broadcast;
pub mod bus;

pub use broadcast::{AdapterError, ClusterBroadcast, LocalBroadcast, RoomIndex};
pub use bus::{InMemoryMessageBus, RedisMessageBus};
