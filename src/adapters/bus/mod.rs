//! Message bus adapters.
//!
//! - `redis` - production bus over Redis pub/sub
//! - `in_memory` - process-local bus for tests and single-process clusters

pub mod in_memory;
pub mod redis;

pub use in_memory::InMemoryMessageBus;
pub use redis::RedisMessageBus;
