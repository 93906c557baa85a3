//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the broadcast core and the outside world. Adapters implement these ports.
//!
//! ## Transport Port
//!
//! - `Connection` - One connected client, owned by the transport layer
//!
//! ## Broadcast Port
//!
//! - `Broadcast` - Room membership and event fanout for one namespace,
//!   single-node or clustered behind the same contract
//!
//! ## Bus Port
//!
//! - `MessageBus` - Pub/sub transport carrying cross-node broadcasts and
//!   cluster-wide queries

mod broadcast;
mod connection;
mod message_bus;

pub use broadcast::{Broadcast, EachFn};
pub use connection::Connection;
pub use message_bus::{BusError, BusMessage, MessageBus, Subscription};
