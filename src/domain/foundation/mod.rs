//! Foundation module - shared domain primitives.
//!
//! Contains the identifier value objects that form the vocabulary of the
//! broadcast core: connections, nodes, and cluster requests.

mod ids;

pub use ids::{ConnectionId, NodeId, RequestId};
