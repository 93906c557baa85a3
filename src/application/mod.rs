//! Application layer - namespace handler registry and server facade.
//!
//! The transport hands decoded packets to a [`Namespace`], which routes
//! them to registered event handlers and exposes the room operations of
//! its broadcast adapter. The [`Server`] owns the namespace map and picks
//! the adapter implementation from configuration.

pub mod namespace;
pub mod server;

pub use namespace::{DispatchError, EventHandler, Namespace};
pub use server::Server;
