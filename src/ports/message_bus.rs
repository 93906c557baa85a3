//! MessageBus port - pub/sub transport between cluster nodes.
//!
//! The cluster broadcast adapter speaks to its peers exclusively through
//! this port: outbound broadcasts and query traffic go out via `publish`,
//! inbound frames arrive on a [`Subscription`] stream. Redis backs the port
//! in production; an in-memory implementation backs the tests.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// One frame delivered to a subscriber.
#[derive(Debug, Clone)]
pub struct BusMessage {
    /// Concrete channel the frame was published on (never the pattern).
    pub channel: String,
    /// Raw payload bytes as published.
    pub payload: Vec<u8>,
}

/// Errors surfaced by message bus implementations.
#[derive(Debug, Error)]
pub enum BusError {
    /// Could not reach the bus endpoint.
    #[error("bus connection failed: {0}")]
    Connect(String),

    /// Subscribing a channel or pattern failed.
    #[error("bus subscribe failed: {0}")]
    Subscribe(String),

    /// Publishing a frame failed.
    #[error("bus publish failed: {0}")]
    Publish(String),

    /// An introspection query (subscriber count) failed.
    #[error("bus query failed: {0}")]
    Query(String),
}

/// Stream of inbound frames for one subscriber connection.
///
/// `recv` yields `None` once the underlying bus connection terminates;
/// the receive loop treats that as a degraded bridge and exits.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<BusMessage>,
}

impl Subscription {
    /// Wrap a receiver produced by a bus adapter.
    pub fn new(rx: mpsc::UnboundedReceiver<BusMessage>) -> Self {
        Self { rx }
    }

    /// Receive the next frame, or `None` when the subscription is closed.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.rx.recv().await
    }
}

/// Port for the cluster's pub/sub transport.
///
/// Implementations must keep publishing and subscribing on independent
/// underlying connections (most pub/sub buses forbid mixing commands on a
/// subscriber connection) and must deliver pattern matches with the
/// concrete channel name.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish a payload on a channel. Delivery is at-most-once and
    /// unordered across publishers.
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BusError>;

    /// Open a dedicated subscriber delivering frames for the given exact
    /// channels and glob patterns.
    async fn subscribe(
        &self,
        channels: &[String],
        patterns: &[String],
    ) -> Result<Subscription, BusError>;

    /// Number of current exact subscribers of a channel (pattern
    /// subscriptions do not count).
    async fn num_subscribers(&self, channel: &str) -> Result<usize, BusError>;
}
