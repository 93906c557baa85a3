//! Redis-backed message bus for production clusters.
//!
//! Publishing and subscriber-count queries run over a multiplexed
//! connection (cheaply cloned per call); every `subscribe` opens its own
//! dedicated pub/sub connection, since Redis forbids regular commands on a
//! connection in subscriber mode. A pump task forwards frames from the
//! pub/sub stream into the subscription channel; when the connection dies
//! the stream ends and the subscription reports closed.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::mpsc;

use crate::config::AdapterConfig;
use crate::ports::{BusError, BusMessage, MessageBus, Subscription};

/// Message bus over Redis pub/sub.
#[derive(Clone)]
pub struct RedisMessageBus {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl RedisMessageBus {
    /// Dial the bus endpoint from the adapter configuration.
    ///
    /// Fails construction if the endpoint is unreachable, surfacing the
    /// error to the caller rather than degrading silently.
    pub async fn connect(config: &AdapterConfig) -> Result<Self, BusError> {
        let client =
            redis::Client::open(config.url()).map_err(|e| BusError::Connect(e.to_string()))?;

        let conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;

        Ok(Self { client, conn })
    }
}

#[async_trait]
impl MessageBus for RedisMessageBus {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BusError> {
        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(channel, payload)
            .await
            .map_err(|e: redis::RedisError| BusError::Publish(e.to_string()))
    }

    async fn subscribe(
        &self,
        channels: &[String],
        patterns: &[String],
    ) -> Result<Subscription, BusError> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| BusError::Connect(e.to_string()))?;

        for channel in channels {
            pubsub
                .subscribe(channel)
                .await
                .map_err(|e| BusError::Subscribe(e.to_string()))?;
        }
        for pattern in patterns {
            pubsub
                .psubscribe(pattern)
                .await
                .map_err(|e| BusError::Subscribe(e.to_string()))?;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut stream = pubsub.into_on_message();
            while let Some(msg) = stream.next().await {
                let frame = BusMessage {
                    channel: msg.get_channel_name().to_string(),
                    payload: msg.get_payload_bytes().to_vec(),
                };
                if tx.send(frame).is_err() {
                    // Subscription dropped on the consumer side.
                    break;
                }
            }
        });

        Ok(Subscription::new(rx))
    }

    async fn num_subscribers(&self, channel: &str) -> Result<usize, BusError> {
        let mut conn = self.conn.clone();
        let reply: Vec<(String, usize)> = redis::cmd("PUBSUB")
            .arg("NUMSUB")
            .arg(channel)
            .query_async(&mut conn)
            .await
            .map_err(|e: redis::RedisError| BusError::Query(e.to_string()))?;

        Ok(reply.first().map(|(_, count)| *count).unwrap_or(0))
    }
}

impl std::fmt::Debug for RedisMessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisMessageBus").finish_non_exhaustive()
    }
}
