//! In-memory message bus for testing.
//!
//! Mirrors the Redis pub/sub semantics the bridge relies on: exact and
//! glob-pattern subscriptions, frames delivered once per matching
//! subscription, unordered across publishers, no backpressure, and a
//! subscriber count that only sees exact subscriptions. Several adapter
//! instances sharing one `InMemoryMessageBus` form a faithful
//! single-process cluster for integration tests.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::ports::{BusError, BusMessage, MessageBus, Subscription};

struct Subscriber {
    channels: HashSet<String>,
    patterns: Vec<String>,
    tx: mpsc::UnboundedSender<BusMessage>,
}

impl Subscriber {
    /// Number of this subscriber's subscriptions the channel matches.
    /// Redis delivers once per matching subscription, so an exact and a
    /// pattern match both count.
    fn deliveries_for(&self, channel: &str) -> usize {
        let exact = usize::from(self.channels.contains(channel));
        let patterns = self
            .patterns
            .iter()
            .filter(|pattern| glob_match(pattern, channel))
            .count();
        exact + patterns
    }
}

/// Process-local pub/sub bus.
pub struct InMemoryMessageBus {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl InMemoryMessageBus {
    /// Creates a new bus with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Terminate every subscription, ending their streams. Receive loops
    /// observe the end-of-stream and degrade, as they would on a dropped
    /// bus connection.
    pub fn close(&self) {
        self.subscribers
            .lock()
            .expect("InMemoryMessageBus: subscribers lock poisoned")
            .clear();
    }
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BusError> {
        // Snapshot the targets so delivery happens outside the lock.
        let targets: Vec<(mpsc::UnboundedSender<BusMessage>, usize)> = {
            let mut subscribers = self
                .subscribers
                .lock()
                .expect("InMemoryMessageBus: subscribers lock poisoned");
            subscribers.retain(|s| !s.tx.is_closed());
            subscribers
                .iter()
                .filter_map(|s| {
                    let count = s.deliveries_for(channel);
                    (count > 0).then(|| (s.tx.clone(), count))
                })
                .collect()
        };

        for (tx, count) in targets {
            for _ in 0..count {
                let _ = tx.send(BusMessage {
                    channel: channel.to_string(),
                    payload: payload.clone(),
                });
            }
        }

        Ok(())
    }

    async fn subscribe(
        &self,
        channels: &[String],
        patterns: &[String],
    ) -> Result<Subscription, BusError> {
        let (tx, rx) = mpsc::unbounded_channel();

        self.subscribers
            .lock()
            .expect("InMemoryMessageBus: subscribers lock poisoned")
            .push(Subscriber {
                channels: channels.iter().cloned().collect(),
                patterns: patterns.to_vec(),
                tx,
            });

        Ok(Subscription::new(rx))
    }

    async fn num_subscribers(&self, channel: &str) -> Result<usize, BusError> {
        let mut subscribers = self
            .subscribers
            .lock()
            .expect("InMemoryMessageBus: subscribers lock poisoned");
        subscribers.retain(|s| !s.tx.is_closed());

        Ok(subscribers
            .iter()
            .filter(|s| s.channels.contains(channel))
            .count())
    }
}

/// Redis-style glob match supporting `*` (any run of characters).
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut segments = pattern.split('*');
    let first = segments.next().unwrap_or("");
    if !text.starts_with(first) {
        return false;
    }

    let mut rest: Vec<&str> = segments.collect();
    if rest.is_empty() {
        // No '*' in the pattern: exact match only.
        return pattern == text;
    }

    let last = rest.pop().unwrap_or("");
    let mut pos = first.len();
    for segment in rest {
        if segment.is_empty() {
            continue;
        }
        match text[pos..].find(segment) {
            Some(found) => pos += found + segment.len(),
            None => return false,
        }
    }

    if last.is_empty() {
        return true;
    }
    text.len() >= pos + last.len() && text.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn recv(sub: &mut Subscription) -> Option<BusMessage> {
        timeout(Duration::from_millis(100), sub.recv())
            .await
            .unwrap_or(None)
    }

    #[tokio::test]
    async fn delivers_to_exact_subscribers() {
        let bus = InMemoryMessageBus::new();
        let mut sub = bus.subscribe(&["ch".to_string()], &[]).await.unwrap();

        bus.publish("ch", b"payload".to_vec()).await.unwrap();

        let msg = recv(&mut sub).await.unwrap();
        assert_eq!(msg.channel, "ch");
        assert_eq!(msg.payload, b"payload");
    }

    #[tokio::test]
    async fn delivers_to_pattern_subscribers_with_concrete_channel() {
        let bus = InMemoryMessageBus::new();
        let mut sub = bus
            .subscribe(&[], &["prefix#nsp#*".to_string()])
            .await
            .unwrap();

        bus.publish("prefix#nsp#node-1", b"x".to_vec()).await.unwrap();

        let msg = recv(&mut sub).await.unwrap();
        assert_eq!(msg.channel, "prefix#nsp#node-1");
    }

    #[tokio::test]
    async fn does_not_deliver_to_unrelated_channels() {
        let bus = InMemoryMessageBus::new();
        let mut sub = bus
            .subscribe(&["ch".to_string()], &["prefix#nsp#*".to_string()])
            .await
            .unwrap();

        bus.publish("other", b"x".to_vec()).await.unwrap();
        bus.publish("prefix#other#node", b"x".to_vec()).await.unwrap();

        assert!(recv(&mut sub).await.is_none());
    }

    #[tokio::test]
    async fn num_subscribers_counts_exact_subscriptions_only() {
        let bus = InMemoryMessageBus::new();
        let _a = bus.subscribe(&["ch".to_string()], &[]).await.unwrap();
        let _b = bus.subscribe(&["ch".to_string()], &[]).await.unwrap();
        let _c = bus.subscribe(&[], &["ch*".to_string()]).await.unwrap();

        assert_eq!(bus.num_subscribers("ch").await.unwrap(), 2);
        assert_eq!(bus.num_subscribers("other").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn dropped_subscribers_stop_counting() {
        let bus = InMemoryMessageBus::new();
        let sub = bus.subscribe(&["ch".to_string()], &[]).await.unwrap();
        assert_eq!(bus.num_subscribers("ch").await.unwrap(), 1);

        drop(sub);
        assert_eq!(bus.num_subscribers("ch").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn close_ends_subscription_streams() {
        let bus = InMemoryMessageBus::new();
        let mut sub = bus.subscribe(&["ch".to_string()], &[]).await.unwrap();

        bus.close();

        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn glob_matches_broadcast_channel_shapes() {
        assert!(glob_match("prefix#nsp#*", "prefix#nsp#abc"));
        assert!(glob_match("prefix#nsp#*", "prefix#nsp#"));
        assert!(glob_match("prefix#nsp#*", "prefix#nsp#a#b"));
        assert!(!glob_match("prefix#nsp#*", "prefix#other#abc"));
        assert!(!glob_match("prefix#nsp#*", "prefix#nsp"));
        assert!(glob_match("a*c", "abc"));
        assert!(glob_match("a*c", "ac"));
        assert!(!glob_match("a*c", "abd"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
    }
}
