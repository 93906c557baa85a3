//! Integration tests for the clustered broadcast adapter.
//!
//! Several adapter instances share one in-memory bus, forming a
//! single-process cluster with the same channel naming, envelopes and
//! request/response flow as a Redis deployment. The scenarios cover
//! cross-node fanout, echo suppression, cluster-wide introspection and
//! room clearing.

use serde_json::{json, Value as JsonValue};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use roomcast::adapters::broadcast::ClusterBroadcast;
use roomcast::adapters::bus::InMemoryMessageBus;
use roomcast::config::AdapterConfig;
use roomcast::domain::foundation::ConnectionId;
use roomcast::ports::{Broadcast, Connection, MessageBus};

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Connection double recording every emit.
struct RecordingConnection {
    id: ConnectionId,
    events: Mutex<Vec<(String, Vec<JsonValue>)>>,
}

impl RecordingConnection {
    fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::new(id),
            events: Mutex::new(Vec::new()),
        })
    }

    fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    fn events(&self) -> Vec<(String, Vec<JsonValue>)> {
        self.events.lock().unwrap().clone()
    }
}

impl Connection for RecordingConnection {
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    fn emit(&self, event: &str, args: &[JsonValue]) {
        self.events
            .lock()
            .unwrap()
            .push((event.to_string(), args.to_vec()));
    }
}

fn as_conn(conn: &Arc<RecordingConnection>) -> Arc<dyn Connection> {
    conn.clone()
}

fn config() -> AdapterConfig {
    AdapterConfig {
        request_timeout_secs: 1,
        ..Default::default()
    }
}

async fn node(bus: &Arc<InMemoryMessageBus>, nsp: &str) -> ClusterBroadcast {
    ClusterBroadcast::connect(nsp, &config(), bus.clone() as Arc<dyn MessageBus>)
        .await
        .expect("cluster adapter should connect")
}

/// Give spawned publishes and receive loops time to drain.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test]
async fn single_node_fanout_reaches_all_members() {
    let bus = Arc::new(InMemoryMessageBus::new());
    let node_a = node(&bus, "/").await;

    let c1 = RecordingConnection::new("c1");
    let c2 = RecordingConnection::new("c2");
    node_a.join("r", &as_conn(&c1)).await;
    node_a.join("r", &as_conn(&c2)).await;

    node_a.send("r", "evt", &[json!("hello")]).await;
    settle().await;

    assert_eq!(
        c1.events(),
        vec![("evt".to_string(), vec![json!("hello")])]
    );
    assert_eq!(
        c2.events(),
        vec![("evt".to_string(), vec![json!("hello")])]
    );
    assert_eq!(node_a.len("r").await, 2);
}

#[tokio::test]
async fn own_broadcast_echo_is_suppressed() {
    let bus = Arc::new(InMemoryMessageBus::new());
    let node_a = node(&bus, "/").await;

    let c1 = RecordingConnection::new("c1");
    node_a.join("r", &as_conn(&c1)).await;

    // The node's receive loop sees its own publish via the pattern
    // subscription; the uid tag must stop a second local delivery.
    node_a.send("r", "evt", &[json!("x")]).await;
    settle().await;

    assert_eq!(c1.event_count(), 1);
}

#[tokio::test]
async fn broadcast_crosses_nodes_exactly_once() {
    let bus = Arc::new(InMemoryMessageBus::new());
    let node_a = node(&bus, "/").await;
    let node_b = node(&bus, "/").await;

    let c1 = RecordingConnection::new("c1");
    let c2 = RecordingConnection::new("c2");
    node_a.join("r", &as_conn(&c1)).await;
    node_b.join("r", &as_conn(&c2)).await;

    node_a.send("r", "evt", &[json!("hi")]).await;
    settle().await;

    assert_eq!(c1.events(), vec![("evt".to_string(), vec![json!("hi")])]);
    assert_eq!(c2.events(), vec![("evt".to_string(), vec![json!("hi")])]);
}

#[tokio::test]
async fn namespace_wide_send_crosses_nodes_per_room() {
    let bus = Arc::new(InMemoryMessageBus::new());
    let node_a = node(&bus, "/").await;
    let node_b = node(&bus, "/").await;

    let c1 = RecordingConnection::new("c1");
    let c2 = RecordingConnection::new("c2");
    node_a.join("r1", &as_conn(&c1)).await;
    node_b.join("r1", &as_conn(&c2)).await;
    node_b.join("r2", &as_conn(&c2)).await;

    node_a.send_all("evt", &[]).await;
    settle().await;

    // One delivery per room membership, on both sides of the bus.
    assert_eq!(c1.event_count(), 1);
    assert_eq!(c2.event_count(), 2);
}

#[tokio::test]
async fn len_aggregates_member_counts_across_nodes() {
    let bus = Arc::new(InMemoryMessageBus::new());
    let node_a = node(&bus, "/").await;
    let node_b = node(&bus, "/").await;

    let c1 = RecordingConnection::new("c1");
    let c2 = RecordingConnection::new("c2");
    let c3 = RecordingConnection::new("c3");
    node_a.join("r", &as_conn(&c1)).await;
    node_a.join("r", &as_conn(&c2)).await;
    node_b.join("r", &as_conn(&c3)).await;

    assert_eq!(node_a.len("r").await, 3);
    assert_eq!(node_b.len("r").await, 3);
}

#[tokio::test]
async fn all_rooms_returns_the_union_across_nodes() {
    let bus = Arc::new(InMemoryMessageBus::new());
    let node_a = node(&bus, "/").await;
    let node_b = node(&bus, "/").await;

    let c1 = RecordingConnection::new("c1");
    let c2 = RecordingConnection::new("c2");
    node_a.join("r1", &as_conn(&c1)).await;
    node_a.join("r2", &as_conn(&c1)).await;
    node_b.join("r2", &as_conn(&c2)).await;
    node_b.join("r3", &as_conn(&c2)).await;

    let mut rooms = node_a.all_rooms().await;
    rooms.sort();
    assert_eq!(rooms, vec!["r1", "r2", "r3"]);

    let mut rooms = node_b.rooms(None).await;
    rooms.sort();
    assert_eq!(rooms, vec!["r1", "r2", "r3"]);
}

#[tokio::test]
async fn rooms_of_a_connection_stays_local() {
    let bus = Arc::new(InMemoryMessageBus::new());
    let node_a = node(&bus, "/").await;
    let node_b = node(&bus, "/").await;

    let c1 = RecordingConnection::new("c1");
    let c2 = RecordingConnection::new("c2");
    node_a.join("r1", &as_conn(&c1)).await;
    node_b.join("r2", &as_conn(&c2)).await;

    // Membership of a specific connection is answered from the local
    // index only.
    assert_eq!(node_a.rooms(Some(&as_conn(&c1))).await, vec!["r1"]);
    assert!(node_a.rooms(Some(&as_conn(&c2))).await.is_empty());
}

#[tokio::test]
async fn clear_propagates_to_peers_but_not_back_to_the_originator() {
    let bus = Arc::new(InMemoryMessageBus::new());
    let node_a = node(&bus, "/").await;
    let node_b = node(&bus, "/").await;

    let c1 = RecordingConnection::new("c1");
    let c2 = RecordingConnection::new("c2");
    node_a.join("r", &as_conn(&c1)).await;
    node_b.join("r", &as_conn(&c2)).await;

    node_a.clear("r").await;

    // The originator's index is cleared synchronously.
    assert!(node_a.rooms(Some(&as_conn(&c1))).await.is_empty());

    settle().await;
    assert_eq!(node_b.rooms(Some(&as_conn(&c2))).await, Vec::<String>::new());
    assert_eq!(node_a.len("r").await, 0);

    // A second clear is a no-op everywhere.
    node_a.clear("r").await;
    settle().await;
    assert_eq!(node_a.len("r").await, 0);
    assert!(node_b.all_rooms().await.is_empty());
}

#[tokio::test]
async fn namespaces_are_isolated_on_a_shared_bus() {
    let bus = Arc::new(InMemoryMessageBus::new());
    let chat = node(&bus, "chat").await;
    let game = node(&bus, "game").await;

    let c1 = RecordingConnection::new("c1");
    let c2 = RecordingConnection::new("c2");
    chat.join("r", &as_conn(&c1)).await;
    game.join("arena", &as_conn(&c2)).await;

    chat.send("r", "evt", &[]).await;
    settle().await;

    assert_eq!(c1.event_count(), 1);
    assert_eq!(c2.event_count(), 0);

    // Introspection is scoped to the namespace's own request channel.
    assert_eq!(chat.all_rooms().await, vec!["r"]);
    assert_eq!(game.all_rooms().await, vec!["arena"]);
    assert_eq!(chat.len("arena").await, 0);
}

#[tokio::test]
async fn degraded_bus_falls_back_to_local_answers() {
    let bus = Arc::new(InMemoryMessageBus::new());
    let node_a = node(&bus, "/").await;

    let c1 = RecordingConnection::new("c1");
    node_a.join("r", &as_conn(&c1)).await;

    // Terminate every subscription: the receive loop exits and the
    // request channel loses its subscribers.
    bus.close();
    settle().await;

    // Local operations keep working and introspection answers locally.
    assert_eq!(node_a.len("r").await, 1);
    assert_eq!(node_a.all_rooms().await, vec!["r"]);
    node_a.send("r", "evt", &[]).await;
    settle().await;
    assert_eq!(c1.event_count(), 1);
}

#[tokio::test]
async fn shutdown_detaches_the_node_from_the_cluster() {
    let bus = Arc::new(InMemoryMessageBus::new());
    let node_a = node(&bus, "/").await;
    let node_b = node(&bus, "/").await;

    let c1 = RecordingConnection::new("c1");
    let c2 = RecordingConnection::new("c2");
    node_a.join("r", &as_conn(&c1)).await;
    node_b.join("r", &as_conn(&c2)).await;

    node_b.shutdown().await;
    settle().await;

    node_a.send("r", "evt", &[]).await;
    settle().await;

    assert_eq!(c1.event_count(), 1);
    assert_eq!(c2.event_count(), 0);
}
