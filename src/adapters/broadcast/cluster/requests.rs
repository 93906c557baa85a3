//! Pending-request table for cluster-wide queries.
//!
//! Each `len` / `all_rooms` call registers a record keyed by its fresh
//! request id, carrying the number of peers expected to answer (the bus's
//! request-channel subscriber count at issue time) and a kind-specific
//! accumulator. Responses merge into the record until the expected count is
//! reached, at which point the single-shot completion fires. The issuing
//! side races that signal against a deadline and removes the record either
//! way, so late responses find nothing and are dropped.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use super::envelope::{RequestKind, ResponseEnvelope};
use crate::domain::foundation::RequestId;

/// Kind-specific accumulator for one pending query.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Aggregate {
    /// Running member-count sum across responders.
    Connections(usize),
    /// Union of room names across responders.
    Rooms(HashSet<String>),
}

struct PendingRequest {
    expected: usize,
    received: usize,
    aggregate: Aggregate,
    /// Taken on completion; `None` marks an already-completed record so
    /// extra responses are dropped without re-signalling.
    done: Option<oneshot::Sender<()>>,
}

/// Table of in-flight cluster queries, keyed by request id.
///
/// The table itself is guarded by one mutex (insert/lookup/delete); each
/// record carries its own guard for the merge path.
pub(crate) struct RequestRegistry {
    pending: Mutex<HashMap<RequestId, Arc<Mutex<PendingRequest>>>>,
}

impl RequestRegistry {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register a fresh query expecting `expected` responses.
    ///
    /// Returns the completion signal the caller should race against its
    /// deadline. With zero expected responders (degraded bus) the signal
    /// fires immediately and the empty aggregate stands.
    pub(crate) fn register(
        &self,
        id: RequestId,
        expected: usize,
        aggregate: Aggregate,
    ) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();

        let record = PendingRequest {
            expected,
            received: 0,
            aggregate,
            done: if expected == 0 {
                let _ = tx.send(());
                None
            } else {
                Some(tx)
            },
        };

        self.pending
            .lock()
            .expect("pending request table lock poisoned")
            .insert(id, Arc::new(Mutex::new(record)));

        rx
    }

    /// Merge one peer response into its pending record.
    ///
    /// Unknown ids (stale or foreign), kind mismatches, and responses
    /// arriving after completion are all dropped silently.
    pub(crate) fn absorb(&self, response: &ResponseEnvelope) {
        let record = {
            let pending = self
                .pending
                .lock()
                .expect("pending request table lock poisoned");
            match pending.get(&response.id) {
                Some(record) => Arc::clone(record),
                None => return,
            }
        };

        let mut record = record.lock().expect("pending request record lock poisoned");
        if record.done.is_none() {
            return;
        }

        match (&mut record.aggregate, response.kind) {
            (Aggregate::Connections(total), RequestKind::RoomLen) => {
                *total += response.connections.unwrap_or(0);
            }
            (Aggregate::Rooms(rooms), RequestKind::AllRooms) => {
                if let Some(answer) = &response.rooms {
                    rooms.extend(answer.iter().cloned());
                }
            }
            _ => return,
        }

        record.received += 1;
        if record.received >= record.expected {
            if let Some(done) = record.done.take() {
                let _ = done.send(());
            }
        }
    }

    /// Remove a record and hand back whatever aggregated so far.
    pub(crate) fn remove(&self, id: &RequestId) -> Option<Aggregate> {
        let record = self
            .pending
            .lock()
            .expect("pending request table lock poisoned")
            .remove(id)?;

        let aggregate = match Arc::try_unwrap(record) {
            Ok(record) => {
                record
                    .into_inner()
                    .expect("pending request record lock poisoned")
                    .aggregate
            }
            Err(record) => {
                record
                    .lock()
                    .expect("pending request record lock poisoned")
                    .aggregate
                    .clone()
            }
        };

        Some(aggregate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn completes_after_expected_responses() {
        let registry = RequestRegistry::new();
        let id = RequestId::new();
        let rx = registry.register(id, 2, Aggregate::Connections(0));

        registry.absorb(&ResponseEnvelope::room_len(id, 2));
        registry.absorb(&ResponseEnvelope::room_len(id, 3));

        timeout(Duration::from_millis(100), rx)
            .await
            .expect("completion should fire")
            .unwrap();
        assert_eq!(registry.remove(&id), Some(Aggregate::Connections(5)));
    }

    #[tokio::test]
    async fn does_not_complete_before_expected_count() {
        let registry = RequestRegistry::new();
        let id = RequestId::new();
        let rx = registry.register(id, 2, Aggregate::Connections(0));

        registry.absorb(&ResponseEnvelope::room_len(id, 1));

        assert!(timeout(Duration::from_millis(50), rx).await.is_err());
        // Best-effort aggregate is still available after the deadline.
        assert_eq!(registry.remove(&id), Some(Aggregate::Connections(1)));
    }

    #[tokio::test]
    async fn zero_expected_completes_immediately() {
        let registry = RequestRegistry::new();
        let id = RequestId::new();
        let rx = registry.register(id, 0, Aggregate::Connections(0));

        timeout(Duration::from_millis(50), rx)
            .await
            .expect("completion should fire")
            .unwrap();
        assert_eq!(registry.remove(&id), Some(Aggregate::Connections(0)));
    }

    #[tokio::test]
    async fn unions_room_names_across_responders() {
        let registry = RequestRegistry::new();
        let id = RequestId::new();
        let rx = registry.register(id, 2, Aggregate::Rooms(HashSet::new()));

        registry.absorb(&ResponseEnvelope::all_rooms(
            id,
            vec!["r1".into(), "r2".into()],
        ));
        registry.absorb(&ResponseEnvelope::all_rooms(
            id,
            vec!["r2".into(), "r3".into()],
        ));

        rx.await.unwrap();
        let expected: HashSet<String> = ["r1", "r2", "r3"].iter().map(|s| s.to_string()).collect();
        assert_eq!(registry.remove(&id), Some(Aggregate::Rooms(expected)));
    }

    #[tokio::test]
    async fn unknown_request_id_is_dropped() {
        let registry = RequestRegistry::new();
        registry.absorb(&ResponseEnvelope::room_len(RequestId::new(), 10));
        assert!(registry.remove(&RequestId::new()).is_none());
    }

    #[tokio::test]
    async fn responses_after_completion_are_dropped() {
        let registry = RequestRegistry::new();
        let id = RequestId::new();
        let rx = registry.register(id, 1, Aggregate::Connections(0));

        registry.absorb(&ResponseEnvelope::room_len(id, 4));
        rx.await.unwrap();

        // A straggler after the edge-triggered signal must not change the
        // aggregate.
        registry.absorb(&ResponseEnvelope::room_len(id, 100));
        assert_eq!(registry.remove(&id), Some(Aggregate::Connections(4)));
    }

    #[tokio::test]
    async fn kind_mismatch_is_dropped() {
        let registry = RequestRegistry::new();
        let id = RequestId::new();
        let _rx = registry.register(id, 1, Aggregate::Connections(0));

        registry.absorb(&ResponseEnvelope::all_rooms(id, vec!["r".into()]));

        assert_eq!(registry.remove(&id), Some(Aggregate::Connections(0)));
    }
}
