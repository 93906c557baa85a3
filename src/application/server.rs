//! Server - owns the namespace map and the adapter factory.
//!
//! One server process holds one [`Namespace`] per namespace name,
//! constructed on first use. Whether a namespace broadcasts single-node or
//! cluster-wide is decided here, from configuration: an adapter section
//! selects the clustered implementation over the shared bus, its absence
//! selects the local-only one.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use super::namespace::Namespace;
use crate::adapters::broadcast::{AdapterError, ClusterBroadcast, LocalBroadcast};
use crate::adapters::bus::RedisMessageBus;
use crate::config::{AdapterConfig, AppConfig};
use crate::ports::{Broadcast, Connection, EachFn, MessageBus};

/// The root namespace is the empty string; `/` is its conventional alias
/// on the wire.
const ROOT_NAMESPACE: &str = "";
const ROOT_NAMESPACE_ALIAS: &str = "/";

/// Event server facade: namespace registry plus adapter selection.
pub struct Server {
    namespaces: RwLock<HashMap<String, Arc<Namespace>>>,
    adapter: Option<AdapterConfig>,
    bus: Option<Arc<dyn MessageBus>>,
}

impl Server {
    /// Single-node server: every namespace gets the local-only adapter.
    pub fn new() -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
            adapter: None,
            bus: None,
        }
    }

    /// Build a server from configuration, dialing the bus when an adapter
    /// section is present. Bus dial failures fail construction.
    pub async fn from_config(config: &AppConfig) -> Result<Self, AdapterError> {
        match &config.adapter {
            Some(adapter) => {
                let bus = RedisMessageBus::connect(adapter).await?;
                Ok(Self::with_bus(adapter.clone(), Arc::new(bus)))
            }
            None => Ok(Self::new()),
        }
    }

    /// Clustered server over a caller-provided bus. Lets tests and
    /// embedded deployments substitute the in-memory bus.
    pub fn with_bus(adapter: AdapterConfig, bus: Arc<dyn MessageBus>) -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
            adapter: Some(adapter),
            bus: Some(bus),
        }
    }

    fn resolve(name: &str) -> &str {
        if name == ROOT_NAMESPACE_ALIAS {
            ROOT_NAMESPACE
        } else {
            name
        }
    }

    /// Get or create a namespace.
    ///
    /// Creation subscribes the namespace's bridge when running clustered,
    /// which is the only fallible step.
    pub async fn namespace(&self, name: &str) -> Result<Arc<Namespace>, AdapterError> {
        let name = Self::resolve(name);

        if let Some(nsp) = self.namespaces.read().await.get(name) {
            return Ok(Arc::clone(nsp));
        }

        let mut namespaces = self.namespaces.write().await;
        if let Some(nsp) = namespaces.get(name) {
            return Ok(Arc::clone(nsp));
        }

        let broadcast: Arc<dyn Broadcast> = match (&self.adapter, &self.bus) {
            (Some(config), Some(bus)) => {
                Arc::new(ClusterBroadcast::connect(name, config, Arc::clone(bus)).await?)
            }
            _ => Arc::new(LocalBroadcast::new()),
        };

        let nsp = Arc::new(Namespace::new(name, broadcast));
        namespaces.insert(name.to_string(), Arc::clone(&nsp));
        Ok(nsp)
    }

    /// Shut down every namespace adapter, releasing bus subscriptions and
    /// stopping receive loops.
    pub async fn shutdown(&self) {
        let namespaces = self.namespaces.read().await;
        for nsp in namespaces.values() {
            nsp.broadcast().shutdown().await;
        }
    }

    // === Room operation pass-throughs ===

    /// Join a connection to a room in a namespace.
    pub async fn join_room(
        &self,
        nsp: &str,
        room: &str,
        conn: &Arc<dyn Connection>,
    ) -> Result<(), AdapterError> {
        self.namespace(nsp).await?.join(room, conn).await;
        Ok(())
    }

    /// Remove a connection from a room in a namespace.
    pub async fn leave_room(
        &self,
        nsp: &str,
        room: &str,
        conn: &Arc<dyn Connection>,
    ) -> Result<(), AdapterError> {
        self.namespace(nsp).await?.leave(room, conn).await;
        Ok(())
    }

    /// Remove a connection from every room in a namespace.
    pub async fn leave_all_rooms(
        &self,
        nsp: &str,
        conn: &Arc<dyn Connection>,
    ) -> Result<(), AdapterError> {
        self.namespace(nsp).await?.leave_all(conn).await;
        Ok(())
    }

    /// Drop a room, cluster-wide.
    pub async fn clear_room(&self, nsp: &str, room: &str) -> Result<(), AdapterError> {
        self.namespace(nsp).await?.clear(room).await;
        Ok(())
    }

    /// Broadcast an event to a room, cluster-wide.
    pub async fn broadcast_to_room(
        &self,
        nsp: &str,
        room: &str,
        event: &str,
        args: &[JsonValue],
    ) -> Result<(), AdapterError> {
        self.namespace(nsp).await?.send(room, event, args).await;
        Ok(())
    }

    /// Broadcast an event to every room of a namespace, cluster-wide.
    pub async fn broadcast_to_namespace(
        &self,
        nsp: &str,
        event: &str,
        args: &[JsonValue],
    ) -> Result<(), AdapterError> {
        self.namespace(nsp).await?.send_all(event, args).await;
        Ok(())
    }

    /// Number of connections in a room across the cluster.
    pub async fn room_len(&self, nsp: &str, room: &str) -> Result<usize, AdapterError> {
        Ok(self.namespace(nsp).await?.len(room).await)
    }

    /// Every room of a namespace across the cluster.
    pub async fn rooms(&self, nsp: &str) -> Result<Vec<String>, AdapterError> {
        Ok(self.namespace(nsp).await?.rooms(None).await)
    }

    /// Invoke `f` for each local member of a room.
    pub async fn for_each(
        &self,
        nsp: &str,
        room: &str,
        f: EachFn<'_>,
    ) -> Result<(), AdapterError> {
        self.namespace(nsp).await?.for_each(room, f).await;
        Ok(())
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}
