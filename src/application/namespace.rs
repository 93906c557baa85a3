//! Namespace - event routing and room operations for one logical partition.
//!
//! Handlers are registered per event name with their argument shape fixed
//! at registration: [`Namespace::on_event`] captures a typed closure and
//! installs the decoder for its argument tuple, so dispatch is a map
//! lookup plus one `serde_json` decode - no reflection at call time.
//!
//! Two namespaces share nothing: rooms, bus channels and coordinator state
//! are all scoped to the namespace via its broadcast adapter.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use thiserror::Error;

use crate::ports::{Broadcast, Connection, EachFn};

/// Errors raised while routing an inbound event.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// The wire arguments did not decode into the handler's tuple shape.
    #[error("invalid arguments for event '{event}': {reason}")]
    InvalidArguments { event: String, reason: String },

    /// The handler itself reported a failure.
    #[error("handler for event '{event}' failed: {reason}")]
    HandlerFailed { event: String, reason: String },
}

/// Handler for one named event.
///
/// Most callers register typed closures through [`Namespace::on_event`];
/// implementing this trait directly is the escape hatch for handlers that
/// want the raw argument array.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Process an event from a connection. The returned values are the
    /// acknowledgement arguments (empty for no ack).
    async fn handle(
        &self,
        conn: Arc<dyn Connection>,
        args: Vec<JsonValue>,
    ) -> Result<Vec<JsonValue>, DispatchError>;

    /// Handler name for logging.
    fn name(&self) -> &'static str;
}

type HandlerFn<A> = Box<
    dyn Fn(Arc<dyn Connection>, A) -> BoxFuture<'static, Result<Vec<JsonValue>, DispatchError>>
        + Send
        + Sync,
>;

/// Adapter from a typed closure to [`EventHandler`]: decodes the wire
/// argument array into `A` before invoking the closure.
struct TypedHandler<A> {
    event: String,
    invoke: HandlerFn<A>,
}

#[async_trait]
impl<A> EventHandler for TypedHandler<A>
where
    A: DeserializeOwned + Send + 'static,
{
    async fn handle(
        &self,
        conn: Arc<dyn Connection>,
        args: Vec<JsonValue>,
    ) -> Result<Vec<JsonValue>, DispatchError> {
        let decoded: A = serde_json::from_value(JsonValue::Array(args)).map_err(|e| {
            DispatchError::InvalidArguments {
                event: self.event.clone(),
                reason: e.to_string(),
            }
        })?;

        (self.invoke)(conn, decoded).await
    }

    fn name(&self) -> &'static str {
        "TypedHandler"
    }
}

type ConnectCallback =
    Arc<dyn Fn(Arc<dyn Connection>) -> BoxFuture<'static, Result<(), DispatchError>> + Send + Sync>;
type DisconnectCallback =
    Arc<dyn Fn(Arc<dyn Connection>, String) -> BoxFuture<'static, ()> + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(Option<Arc<dyn Connection>>, &DispatchError) + Send + Sync>;

/// One namespace: its event handlers, lifecycle callbacks, and broadcast
/// adapter.
pub struct Namespace {
    name: String,
    broadcast: Arc<dyn Broadcast>,
    handlers: RwLock<HashMap<String, Arc<dyn EventHandler>>>,
    on_connect: RwLock<Option<ConnectCallback>>,
    on_disconnect: RwLock<Option<DisconnectCallback>>,
    on_error: RwLock<Option<ErrorCallback>>,
}

impl Namespace {
    /// Create a namespace over the given broadcast adapter.
    pub fn new(name: impl Into<String>, broadcast: Arc<dyn Broadcast>) -> Self {
        Self {
            name: name.into(),
            broadcast,
            handlers: RwLock::new(HashMap::new()),
            on_connect: RwLock::new(None),
            on_disconnect: RwLock::new(None),
            on_error: RwLock::new(None),
        }
    }

    /// Namespace name (`""` for the root namespace).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The namespace's broadcast adapter.
    pub fn broadcast(&self) -> &Arc<dyn Broadcast> {
        &self.broadcast
    }

    // === Handler registration ===

    /// Register a raw handler for an event name. Replaces any previous
    /// handler for that event.
    pub fn register(&self, event: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .expect("Namespace: handlers lock poisoned")
            .insert(event.into(), handler);
    }

    /// Register a typed handler: `A` is the argument tuple decoded from
    /// the wire array, fixed here once instead of per dispatch.
    ///
    /// # Example
    ///
    /// ```ignore
    /// nsp.on_event("chat.message", |conn, (room, text): (String, String)| async move {
    ///     // ...
    ///     Ok(Vec::new())
    /// });
    /// ```
    pub fn on_event<A, F, Fut>(&self, event: impl Into<String>, handler: F)
    where
        A: DeserializeOwned + Send + 'static,
        F: Fn(Arc<dyn Connection>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<JsonValue>, DispatchError>> + Send + 'static,
    {
        let event = event.into();
        let typed = TypedHandler {
            event: event.clone(),
            invoke: Box::new(move |conn, args| Box::pin(handler(conn, args))),
        };
        self.register(event, Arc::new(typed));
    }

    /// Set the connect callback, invoked when a connection enters the
    /// namespace. Returning an error rejects the connection.
    pub fn on_connect<F, Fut>(&self, callback: F)
    where
        F: Fn(Arc<dyn Connection>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DispatchError>> + Send + 'static,
    {
        *self
            .on_connect
            .write()
            .expect("Namespace: on_connect lock poisoned") =
            Some(Arc::new(move |conn| Box::pin(callback(conn))));
    }

    /// Set the disconnect callback, invoked after the connection has been
    /// drained from every room.
    pub fn on_disconnect<F, Fut>(&self, callback: F)
    where
        F: Fn(Arc<dyn Connection>, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        *self
            .on_disconnect
            .write()
            .expect("Namespace: on_disconnect lock poisoned") =
            Some(Arc::new(move |conn, reason| Box::pin(callback(conn, reason))));
    }

    /// Set the error callback, invoked for dispatch failures.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(Option<Arc<dyn Connection>>, &DispatchError) + Send + Sync + 'static,
    {
        *self
            .on_error
            .write()
            .expect("Namespace: on_error lock poisoned") = Some(Arc::new(callback));
    }

    // === Packet entry points (called by the transport) ===

    /// A connection entered the namespace.
    pub async fn handle_connect(&self, conn: Arc<dyn Connection>) -> Result<(), DispatchError> {
        let callback = self
            .on_connect
            .read()
            .expect("Namespace: on_connect lock poisoned")
            .clone();

        match callback {
            Some(callback) => callback(conn).await,
            None => Ok(()),
        }
    }

    /// A connection left the namespace. Drains its room membership before
    /// invoking the callback so stale ids never linger in the index.
    pub async fn handle_disconnect(&self, conn: Arc<dyn Connection>, reason: impl Into<String>) {
        self.broadcast.leave_all(&conn).await;

        let callback = self
            .on_disconnect
            .read()
            .expect("Namespace: on_disconnect lock poisoned")
            .clone();

        if let Some(callback) = callback {
            callback(conn, reason.into()).await;
        }
    }

    /// Route an event to its handler and return the acknowledgement
    /// arguments. Events without a registered handler are ignored.
    pub async fn dispatch_event(
        &self,
        conn: Arc<dyn Connection>,
        event: &str,
        args: Vec<JsonValue>,
    ) -> Result<Vec<JsonValue>, DispatchError> {
        let handler = self
            .handlers
            .read()
            .expect("Namespace: handlers lock poisoned")
            .get(event)
            .cloned();

        let Some(handler) = handler else {
            tracing::debug!(nsp = %self.name, event = %event, "no handler registered, ignoring event");
            return Ok(Vec::new());
        };

        match handler.handle(Arc::clone(&conn), args).await {
            Ok(ack) => Ok(ack),
            Err(err) => {
                self.handle_error(Some(conn), &err);
                Err(err)
            }
        }
    }

    /// Report a dispatch failure to the error callback, if set.
    pub fn handle_error(&self, conn: Option<Arc<dyn Connection>>, err: &DispatchError) {
        let callback = self
            .on_error
            .read()
            .expect("Namespace: on_error lock poisoned")
            .clone();

        if let Some(callback) = callback {
            callback(conn, err);
        }
    }

    // === Room operations ===

    /// Add a connection to a room.
    pub async fn join(&self, room: &str, conn: &Arc<dyn Connection>) {
        self.broadcast.join(room, conn).await;
    }

    /// Remove a connection from a room.
    pub async fn leave(&self, room: &str, conn: &Arc<dyn Connection>) {
        self.broadcast.leave(room, conn).await;
    }

    /// Remove a connection from every room.
    pub async fn leave_all(&self, conn: &Arc<dyn Connection>) {
        self.broadcast.leave_all(conn).await;
    }

    /// Drop a room, cluster-wide.
    pub async fn clear(&self, room: &str) {
        self.broadcast.clear(room).await;
    }

    /// Emit an event to every member of a room, cluster-wide.
    pub async fn send(&self, room: &str, event: &str, args: &[JsonValue]) {
        self.broadcast.send(room, event, args).await;
    }

    /// Emit an event to every room in the namespace, cluster-wide.
    pub async fn send_all(&self, event: &str, args: &[JsonValue]) {
        self.broadcast.send_all(event, args).await;
    }

    /// Invoke `f` for each local member of a room.
    pub async fn for_each(&self, room: &str, f: EachFn<'_>) {
        self.broadcast.for_each(room, f).await;
    }

    /// Number of connections in a room across the cluster.
    pub async fn len(&self, room: &str) -> usize {
        self.broadcast.len(room).await
    }

    /// All rooms, or the rooms of one connection.
    pub async fn rooms(&self, conn: Option<&Arc<dyn Connection>>) -> Vec<String> {
        self.broadcast.rooms(conn).await
    }

    /// Every room in the namespace across the cluster.
    pub async fn all_rooms(&self) -> Vec<String> {
        self.broadcast.all_rooms().await
    }
}
