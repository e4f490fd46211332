use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use frameport_core::{
    DEFAULT_REQUEST_TIMEOUT, Envelope, EventMessage, FrameportError, Namespace, OriginPolicy,
    RequestMessage, ResponseMessage, Result, Transport, Window, WindowHandle, WindowId,
    WindowTransport, WireMessage, namespace_of,
};

use crate::correlator::{self, Correlator};
use crate::events::{EventListenerSet, Listener, ListenerId, invoke_listeners};
use crate::registry::{PluginRegistration, PluginRegistry};
use crate::router::{self, Handler, Route};

/// Which side of the frame boundary an endpoint sits on.
#[derive(Debug, Clone)]
pub enum Role {
    /// The top-level document. Routes requests between plugins and fans
    /// events out to them.
    Host { allowed_origins: Vec<String> },
    /// A sandboxed frame. Serves requests in its own namespace and talks only
    /// to its parent.
    Plugin {
        namespace: Namespace,
        parent: WindowHandle,
        parent_origin: String,
    },
}

impl Role {
    fn origin_policy(&self) -> OriginPolicy {
        match self {
            Role::Host { allowed_origins } => OriginPolicy::AllowList(allowed_origins.clone()),
            Role::Plugin { parent_origin, .. } => OriginPolicy::Exact(parent_origin.clone()),
        }
    }

    /// Log label: `host` or `plugin:<namespace>`.
    pub fn label(&self) -> String {
        match self {
            Role::Host { .. } => "host".to_string(),
            Role::Plugin { namespace, .. } => format!("plugin:{namespace}"),
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, Role::Host { .. })
    }
}

#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// How long `request` waits for a response. Also bounds each forwarding
    /// hop on the host.
    pub request_timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// One side of the host/plugin messaging protocol.
///
/// Owns its transport and a dispatch task that handles one inbound message at
/// a time. Request handlers and host forwarding run on their own tasks, so the
/// dispatch loop keeps settling responses while a handler is waiting.
///
/// Must be created inside a Tokio runtime.
pub struct Endpoint {
    inner: Arc<Inner>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    role: Role,
    label: String,
    policy: OriginPolicy,
    transport: Arc<dyn Transport>,
    handlers: RwLock<HashMap<String, Handler>>,
    listeners: Mutex<EventListenerSet>,
    correlator: Arc<Correlator>,
    registry: PluginRegistry,
}

impl Endpoint {
    /// Create a host endpoint for `window`, accepting messages from `allowed_origins`.
    pub fn host(window: Window, allowed_origins: Vec<String>, config: EndpointConfig) -> Result<Self> {
        Self::with_transport(
            Role::Host { allowed_origins },
            Arc::new(WindowTransport::new(window)),
            config,
        )
    }

    /// Create a plugin endpoint for `window`, serving `namespace` and talking to `parent`.
    pub fn plugin(
        window: Window,
        namespace: impl Into<Namespace>,
        parent: WindowHandle,
        parent_origin: impl Into<String>,
        config: EndpointConfig,
    ) -> Result<Self> {
        Self::with_transport(
            Role::Plugin {
                namespace: namespace.into(),
                parent,
                parent_origin: parent_origin.into(),
            },
            Arc::new(WindowTransport::new(window)),
            config,
        )
    }

    /// Create an endpoint over any transport. Opens the transport and starts
    /// the dispatch task.
    pub fn with_transport(role: Role, transport: Arc<dyn Transport>, config: EndpointConfig) -> Result<Self> {
        let inbox = transport.open()?;
        let label = role.label();
        let inner = Arc::new(Inner {
            policy: role.origin_policy(),
            label,
            role,
            transport,
            handlers: RwLock::new(HashMap::new()),
            listeners: Mutex::new(EventListenerSet::new()),
            correlator: Correlator::new(config.request_timeout),
            registry: PluginRegistry::new(),
        });

        let dispatcher = tokio::spawn(Arc::clone(&inner).run(inbox));
        info!(
            endpoint = %inner.label,
            window = %inner.transport.local().id(),
            timeout_ms = correlator::millis(config.request_timeout),
            "endpoint started"
        );

        Ok(Self {
            inner,
            dispatcher: Mutex::new(Some(dispatcher)),
        })
    }

    pub fn role(&self) -> &Role {
        &self.inner.role
    }

    /// Handle of the window this endpoint speaks for.
    pub fn local_window(&self) -> WindowHandle {
        self.inner.transport.local().clone()
    }

    /// Register a responder. Plugins key by bare action, the host by full
    /// request type. Replaces any handler already registered under `key`.
    ///
    /// The serialised result is always sent as `payload`, so `Ok(())` and
    /// `Ok(None)` arrive as `null`. Use [`handle_void`](Self::handle_void)
    /// for a response without one.
    pub fn handle<F, Fut, R>(&self, key: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<R>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let handler: Handler =
            Arc::new(move |payload| -> BoxFuture<'static, anyhow::Result<Option<Value>>> {
                let fut = handler(payload);
                Box::pin(async move {
                    let value = fut.await?;
                    Ok(Some(serde_json::to_value(value)?))
                })
            });
        self.insert_handler(key.into(), handler);
    }

    /// Register a responder whose success carries no payload at all.
    pub fn handle_void<F, Fut>(&self, key: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler: Handler =
            Arc::new(move |payload| -> BoxFuture<'static, anyhow::Result<Option<Value>>> {
                let fut = handler(payload);
                Box::pin(async move {
                    fut.await?;
                    Ok(None)
                })
            });
        self.insert_handler(key.into(), handler);
    }

    fn insert_handler(&self, key: String, handler: Handler) {
        if self.inner.handlers.write().insert(key.clone(), handler).is_some() {
            debug!(endpoint = %self.inner.label, key = %key, "handler replaced");
        }
    }

    /// Send a request and wait for its response or the timeout.
    ///
    /// A plugin sends to its parent. The host sends to the plugin registered
    /// under the request type's namespace and fails with `NoRoute` when there
    /// is none.
    pub async fn request(&self, request_type: &str, payload: Option<Value>) -> Result<Option<Value>> {
        if !self.inner.transport.is_open() {
            return Err(FrameportError::EndpointClosed);
        }
        let (target, origin) = match &self.inner.role {
            Role::Plugin {
                parent,
                parent_origin,
                ..
            } => (parent.clone(), parent_origin.clone()),
            Role::Host { .. } => {
                let namespace = namespace_of(request_type);
                let registration =
                    self.inner
                        .registry
                        .get(namespace)
                        .ok_or_else(|| FrameportError::NoRoute {
                            namespace: namespace.to_string(),
                        })?;
                (registration.window, registration.origin)
            }
        };
        self.inner
            .send_request(&target, &origin, request_type, payload)
            .await
    }

    /// Fire-and-forget event. A plugin sends it to its parent; the host
    /// broadcasts it to every registered plugin.
    pub fn emit(&self, event_type: &str, payload: Option<Value>) {
        if !self.inner.transport.is_open() {
            debug!(endpoint = %self.inner.label, event_type, "emit after destroy ignored");
            return;
        }
        match &self.inner.role {
            Role::Plugin {
                namespace,
                parent,
                parent_origin,
            } => {
                let event = EventMessage::new(event_type, payload).with_namespace(namespace.clone());
                if let Err(e) = self.inner.transport.post(parent, &event.into(), parent_origin) {
                    warn!(endpoint = %self.inner.label, event_type, error = %e, "failed to emit event");
                }
            }
            Role::Host { .. } => {
                self.inner
                    .broadcast(EventMessage::new(event_type, payload), None);
            }
        }
    }

    /// Listen for events named `event_type`. Listeners run in registration order.
    pub fn on<F>(&self, event_type: &str, listener: F) -> ListenerId
    where
        F: Fn(Option<&Value>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        self.inner.listeners.lock().on(event_type, listener)
    }

    pub fn off(&self, event_type: &str, id: ListenerId) -> bool {
        self.inner.listeners.lock().off(event_type, id)
    }

    /// Register a plugin frame under `namespace` (host only). A later
    /// registration of the same namespace replaces this one.
    pub fn register_plugin(
        &self,
        namespace: impl Into<Namespace>,
        window: WindowHandle,
        origin: impl Into<String>,
    ) -> Result<RegisteredPluginContext> {
        let Role::Host { allowed_origins } = &self.inner.role else {
            return Err(FrameportError::NotHost);
        };
        let namespace = namespace.into();
        let origin = origin.into();

        if !allowed_origins.contains(&origin) {
            warn!(namespace = %namespace, origin = %origin, "plugin origin is not in allowed_origins");
        }

        let registration = PluginRegistration {
            window: window.clone(),
            origin: origin.clone(),
        };
        if let Some(previous) = self.inner.registry.register(namespace.clone(), registration) {
            debug!(
                namespace = %namespace,
                previous = %previous.window.id(),
                "replacing existing plugin registration"
            );
        }
        info!(namespace = %namespace, origin = %origin, window = %window.id(), "registered plugin");

        Ok(RegisteredPluginContext {
            namespace,
            window,
            origin,
            transport: Arc::clone(&self.inner.transport),
        })
    }

    /// Namespaces of registered plugins, sorted. Empty on a plugin endpoint.
    pub fn registered_plugins(&self) -> Vec<Namespace> {
        self.inner.registry.namespaces()
    }

    /// Number of requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.len()
    }

    pub fn is_destroyed(&self) -> bool {
        !self.inner.transport.is_open()
    }

    /// Stop observing messages and close the transport.
    ///
    /// Requests already in flight are not rejected; they run into their
    /// timeout.
    pub fn destroy(&self) {
        let Some(dispatcher) = self.dispatcher.lock().take() else {
            return;
        };
        self.inner.transport.close();
        dispatcher.abort();
        self.inner.registry.clear();
        info!(
            endpoint = %self.inner.label,
            pending = self.inner.correlator.len(),
            "endpoint destroyed"
        );
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl Inner {
    async fn run(self: Arc<Self>, mut inbox: mpsc::UnboundedReceiver<Envelope>) {
        while let Some(envelope) = inbox.recv().await {
            self.dispatch(envelope);
        }
        debug!(endpoint = %self.label, "inbox closed, dispatcher stopping");
    }

    fn dispatch(self: &Arc<Self>, envelope: Envelope) {
        let Envelope { origin, source, data } = envelope;
        if !self.policy.allows(&origin) {
            trace!(endpoint = %self.label, origin = %origin, "message from unrecognised origin dropped");
            return;
        }
        let Some(message) = WireMessage::from_value(data) else {
            trace!(endpoint = %self.label, origin = %origin, "malformed message dropped");
            return;
        };
        trace!(endpoint = %self.label, kind = message.kind(), from = %source.id(), "dispatching");

        match message {
            WireMessage::Request(request) => self.on_request(request, source, origin),
            WireMessage::Response(response) => {
                let id = response.id.clone();
                self.correlator.settle(&id, response.into_outcome());
            }
            WireMessage::Event(event) => self.on_event(event, source.id()),
        }
    }

    fn on_request(self: &Arc<Self>, request: RequestMessage, source: WindowHandle, origin: String) {
        let route = {
            let handlers = self.handlers.read();
            match &self.role {
                Role::Host { .. } => router::route_host(&request.request_type, &handlers, &self.registry),
                Role::Plugin { namespace, .. } => {
                    router::route_plugin(&request.request_type, namespace, &handlers)
                }
            }
        };
        debug!(
            endpoint = %self.label,
            request_id = %request.id,
            request_type = %request.request_type,
            route = ?route,
            "routing request"
        );

        let RequestMessage {
            id,
            request_type,
            payload,
        } = request;

        match route {
            Route::Ignore => {}
            Route::Reject(message) => {
                self.reply(&source, &origin, ResponseMessage::failure(id, message));
            }
            Route::Local(handler) => {
                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    let response = match run_handler(handler, payload).await {
                        Ok(payload) => ResponseMessage::success(id, payload),
                        Err(message) => {
                            debug!(request_type = %request_type, error = %message, "handler failed");
                            ResponseMessage::failure(id, message)
                        }
                    };
                    inner.reply(&source, &origin, response);
                });
            }
            Route::Forward {
                namespace,
                registration,
            } => {
                let inner = Arc::clone(self);
                tokio::spawn(async move {
                    let outcome = inner
                        .send_request(&registration.window, &registration.origin, &request_type, payload)
                        .await;
                    let response = match outcome {
                        Ok(payload) => ResponseMessage::success(id, payload),
                        Err(e) => {
                            warn!(namespace = %namespace, request_type = %request_type, error = %e, "forwarded request failed");
                            ResponseMessage::failure(id, e.wire_message())
                        }
                    };
                    inner.reply(&source, &origin, response);
                });
            }
        }
    }

    fn on_event(&self, event: EventMessage, source: WindowId) {
        let listeners = self.listeners.lock().listeners(&event.event_type);
        debug!(
            endpoint = %self.label,
            event_type = %event.event_type,
            listeners = listeners.len(),
            "handling event"
        );
        invoke_listeners(&event.event_type, &listeners, event.payload.as_ref());

        if self.role.is_host() {
            self.broadcast(event, Some(source));
        }
    }

    /// Send `event` to every registered plugin except the window it came from.
    fn broadcast(&self, event: EventMessage, except: Option<WindowId>) {
        let message: WireMessage = event.into();
        for (namespace, registration) in self.registry.snapshot() {
            if Some(registration.window.id()) == except {
                continue;
            }
            match self
                .transport
                .post(&registration.window, &message, &registration.origin)
            {
                Ok(()) => trace!(namespace = %namespace, "event broadcast to plugin"),
                Err(e) => warn!(namespace = %namespace, error = %e, "failed to broadcast event to plugin"),
            }
        }
    }

    async fn send_request(
        &self,
        target: &WindowHandle,
        target_origin: &str,
        request_type: &str,
        payload: Option<Value>,
    ) -> Result<Option<Value>> {
        let pending = self.correlator.register();
        let message = WireMessage::request(pending.id(), request_type, payload);
        self.transport.post(target, &message, target_origin)?;
        pending.wait(request_type).await
    }

    fn reply(&self, target: &WindowHandle, target_origin: &str, response: ResponseMessage) {
        let id = response.id.clone();
        if let Err(e) = self.transport.post(target, &response.into(), target_origin) {
            debug!(endpoint = %self.label, request_id = %id, error = %e, "could not deliver response");
        }
    }
}

/// Run a handler, turning both errors and panics into an error message.
async fn run_handler(
    handler: Handler,
    payload: Option<Value>,
) -> std::result::Result<Option<Value>, String> {
    match AssertUnwindSafe(async move { handler(payload).await })
        .catch_unwind()
        .await
    {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err("handler panicked".to_string()),
    }
}

/// Capability handed to whoever registered a plugin: it can send events to
/// that one plugin and nothing else.
pub struct RegisteredPluginContext {
    namespace: Namespace,
    window: WindowHandle,
    origin: String,
    transport: Arc<dyn Transport>,
}

impl RegisteredPluginContext {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Send an event to this plugin only. Failures are logged.
    pub fn emit(&self, event_type: &str, payload: Option<Value>) {
        let event: WireMessage = EventMessage::new(event_type, payload).into();
        if let Err(e) = self.transport.post(&self.window, &event, &self.origin) {
            warn!(namespace = %self.namespace, event_type, error = %e, "failed to emit event to plugin");
        }
    }
}

impl std::fmt::Debug for RegisteredPluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredPluginContext")
            .field("namespace", &self.namespace)
            .field("window", &self.window)
            .field("origin", &self.origin)
            .finish()
    }
}
