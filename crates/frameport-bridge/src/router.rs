//! Namespace routing for incoming requests.
//!
//! A request type is `"<namespace>.<action>"`. Plugins only answer requests in
//! their own namespace and look handlers up by action. The host looks up the
//! full request type first, then treats the namespace as the name of a
//! registered plugin to forward to.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use frameport_core::{action_in, namespace_of};

use crate::registry::{PluginRegistration, PluginRegistry};

/// An async request handler. `Ok(None)` answers with a void success: a
/// response carrying neither `payload` nor `error`.
pub type Handler =
    Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, anyhow::Result<Option<Value>>> + Send + Sync>;

/// Where an incoming request goes.
pub enum Route {
    /// Run a handler on this endpoint.
    Local(Handler),
    /// Relay to a registered plugin (host only).
    Forward {
        namespace: String,
        registration: PluginRegistration,
    },
    /// Answer at once with this error message.
    Reject(String),
    /// Not addressed to this endpoint; drop without answering.
    Ignore,
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Local(_) => f.write_str("Local"),
            Route::Forward { namespace, .. } => write!(f, "Forward({namespace})"),
            Route::Reject(message) => write!(f, "Reject({message})"),
            Route::Ignore => f.write_str("Ignore"),
        }
    }
}

/// Route a request arriving at the host.
pub fn route_host(
    request_type: &str,
    handlers: &HashMap<String, Handler>,
    registry: &PluginRegistry,
) -> Route {
    if let Some(handler) = handlers.get(request_type) {
        return Route::Local(Arc::clone(handler));
    }
    let namespace = namespace_of(request_type);
    match registry.get(namespace) {
        Some(registration) => Route::Forward {
            namespace: namespace.to_string(),
            registration,
        },
        None => Route::Reject(format!(
            "[host] No handler or plugin found for namespace: {namespace}"
        )),
    }
}

/// Route a request arriving at the plugin that owns `namespace`.
pub fn route_plugin(request_type: &str, namespace: &str, handlers: &HashMap<String, Handler>) -> Route {
    let Some(action) = action_in(request_type, namespace) else {
        return Route::Ignore;
    };
    match handlers.get(action) {
        Some(handler) => Route::Local(Arc::clone(handler)),
        None => Route::Reject(format!("[{namespace}] No handler for action: {action}")),
    }
}
