use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

/// Callback invoked for every event of the type it was registered for.
pub type Listener = Arc<dyn Fn(Option<&Value>) -> anyhow::Result<()> + Send + Sync>;

/// Box a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(Option<&Value>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Returned by `on`; pass it to `off` to remove the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Event name → listeners, in registration order.
#[derive(Default)]
pub struct EventListenerSet {
    next_id: u64,
    listeners: HashMap<String, Vec<(ListenerId, Listener)>>,
}

impl EventListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, event_type: &str, listener: Listener) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.listeners
            .entry(event_type.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    /// Remove a listener. The event name disappears with its last listener.
    pub fn off(&mut self, event_type: &str, id: ListenerId) -> bool {
        let Some(entries) = self.listeners.get_mut(event_type) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            self.listeners.remove(event_type);
        }
        removed
    }

    /// Snapshot of the listeners for `event_type`, so they can run without
    /// holding the set's lock.
    pub fn listeners(&self, event_type: &str) -> Vec<Listener> {
        self.listeners
            .get(event_type)
            .map(|entries| entries.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.listeners.contains_key(event_type)
    }

    /// Number of event names with at least one listener.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

/// Run every listener in order. A listener that fails or panics is logged and
/// the rest still run. Returns the number of failures.
pub fn invoke_listeners(event_type: &str, listeners: &[Listener], payload: Option<&Value>) -> usize {
    let mut failures = 0;
    for listener in listeners {
        match catch_unwind(AssertUnwindSafe(|| listener(payload))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                failures += 1;
                warn!(event_type, error = %e, "event listener failed");
            }
            Err(_) => {
                failures += 1;
                warn!(event_type, "event listener panicked");
            }
        }
    }
    failures
}
