use std::collections::HashMap;

use parking_lot::RwLock;

use frameport_core::{Namespace, WindowHandle};

/// Where a registered plugin lives.
#[derive(Debug, Clone)]
pub struct PluginRegistration {
    pub window: WindowHandle,
    pub origin: String,
}

/// Namespace → plugin frame, owned by a host endpoint.
///
/// Written only through the host's `register_plugin`; routing and broadcast
/// read it.
#[derive(Default)]
pub struct PluginRegistry {
    entries: RwLock<HashMap<Namespace, PluginRegistration>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the registration for `namespace`, returning the
    /// registration it replaced.
    pub fn register(
        &self,
        namespace: impl Into<Namespace>,
        registration: PluginRegistration,
    ) -> Option<PluginRegistration> {
        self.entries.write().insert(namespace.into(), registration)
    }

    pub fn get(&self, namespace: &str) -> Option<PluginRegistration> {
        self.entries.read().get(namespace).cloned()
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.entries.read().contains_key(namespace)
    }

    /// Registered namespaces, sorted.
    pub fn namespaces(&self) -> Vec<Namespace> {
        let mut names: Vec<_> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Copy of every registration, for iterating without holding the lock.
    pub fn snapshot(&self) -> Vec<(Namespace, PluginRegistration)> {
        self.entries
            .read()
            .iter()
            .map(|(ns, reg)| (ns.clone(), reg.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }
}
