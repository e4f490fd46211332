//! Dependency graph and layered topological sort.
//!
//! Layer 0 holds the plugins with no dependencies; layer k holds the plugins
//! whose dependencies all sit in earlier layers. Plugins in the same layer do
//! not depend on each other and could be instantiated in any order; names are
//! sorted within a layer so the result is deterministic.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;
use tracing::warn;

use frameport_core::{DependencyPolicy, FrameportError, Result};

use crate::manifest::PluginManifest;

/// Plugin name → names of the plugins it depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a plugin and its dependencies, replacing any earlier entry.
    pub fn insert(&mut self, name: impl Into<String>, dependencies: impl IntoIterator<Item = String>) {
        self.edges.insert(name.into(), dependencies.into_iter().collect());
    }

    /// Build the graph for a set of fetched manifests.
    ///
    /// Dependencies that were never fetched are dropped with a warning under
    /// [`DependencyPolicy::Lenient`] and fail the build under
    /// [`DependencyPolicy::Strict`]. Version ranges are checked when both the
    /// range and the dependency's version parse as semver.
    pub fn build(manifests: &BTreeMap<String, PluginManifest>, policy: DependencyPolicy) -> Result<Self> {
        let mut graph = Self::new();

        for (name, manifest) in manifests {
            let mut deps = BTreeSet::new();
            for (dep, range) in &manifest.dependencies {
                let Some(dep_manifest) = manifests.get(dep) else {
                    match policy {
                        DependencyPolicy::Strict => {
                            return Err(FrameportError::MissingDependency {
                                plugin: name.clone(),
                                requires: dep.clone(),
                            });
                        }
                        DependencyPolicy::Lenient => {
                            warn!(plugin = %name, requires = %dep, "dependency was not fetched, ignoring it");
                            continue;
                        }
                    }
                };

                if let (Some(req), Some(actual)) = (manifest.requirement(dep), dep_manifest.semver())
                    && !req.matches(&actual)
                {
                    match policy {
                        DependencyPolicy::Strict => {
                            return Err(FrameportError::VersionMismatch {
                                plugin: name.clone(),
                                requires: dep.clone(),
                                range: range.clone(),
                                actual: actual.to_string(),
                            });
                        }
                        DependencyPolicy::Lenient => {
                            warn!(
                                plugin = %name,
                                requires = %dep,
                                range = %range,
                                actual = %actual,
                                "dependency version does not satisfy range"
                            );
                        }
                    }
                }

                deps.insert(dep.clone());
            }
            graph.edges.insert(name.clone(), deps);
        }

        Ok(graph)
    }

    pub fn dependencies(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.edges.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.edges.contains_key(name)
    }

    /// All plugin names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.edges.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Kahn's algorithm, one layer per round. Edges to names outside the
    /// graph are ignored.
    pub fn layers(&self) -> Result<Vec<Vec<String>>> {
        let mut pending: BTreeMap<&str, BTreeSet<&str>> = self
            .edges
            .iter()
            .map(|(name, deps)| {
                let deps = deps
                    .iter()
                    .map(String::as_str)
                    .filter(|dep| self.edges.contains_key(*dep))
                    .collect();
                (name.as_str(), deps)
            })
            .collect();

        let mut layers = Vec::new();
        while !pending.is_empty() {
            let layer: Vec<&str> = pending
                .iter()
                .filter(|(_, deps)| deps.is_empty())
                .map(|(name, _)| *name)
                .collect();

            if layer.is_empty() {
                return Err(FrameportError::DependencyCycle(find_cycle(&pending)));
            }

            for name in &layer {
                pending.remove(name);
            }
            for deps in pending.values_mut() {
                for name in &layer {
                    deps.remove(name);
                }
            }
            layers.push(layer.into_iter().map(String::from).collect());
        }

        Ok(layers)
    }
}

/// Walk unresolved edges from the first stuck node until a name repeats.
/// Every node left in `pending` has at least one dependency also left in it.
fn find_cycle(pending: &BTreeMap<&str, BTreeSet<&str>>) -> Vec<String> {
    let stuck = || -> Vec<String> { pending.keys().map(|name| name.to_string()).collect() };
    let Some(mut current) = pending.keys().next().copied() else {
        return Vec::new();
    };

    let mut path: Vec<&str> = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    loop {
        if let Some(&start) = seen.get(current) {
            let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
            cycle.push(current.to_string());
            return cycle;
        }
        seen.insert(current, path.len());
        path.push(current);
        match pending.get(current).and_then(|deps| deps.iter().next()) {
            Some(next) => current = *next,
            None => return stuck(),
        }
    }
}
