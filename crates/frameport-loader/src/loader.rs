use std::collections::BTreeMap;
use std::time::Duration;

use futures::{StreamExt, TryStreamExt, stream};
use serde::Serialize;
use tracing::{debug, info, warn};

use frameport_config::{LoaderConfig, PluginSource};
use frameport_core::{DependencyPolicy, FrameportError, Result, origin_of};

use crate::fetch::{AutoFetcher, ManifestFetcher};
use crate::graph::DependencyGraph;
use crate::manifest::PluginManifest;

/// What a frame factory is asked to build for one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrameDescriptor {
    /// `iframe-plugin-<name>`.
    pub id: String,
    pub name: String,
    /// The plugin's base URL, loaded into the frame.
    pub src: String,
    /// Origin of `src`; `"null"` for sources without one.
    pub origin: String,
}

impl FrameDescriptor {
    pub fn for_plugin(name: &str, src: &str) -> Self {
        Self {
            id: format!("iframe-plugin-{name}"),
            name: name.to_string(),
            src: src.to_string(),
            origin: origin_of(src).unwrap_or_else(|_| "null".to_string()),
        }
    }
}

/// Builds frames for plugins. Frame readiness and registration into the
/// host endpoint stay with the implementor.
pub trait FrameFactory {
    type Frame;

    fn create_frame(&mut self, descriptor: &FrameDescriptor) -> Result<Self::Frame>;
}

/// Lifecycle callbacks fired while loading.
pub trait LoadObserver<F> {
    /// A manifest was fetched. Fires in configured order.
    fn on_manifest_loaded(&mut self, _manifest: &PluginManifest) {}

    /// A frame was built. Fires in dependency order.
    fn on_plugin_loaded(&mut self, _plugin: &LoadedPlugin<F>) {}
}

impl<F> LoadObserver<F> for () {}

/// A fetched manifest and where it came from.
#[derive(Debug, Clone, Serialize)]
pub struct FetchedManifest {
    pub source_url: String,
    pub manifest: PluginManifest,
}

#[derive(Debug)]
pub struct LoadedPlugin<F> {
    pub name: String,
    pub source_url: String,
    pub manifest: PluginManifest,
    pub frame: F,
}

/// Manifests keyed by name plus the order to instantiate them in.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub graph: DependencyGraph,
    pub layers: Vec<Vec<String>>,
    pub manifests: BTreeMap<String, FetchedManifest>,
}

#[derive(Debug)]
pub struct LoadReport<F> {
    pub graph: DependencyGraph,
    pub layers: Vec<Vec<String>>,
    /// In instantiation order.
    pub plugins: Vec<LoadedPlugin<F>>,
}

/// Dependency-ordered plugin loader.
pub struct PluginLoader<M> {
    fetcher: M,
    policy: DependencyPolicy,
}

impl PluginLoader<AutoFetcher> {
    /// Loader over HTTP and the filesystem, configured from `[loader]`.
    pub fn from_config(config: &LoaderConfig) -> Result<Self> {
        let fetcher = AutoFetcher::new(
            &config.manifest_file,
            Duration::from_secs(config.fetch_timeout_secs),
        )?;
        Ok(Self::new(fetcher, config.dependency_policy))
    }
}

impl<M: ManifestFetcher> PluginLoader<M> {
    pub fn new(fetcher: M, policy: DependencyPolicy) -> Self {
        Self { fetcher, policy }
    }

    pub fn policy(&self) -> DependencyPolicy {
        self.policy
    }

    /// Fetch every manifest concurrently, handing each to `on_loaded` in
    /// configured order. The first failure in that order aborts the fetch.
    pub async fn fetch_manifests(
        &self,
        sources: &[PluginSource],
        mut on_loaded: impl FnMut(&FetchedManifest),
    ) -> Result<Vec<FetchedManifest>> {
        let mut fetches = stream::iter(sources)
            .map(|source| async move {
                let manifest = self.fetcher.fetch(&source.url).await?;
                Ok::<_, FrameportError>(FetchedManifest {
                    source_url: source.url.clone(),
                    manifest,
                })
            })
            .buffered(sources.len().max(1));

        let mut fetched = Vec::with_capacity(sources.len());
        while let Some(item) = fetches.try_next().await? {
            debug!(
                plugin = %item.manifest.name,
                source = %item.source_url,
                "manifest loaded"
            );
            on_loaded(&item);
            fetched.push(item);
        }
        Ok(fetched)
    }

    /// Fetch and sort without instantiating anything.
    pub async fn resolve(&self, sources: &[PluginSource]) -> Result<Resolution> {
        let fetched = self.fetch_manifests(sources, |_| {}).await?;
        self.sort(fetched)
    }

    /// Fetch manifests, sort them and build a frame for each plugin, layer by
    /// layer.
    pub async fn load_plugins<Fac, O>(
        &self,
        sources: &[PluginSource],
        factory: &mut Fac,
        observer: &mut O,
    ) -> Result<LoadReport<Fac::Frame>>
    where
        Fac: FrameFactory,
        O: LoadObserver<Fac::Frame>,
    {
        info!(count = sources.len(), policy = ?self.policy, "loading plugins");
        let fetched = self
            .fetch_manifests(sources, |item| observer.on_manifest_loaded(&item.manifest))
            .await?;
        let Resolution {
            graph,
            layers,
            mut manifests,
        } = self.sort(fetched)?;

        let mut plugins = Vec::with_capacity(manifests.len());
        for name in layers.iter().flatten() {
            let Some(FetchedManifest { source_url, manifest }) = manifests.remove(name) else {
                continue;
            };
            let descriptor = FrameDescriptor::for_plugin(name, &source_url);
            let frame = factory.create_frame(&descriptor)?;
            let plugin = LoadedPlugin {
                name: name.clone(),
                source_url,
                manifest,
                frame,
            };
            info!(plugin = %plugin.name, frame = %descriptor.id, "plugin loaded");
            observer.on_plugin_loaded(&plugin);
            plugins.push(plugin);
        }

        Ok(LoadReport {
            graph,
            layers,
            plugins,
        })
    }

    fn sort(&self, fetched: Vec<FetchedManifest>) -> Result<Resolution> {
        let mut manifests = BTreeMap::new();
        for item in fetched {
            let name = item.manifest.name.clone();
            if let Some(previous) = manifests.insert(name.clone(), item) {
                warn!(
                    plugin = %name,
                    replaced = %previous.source_url,
                    "duplicate plugin name, keeping the later manifest"
                );
            }
        }

        let by_name: BTreeMap<String, PluginManifest> = manifests
            .iter()
            .map(|(name, item)| (name.clone(), item.manifest.clone()))
            .collect();
        let graph = DependencyGraph::build(&by_name, self.policy)?;
        let layers = graph.layers()?;
        debug!(layers = ?layers, "plugin order resolved");

        Ok(Resolution {
            graph,
            layers,
            manifests,
        })
    }
}
