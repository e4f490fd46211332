//! # frameport-loader
//!
//! Fetches plugin manifests, orders plugins so that every plugin comes after
//! the plugins it depends on, and asks a frame factory to instantiate them
//! layer by layer.
//!
//! ## Plugin Manifest
//!
//! Each plugin serves a `plugin.json` next to its entry page:
//!
//! ```json
//! {
//!   "name": "theme-toggle",
//!   "version": "1.2.0",
//!   "description": "Switch between light and dark themes",
//!   "dependencies": { "hello-world": "^1.0" }
//! }
//! ```

pub mod fetch;
pub mod graph;
pub mod loader;
pub mod manifest;

pub use fetch::{AutoFetcher, FsManifestFetcher, HttpManifestFetcher, ManifestFetcher, manifest_url};
pub use graph::DependencyGraph;
pub use loader::{
    FetchedManifest, FrameDescriptor, FrameFactory, LoadObserver, LoadReport, LoadedPlugin,
    PluginLoader, Resolution,
};
pub use manifest::PluginManifest;
