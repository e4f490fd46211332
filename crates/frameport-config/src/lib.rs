//! # frameport-config
//!
//! Configuration for frameport hosts and loaders. Reads from `frameport.toml`
//! and environment variables, in that precedence order.

pub mod loader;
pub mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    BridgeConfig, ConfigWarning, FrameportConfig, LoaderConfig, LoggingConfig,
    PluginSource, WarningSeverity,
};
