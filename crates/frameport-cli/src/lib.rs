//! # frameport-cli
//!
//! Command-line interface for the frameport bridge.
//!
//! ## Commands
//!
//! - `frameport resolve`: Fetch plugin manifests and print the load order
//! - `frameport demo`: Run an in-process host with two plugins
//! - `frameport config`: Show the effective configuration
//! - `frameport version`: Show version and build info

pub mod commands;

pub use commands::Cli;
