use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use frameport_config::{ConfigLoader, FrameportConfig, LoggingConfig};
use frameport_core::{FrameportError, Result};
use tracing_subscriber::fmt::writer::BoxMakeWriter;

mod demo;
mod resolve;

/// Host/plugin messaging bridge for sandboxed frames
#[derive(Parser)]
#[command(name = "frameport", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to frameport.toml config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level override (e.g. debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all log output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch plugin manifests and print the dependency-ordered load layers
    Resolve {
        /// Plugin base URLs or directories (defaults to [loader].plugins)
        urls: Vec<String>,

        /// Fail on missing dependencies and version mismatches
        #[arg(long)]
        strict: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run an in-process host with the hello-world and theme-toggle plugins
    Demo,
    /// Show the effective configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show version and build info
    Version,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        // Load config first so we can use it for log format
        let config_loader = ConfigLoader::load(self.config.as_deref())?;
        let config = config_loader.get();

        let log_level = self.log_level_directive(&config.logging);
        init_tracing(&config.logging, &log_level)?;

        match self.command {
            Commands::Resolve { urls, strict, json } => {
                resolve::cmd_resolve(config, urls, strict, json).await
            }
            Commands::Demo => demo::cmd_demo(config).await,
            Commands::Config { json } => Self::cmd_config(config, json),
            Commands::Version => Self::cmd_version(),
        }
    }

    /// --verbose > --quiet > --log-level > config. `RUST_LOG` beats all of
    /// them inside `init_tracing`.
    fn log_level_directive(&self, logging: &LoggingConfig) -> String {
        if self.verbose {
            "debug".into()
        } else if self.quiet {
            "error".into()
        } else {
            self.log_level
                .clone()
                .unwrap_or_else(|| logging.level.clone())
        }
    }

    fn cmd_config(config: FrameportConfig, json: bool) -> Result<()> {
        if json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| FrameportError::Config(e.to_string()))?
            );
        }
        Ok(())
    }

    fn cmd_version() -> Result<()> {
        println!(
            "{} v{}",
            console::style("frameport").bold(),
            env!("CARGO_PKG_VERSION")
        );
        println!("   Rust edition: 2024");
        println!("   Target: {}", std::env::consts::ARCH);
        println!("   OS: {}", std::env::consts::OS);
        #[cfg(debug_assertions)]
        println!("   Profile: debug");
        #[cfg(not(debug_assertions))]
        println!("   Profile: release");
        Ok(())
    }
}

/// Install the global subscriber: stderr or `[logging].file`, JSON or
/// human-readable output.
fn init_tracing(logging: &LoggingConfig, log_level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let writer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            BoxMakeWriter::new(Arc::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    match logging.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .json()
            .with_target(true)
            .init(),
        "compact" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .compact()
            .with_target(false)
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_target(false)
            .init(),
    }
    Ok(())
}
