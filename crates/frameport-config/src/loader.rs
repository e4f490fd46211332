use std::path::{Path, PathBuf};
use tracing::{info, warn};

use frameport_core::{FrameportError, Result};

use crate::schema::FrameportConfig;

/// Loads the frameport configuration from disk and the environment.
pub struct ConfigLoader {
    config: FrameportConfig,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Resolve the config path: explicit path > FRAMEPORT_CONFIG env > ~/.frameport/frameport.toml
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(p) = explicit {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("FRAMEPORT_CONFIG") {
            return PathBuf::from(p);
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".frameport")
            .join("frameport.toml")
    }

    /// Load the config from disk, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = Self::resolve_path(path);
        let config = if config_path.exists() {
            info!(?config_path, "loading configuration");
            Self::read(&config_path)?
        } else {
            warn!(?config_path, "config file not found, using defaults");
            FrameportConfig::default()
        };

        let config = Self::apply_overrides(config, |key| std::env::var(key).ok());

        // Validate config: log warnings, fail on errors
        match config.validate() {
            Ok(warnings) => {
                for w in &warnings {
                    warn!("{}", w);
                }
            }
            Err(e) => {
                return Err(FrameportError::Config(e));
            }
        }

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Parse a config file without applying overrides or validation.
    pub fn read(path: &Path) -> Result<FrameportConfig> {
        let raw = std::fs::read_to_string(path)?;
        toml::from_str::<FrameportConfig>(&raw).map_err(|e| {
            FrameportError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Get a snapshot of the current config.
    pub fn get(&self) -> FrameportConfig {
        self.config.clone()
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    /// Apply overrides (FRAMEPORT_LOG_LEVEL, FRAMEPORT_REQUEST_TIMEOUT_MS,
    /// FRAMEPORT_DEPENDENCY_POLICY) looked up through `lookup`.
    pub fn apply_overrides(
        mut config: FrameportConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> FrameportConfig {
        if let Some(v) = lookup("FRAMEPORT_LOG_LEVEL") {
            config.logging.level = v;
        }
        if let Some(v) = lookup("FRAMEPORT_REQUEST_TIMEOUT_MS") {
            match v.parse::<u64>() {
                Ok(ms) => config.bridge.request_timeout_ms = ms,
                Err(_) => warn!(value = %v, "ignoring non-numeric FRAMEPORT_REQUEST_TIMEOUT_MS"),
            }
        }
        if let Some(v) = lookup("FRAMEPORT_DEPENDENCY_POLICY") {
            match v.parse() {
                Ok(policy) => config.loader.dependency_policy = policy,
                Err(e) => warn!(error = %e, "ignoring FRAMEPORT_DEPENDENCY_POLICY"),
            }
        }
        config
    }

    /// Reload the config from disk.
    pub fn reload(&mut self) -> Result<()> {
        if !self.config_path.exists() {
            return Err(FrameportError::Config(format!(
                "config file not found: {}",
                self.config_path.display()
            )));
        }
        let new_config = Self::read(&self.config_path)?;
        let new_config = Self::apply_overrides(new_config, |key| std::env::var(key).ok());
        new_config.validate().map_err(FrameportError::Config)?;
        self.config = new_config;
        info!("configuration reloaded");
        Ok(())
    }
}
