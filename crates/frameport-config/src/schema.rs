use frameport_core::DependencyPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration, mapped to `frameport.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameportConfig {
    pub bridge: BridgeConfig,
    pub loader: LoaderConfig,
    pub logging: LoggingConfig,
}

// ── Bridge ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// How long a request waits for its response, in milliseconds.
    pub request_timeout_ms: u64,
    /// Plugin origins the host accepts messages from.
    pub allowed_origins: Vec<String>,
    /// Origin of the host document, used by plugins as their parent origin.
    pub host_origin: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 5_000,
            allowed_origins: vec![],
            host_origin: "http://localhost:3000".into(),
        }
    }
}

impl BridgeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// ── Loader ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Manifest file name, resolved relative to each plugin's base URL.
    pub manifest_file: String,
    /// Handling of dependencies that were never fetched.
    pub dependency_policy: DependencyPolicy,
    /// Per-manifest HTTP timeout in seconds.
    pub fetch_timeout_secs: u64,
    /// Plugins to load, in configured order.
    pub plugins: Vec<PluginSource>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            manifest_file: "plugin.json".into(),
            dependency_policy: DependencyPolicy::Lenient,
            fetch_timeout_secs: 10,
            plugins: vec![],
        }
    }
}

/// A plugin's base URL. The manifest is fetched from `{url}/{manifest_file}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSource {
    pub url: String,
}

impl PluginSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
    /// Log file path (None = stderr only).
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
            file: None,
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            WarningSeverity::Error => "error",
            WarningSeverity::Warning => "warning",
            WarningSeverity::Info => "info",
        };
        write!(f, "{}: {}: {}", label, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

impl FrameportConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Request timeout ───
        if self.bridge.request_timeout_ms == 0 {
            warnings.push(ConfigWarning {
                field: "bridge.request_timeout_ms".into(),
                message: "timeout is 0, so every request would fail immediately".into(),
                severity: WarningSeverity::Error,
                hint: Some("The reference behaviour is 5000".into()),
            });
        } else if self.bridge.request_timeout_ms > 60_000 {
            warnings.push(ConfigWarning {
                field: "bridge.request_timeout_ms".into(),
                message: format!(
                    "timeout of {}ms leaves callers waiting a long time for dead frames",
                    self.bridge.request_timeout_ms
                ),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }

        // ── Host origin ───
        if url::Url::parse(&self.bridge.host_origin).is_err() {
            warnings.push(ConfigWarning {
                field: "bridge.host_origin".into(),
                message: format!("'{}' is not a valid origin", self.bridge.host_origin),
                severity: WarningSeverity::Error,
                hint: Some("Use e.g. 'http://localhost:3000'".into()),
            });
        }

        // ── Manifest file ───
        if self.loader.manifest_file.trim().is_empty() {
            warnings.push(ConfigWarning {
                field: "loader.manifest_file".into(),
                message: "manifest file name is empty".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to 'plugin.json'".into()),
            });
        }

        // ── Fetch timeout ───
        if self.loader.fetch_timeout_secs == 0 {
            warnings.push(ConfigWarning {
                field: "loader.fetch_timeout_secs".into(),
                message: "timeout is 0, so every manifest fetch would fail".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to 10".into()),
            });
        }

        // ── Plugin sources ───
        for (i, plugin) in self.loader.plugins.iter().enumerate() {
            let field = format!("loader.plugins[{i}].url");
            if plugin.url.starts_with("http://") || plugin.url.starts_with("https://") {
                match frameport_core::origin_of(&plugin.url) {
                    Ok(origin) => {
                        if !self.bridge.allowed_origins.contains(&origin) {
                            warnings.push(ConfigWarning {
                                field,
                                message: format!(
                                    "origin {origin} is not in bridge.allowed_origins; its messages will be dropped"
                                ),
                                severity: WarningSeverity::Warning,
                                hint: Some(format!("Add \"{origin}\" to bridge.allowed_origins")),
                            });
                        }
                    }
                    Err(e) => warnings.push(ConfigWarning {
                        field,
                        message: e.to_string(),
                        severity: WarningSeverity::Error,
                        hint: None,
                    }),
                }
            } else if plugin.url.trim().is_empty() {
                warnings.push(ConfigWarning {
                    field,
                    message: "plugin url is empty".into(),
                    severity: WarningSeverity::Error,
                    hint: None,
                });
            }
        }

        if !self.loader.plugins.is_empty() && self.bridge.allowed_origins.is_empty() {
            warnings.push(ConfigWarning {
                field: "bridge.allowed_origins".into(),
                message: "plugins are configured but no origins are allowed".into(),
                severity: WarningSeverity::Warning,
                hint: None,
            });
        }

        // ── Logging ───
        if !matches!(self.logging.format.as_str(), "pretty" | "json" | "compact") {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Error,
                hint: Some("Use 'pretty', 'json', or 'compact'".into()),
            });
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
