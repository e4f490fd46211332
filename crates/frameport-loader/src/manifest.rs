use std::collections::BTreeMap;

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

use frameport_core::{FrameportError, Result};

/// Plugin manifest, served as `plugin.json` at the plugin's base URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Unique plugin id. Also the namespace the plugin serves.
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    /// Dependency name → version range.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl PluginManifest {
    /// Parse a manifest fetched from `source_url`.
    pub fn from_json(source_url: &str, s: &str) -> Result<Self> {
        let manifest: Self = serde_json::from_str(s).map_err(|e| FrameportError::Manifest {
            source_url: source_url.to_string(),
            reason: format!("failed to parse manifest: {e}"),
        })?;
        if manifest.name.trim().is_empty() {
            return Err(FrameportError::Manifest {
                source_url: source_url.to_string(),
                reason: "manifest has an empty name".into(),
            });
        }
        Ok(manifest)
    }

    /// Get the semver version.
    pub fn semver(&self) -> Option<Version> {
        self.version.as_deref().and_then(|v| Version::parse(v).ok())
    }

    /// Parsed requirement for dependency `name`. `None` when the range is not
    /// valid semver (such ranges are not checked).
    pub fn requirement(&self, name: &str) -> Option<VersionReq> {
        self.dependencies
            .get(name)
            .and_then(|range| VersionReq::parse(range).ok())
    }
}
