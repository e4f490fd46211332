use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use frameport_core::{FrameportError, Result};

use crate::manifest::PluginManifest;

/// Retrieves the manifest for a plugin base URL.
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    async fn fetch(&self, base_url: &str) -> Result<PluginManifest>;
}

/// `{base}/{file}`, without doubling the slash.
pub fn manifest_url(base_url: &str, manifest_file: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), manifest_file)
}

fn manifest_error(source_url: &str, reason: impl Into<String>) -> FrameportError {
    FrameportError::Manifest {
        source_url: source_url.to_string(),
        reason: reason.into(),
    }
}

/// Fetches manifests over HTTP(S).
pub struct HttpManifestFetcher {
    client: reqwest::Client,
    manifest_file: String,
}

impl HttpManifestFetcher {
    pub fn new(manifest_file: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FrameportError::Other(e.into()))?;
        Ok(Self {
            client,
            manifest_file: manifest_file.into(),
        })
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    async fn fetch(&self, base_url: &str) -> Result<PluginManifest> {
        let url = manifest_url(base_url, &self.manifest_file);
        debug!(url = %url, "fetching manifest");

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| manifest_error(&url, e.to_string()))?;

        if !resp.status().is_success() {
            return Err(manifest_error(&url, format!("server returned HTTP {}", resp.status())));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| manifest_error(&url, e.to_string()))?;
        PluginManifest::from_json(&url, &body)
    }
}

/// Reads manifests from disk. Accepts `file://` URLs and plain paths.
pub struct FsManifestFetcher {
    manifest_file: String,
}

impl FsManifestFetcher {
    pub fn new(manifest_file: impl Into<String>) -> Self {
        Self {
            manifest_file: manifest_file.into(),
        }
    }

    fn base_dir(base_url: &str) -> Result<PathBuf> {
        if base_url.starts_with("file:") {
            let url = url::Url::parse(base_url).map_err(|e| manifest_error(base_url, e.to_string()))?;
            url.to_file_path()
                .map_err(|_| manifest_error(base_url, "not a local file URL"))
        } else {
            Ok(PathBuf::from(base_url))
        }
    }
}

#[async_trait]
impl ManifestFetcher for FsManifestFetcher {
    async fn fetch(&self, base_url: &str) -> Result<PluginManifest> {
        let path = Self::base_dir(base_url)?.join(&self.manifest_file);
        let source = path.display().to_string();
        debug!(path = %source, "reading manifest");

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| manifest_error(&source, e.to_string()))?;
        PluginManifest::from_json(&source, &content)
    }
}

/// HTTP for `http:`/`https:` URLs, the filesystem for everything else.
pub struct AutoFetcher {
    http: HttpManifestFetcher,
    fs: FsManifestFetcher,
}

impl AutoFetcher {
    pub fn new(manifest_file: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: HttpManifestFetcher::new(manifest_file, timeout)?,
            fs: FsManifestFetcher::new(manifest_file),
        })
    }
}

#[async_trait]
impl ManifestFetcher for AutoFetcher {
    async fn fetch(&self, base_url: &str) -> Result<PluginManifest> {
        if base_url.starts_with("http://") || base_url.starts_with("https://") {
            self.http.fetch(base_url).await
        } else {
            self.fs.fetch(base_url).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_url_joins_once() {
        assert_eq!(
            manifest_url("https://p.example/hello", "plugin.json"),
            "https://p.example/hello/plugin.json"
        );
        assert_eq!(
            manifest_url("https://p.example/hello/", "plugin.json"),
            "https://p.example/hello/plugin.json"
        );
    }

    #[test]
    fn file_urls_become_paths() {
        let dir = FsManifestFetcher::base_dir("file:///srv/plugins/hello").unwrap();
        assert_eq!(dir, PathBuf::from("/srv/plugins/hello"));
        let dir = FsManifestFetcher::base_dir("plugins/hello").unwrap();
        assert_eq!(dir, PathBuf::from("plugins/hello"));
    }
}
