use thiserror::Error;

use crate::transport::WindowId;

/// Unified error type for the frameport bridge and loader.
#[derive(Error, Debug)]
pub enum FrameportError {
    // ── Request / response errors ──────────────────────────────
    #[error("request timed out after {timeout_ms}ms: {request_type}")]
    Timeout { request_type: String, timeout_ms: u64 },

    /// The peer answered with an error response. Carries the peer's message verbatim.
    #[error("{0}")]
    Remote(String),

    #[error("no plugin registered for namespace: {namespace}")]
    NoRoute { namespace: String },

    #[error("invalid request type '{0}': expected '<namespace>.<action>'")]
    InvalidRequestType(String),

    // ── Endpoint lifecycle errors ──────────────────────────────
    #[error("endpoint has been destroyed")]
    EndpointClosed,

    #[error("operation is only available on a host endpoint")]
    NotHost,

    #[error("window {0} is closed")]
    WindowClosed(WindowId),

    #[error("transport error: {0}")]
    Transport(String),

    // ── Loader errors ──────────────────────────────────────────
    #[error("manifest error: {source_url}: {reason}")]
    Manifest { source_url: String, reason: String },

    #[error("dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("plugin '{plugin}' requires '{requires}' which was not fetched")]
    MissingDependency { plugin: String, requires: String },

    #[error("plugin '{plugin}' requires '{requires}' {range}, but found version {actual}")]
    VersionMismatch {
        plugin: String,
        requires: String,
        range: String,
        actual: String,
    },

    #[error("frame creation failed: {plugin}: {reason}")]
    Frame { plugin: String, reason: String },

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl FrameportError {
    /// The text placed in an error response when this failure is relayed to a peer.
    ///
    /// Remote errors pass through unchanged so a relayed failure reads the same
    /// at every hop.
    pub fn wire_message(&self) -> String {
        match self {
            FrameportError::Remote(message) => message.clone(),
            other => other.to_string(),
        }
    }

    /// Whether this error ends a plugin load session.
    pub fn is_load_fatal(&self) -> bool {
        matches!(
            self,
            FrameportError::Manifest { .. }
                | FrameportError::DependencyCycle(_)
                | FrameportError::MissingDependency { .. }
                | FrameportError::VersionMismatch { .. }
                | FrameportError::Frame { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameportError>;
