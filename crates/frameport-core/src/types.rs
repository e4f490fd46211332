use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Unique identifier of a plugin, and the prefix of every request type it serves.
pub type Namespace = String;

/// Correlation id pairing a request with its response.
pub type CorrelationId = String;

/// Target origin accepted by any window.
pub const ANY_ORIGIN: &str = "*";

/// How long a request waits for its response before failing.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Namespace of a dotted request type: everything before the first `.`.
///
/// A request type without a dot is its own namespace.
pub fn namespace_of(request_type: &str) -> &str {
    request_type
        .split_once('.')
        .map_or(request_type, |(namespace, _)| namespace)
}

/// Strip `"<namespace>."` from a request type, returning the action.
///
/// Returns `None` when the request type belongs to a different namespace.
pub fn action_in<'a>(request_type: &'a str, namespace: &str) -> Option<&'a str> {
    request_type
        .strip_prefix(namespace)
        .and_then(|rest| rest.strip_prefix('.'))
}

/// Which sender origins an endpoint accepts messages from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "origins", rename_all = "snake_case")]
pub enum OriginPolicy {
    /// Host side: any origin in the list.
    AllowList(Vec<String>),
    /// Plugin side: exactly the parent's origin.
    Exact(String),
}

impl OriginPolicy {
    pub fn allows(&self, origin: &str) -> bool {
        match self {
            OriginPolicy::AllowList(origins) => origins.iter().any(|o| o == origin),
            OriginPolicy::Exact(expected) => expected == origin,
        }
    }
}

/// What the loader does when a manifest names a dependency that was never fetched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyPolicy {
    /// Drop the edge and log a warning.
    #[default]
    Lenient,
    /// Abort the load.
    Strict,
}

impl std::str::FromStr for DependencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lenient" => Ok(DependencyPolicy::Lenient),
            "strict" => Ok(DependencyPolicy::Strict),
            other => Err(format!("unknown dependency policy '{other}' (expected 'lenient' or 'strict')")),
        }
    }
}
