use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// One discovered HTTP operation. Immutable once produced; any change
/// (config overrides, base URL resolution) builds a replacement value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Uppercase canonical verb ("GET", "POST", ...).
    pub http_method: String,
    /// Normalized path with a single leading `/`, or a full absolute URL.
    pub path: String,
    /// Fully-qualified owning type. Synthesized for heuristic matches
    /// with no real declaring type.
    pub service_fqn: String,
    pub function_name: String,
    pub request_type: Option<String>,
    pub response_type: Option<String>,
    /// Absolute origin with no trailing slash, when resolvable.
    pub base_url: Option<String>,
}

impl Endpoint {
    pub fn key(&self) -> EndpointKey {
        EndpointKey {
            http_method: self.http_method.clone(),
            path: self.path.clone(),
            service_fqn: self.service_fqn.clone(),
            function_name: self.function_name.clone(),
        }
    }

    /// Full URL when a base is known, otherwise just the path.
    pub fn display_url(&self) -> String {
        match &self.base_url {
            Some(base) if !self.path.starts_with("http") => {
                format!("{}{}", base, self.path)
            }
            _ => self.path.clone(),
        }
    }
}

/// Derived identity used for dedup, caches and selection persistence.
/// Never an owning handle, purely a lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EndpointKey {
    pub http_method: String,
    pub path: String,
    pub service_fqn: String,
    pub function_name: String,
}

impl EndpointKey {
    /// `service#function` form used by the override document.
    pub fn config_key(&self) -> String {
        format!("{}#{}", self.service_fqn, self.function_name)
    }
}

/// Normalize a scanned path: blank becomes `/`, relative paths gain a
/// single leading `/`, absolute URLs pass through untouched.
pub fn normalize_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        return trimmed.to_string();
    }
    let stripped = trimmed.trim_start_matches('/');
    format!("/{}", stripped)
}

/// Deterministic output ordering: (service, path, function).
pub fn compare_endpoints(a: &Endpoint, b: &Endpoint) -> Ordering {
    a.service_fqn
        .cmp(&b.service_fqn)
        .then_with(|| a.path.cmp(&b.path))
        .then_with(|| a.function_name.cmp(&b.function_name))
        .then_with(|| a.http_method.cmp(&b.http_method))
}
