//! Override Document
//!
//! Project-authored `apiscout.yaml` at the project root. A deliberately
//! small, line-oriented format: top-level `key: value` lines are scalars,
//! a top-level `key:` with no value opens a section whose indented lines
//! populate a map. Malformed lines are skipped, never fatal.
//!
//! ```yaml
//! baseUrl: https://api.example.com
//! defaultEnv: dev
//! environments:
//!   dev: https://dev.example.com
//!   prod: https://example.com
//! servicePaths:
//!   "com.x.Api#login": https://auth.example.com/v1/login
//! ```

use std::collections::HashMap;

use tracing::debug;

use crate::base_url::normalize_base_url;
use crate::endpoint::{Endpoint, normalize_path};
use crate::project::ConfigFile;
use crate::url::split_absolute_url;

/// Parsed override document. Section maps are keyed by a bare service FQN
/// or by `service#function`; function-scoped keys always win.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndpointConfig {
    pub global_base_url: Option<String>,
    pub default_env: Option<String>,
    pub environments: HashMap<String, String>,
    pub service_base_urls: HashMap<String, String>,
    pub service_paths: HashMap<String, String>,
    pub service_request_types: HashMap<String, String>,
    pub service_response_types: HashMap<String, String>,
}

impl EndpointConfig {
    /// Pure line-oriented parse; identical text always yields an
    /// identical document.
    pub fn parse(text: &str) -> Self {
        let mut config = EndpointConfig::default();
        let mut section: Option<String> = None;

        for raw_line in text.lines() {
            let line = strip_comment(raw_line);
            if line.trim().is_empty() {
                continue;
            }

            let indented = line.starts_with(' ') || line.starts_with('\t');
            let Some((key, value)) = line.split_once(':') else {
                debug!(line = raw_line, "skipping malformed override line");
                continue;
            };
            let key = unquote(key.trim());
            let value = unquote(value.trim());

            if indented {
                let Some(section_name) = section.clone() else {
                    debug!(line = raw_line, "indented line outside any section");
                    continue;
                };
                if key.is_empty() || value.is_empty() {
                    continue;
                }
                if let Some(map) = config.section_map(&section_name) {
                    map.insert(key, value);
                }
                continue;
            }

            if value.is_empty() {
                section = Some(key);
                continue;
            }
            section = None;

            match key.as_str() {
                "baseUrl" | "base_url" => config.global_base_url = Some(value),
                "defaultEnv" | "default_env" => config.default_env = Some(value),
                _ => debug!(key, "unknown scalar in override document"),
            }
        }

        config
    }

    fn section_map(&mut self, name: &str) -> Option<&mut HashMap<String, String>> {
        match name {
            "environments" => Some(&mut self.environments),
            "serviceBaseUrls" => Some(&mut self.service_base_urls),
            "servicePaths" => Some(&mut self.service_paths),
            "serviceRequestTypes" => Some(&mut self.service_request_types),
            "serviceResponseTypes" => Some(&mut self.service_response_types),
            _ => {
                debug!(section = name, "unknown section in override document");
                None
            }
        }
    }

    /// Effective global base URL: the `baseUrl` scalar, which may itself
    /// be an alias into `environments`; else the `defaultEnv` alias.
    /// Alias resolution is case-insensitive.
    pub fn resolved_global_base_url(&self) -> Option<String> {
        if let Some(raw) = &self.global_base_url {
            if let Some(url) = normalize_base_url(raw) {
                return Some(url);
            }
            return self.environment_url(raw);
        }
        self.default_env
            .as_deref()
            .and_then(|env| self.environment_url(env))
    }

    fn environment_url(&self, name: &str) -> Option<String> {
        self.environments
            .iter()
            .find(|(env, _)| env.eq_ignore_ascii_case(name))
            .and_then(|(_, url)| normalize_base_url(url))
    }

    /// Endpoint-scoped (`service#function`) lookup first, then
    /// service-scoped.
    fn lookup<'a>(
        map: &'a HashMap<String, String>,
        endpoint_key: &str,
        service: &str,
    ) -> Option<&'a str> {
        map.get(endpoint_key)
            .or_else(|| map.get(service))
            .map(String::as_str)
    }

    /// Apply overrides to a scanned endpoint list, producing replacement
    /// values. Precedence per field: endpoint-scoped, then
    /// service-scoped, then global, then the already-resolved value. An
    /// absolute-URL path override additionally forces the base URL — the
    /// single case where a path setting overrides base URL too.
    pub fn apply(&self, endpoints: Vec<Endpoint>) -> Vec<Endpoint> {
        endpoints
            .into_iter()
            .map(|endpoint| self.apply_one(endpoint))
            .collect()
    }

    fn apply_one(&self, mut endpoint: Endpoint) -> Endpoint {
        let endpoint_key = endpoint.key().config_key();
        let service = endpoint.service_fqn.clone();

        // Strict precedence: endpoint override, service override, global
        // base, then whatever the scan already resolved.
        if let Some(base) = Self::lookup(&self.service_base_urls, &endpoint_key, &service)
            .and_then(normalize_base_url)
            .or_else(|| self.resolved_global_base_url())
        {
            endpoint.base_url = Some(base);
        }

        if let Some(path) = Self::lookup(&self.service_paths, &endpoint_key, &service) {
            match split_absolute_url(path) {
                Some((origin, split_path)) => {
                    endpoint.base_url = Some(origin);
                    endpoint.path = split_path;
                }
                None => endpoint.path = normalize_path(path),
            }
        }

        if let Some(ty) = Self::lookup(&self.service_request_types, &endpoint_key, &service) {
            endpoint.request_type = Some(ty.to_string());
        }
        if let Some(ty) = Self::lookup(&self.service_response_types, &endpoint_key, &service) {
            endpoint.response_type = Some(ty.to_string());
        }

        endpoint
    }
}

/// Parsed-document cache keyed by (path, mtime). A changed stamp
/// invalidates the whole document; entries for other paths are untouched.
#[derive(Debug, Default)]
pub struct ConfigCache {
    entries: HashMap<String, (u64, EndpointConfig)>,
}

impl ConfigCache {
    pub fn get_or_parse(&mut self, file: &ConfigFile) -> &EndpointConfig {
        let stale = self
            .entries
            .get(&file.path)
            .map(|(mtime, _)| *mtime != file.mtime)
            .unwrap_or(true);
        if stale {
            debug!(
                path = file.path,
                mtime = file.mtime,
                "reparsing override document"
            );
            self.entries.insert(
                file.path.clone(),
                (file.mtime, EndpointConfig::parse(&file.text)),
            );
        }
        &self.entries.get(&file.path).unwrap().1
    }
}

/// Remove a trailing comment, ignoring `#` characters inside quotes.
fn strip_comment(line: &str) -> &str {
    let mut in_quote: Option<char> = None;
    for (i, c) in line.char_indices() {
        match in_quote {
            Some(quote) if c == quote => in_quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => in_quote = Some(c),
                '#' => return &line[..i],
                _ => {}
            },
        }
    }
    line
}

fn unquote(value: &str) -> String {
    let trimmed = value.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return trimmed[1..trimmed.len() - 1].to_string();
        }
    }
    trimmed.to_string()
}
