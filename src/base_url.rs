//! Base URL Resolution
//!
//! Produces a single best-effort base URL per project, in strict order:
//! override-file scalar, then a source-inferred `baseUrl(...)` call
//! argument, then nothing. Absence is an answer — callers render an
//! explicit unresolved placeholder instead of guessing.

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

use crate::config::EndpointConfig;
use crate::project::Project;
use crate::source_index::SourceTextIndex;
use crate::url::{lookup_constant, strip_string_literal};

/// Where a resolved base URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Config,
    Inferred,
    None,
}

/// Internal resolution result; recomputed lazily after any invalidating
/// change and replaced whole (last-writer-wins).
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBaseUrl {
    pub url: Option<String>,
    pub provenance: Provenance,
}

impl ResolvedBaseUrl {
    fn none() -> Self {
        Self {
            url: None,
            provenance: Provenance::None,
        }
    }
}

/// Normalize a candidate base URL: strip quotes and trailing slash,
/// require an `http(s)://` scheme with a non-empty host. Anything else
/// is not a base URL.
pub fn normalize_base_url(value: &str) -> Option<String> {
    let trimmed = strip_string_literal(value).unwrap_or_else(|| value.trim().to_string());
    let trimmed = trimmed.trim();
    let host = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))?;
    if host.trim_matches('/').is_empty() {
        return None;
    }
    Some(trimmed.trim_end_matches('/').to_string())
}

pub struct BaseUrlResolver {
    base_url_call: Regex,
}

impl BaseUrlResolver {
    pub fn new() -> Self {
        Self {
            base_url_call: Regex::new(r"\bbaseUrl\s*\(\s*([^)]*?)\s*\)").unwrap(),
        }
    }

    /// Uncached resolution over the project snapshot.
    pub fn resolve(&self, project: &dyn Project) -> ResolvedBaseUrl {
        if let Some(url) = self.from_config(project) {
            return ResolvedBaseUrl {
                url: Some(url),
                provenance: Provenance::Config,
            };
        }
        if let Some(url) = self.from_source(project) {
            return ResolvedBaseUrl {
                url: Some(url),
                provenance: Provenance::Inferred,
            };
        }
        ResolvedBaseUrl::none()
    }

    /// Global base URL from the override document, environment aliases
    /// included.
    fn from_config(&self, project: &dyn Project) -> Option<String> {
        let config = project.config_file()?;
        EndpointConfig::parse(&config.text).resolved_global_base_url()
    }

    /// Scan source files for `baseUrl(...)` arguments. A direct string
    /// literal wins; otherwise constant names are resolved by exact or
    /// dotted-suffix match against constants collected project-wide.
    fn from_source(&self, project: &dyn Project) -> Option<String> {
        let mut constants: HashMap<String, String> = HashMap::new();
        let mut literal_args = Vec::new();
        let mut symbol_args = Vec::new();

        for file in project.files() {
            let index = SourceTextIndex::build(&file.name, &file.package, &file.text);
            for (name, value) in index.constants {
                constants.entry(name).or_insert(value);
            }
            for caps in self.base_url_call.captures_iter(&file.text) {
                let arg = caps.get(1).map(|m| m.as_str().trim().to_string());
                let Some(arg) = arg else { continue };
                if arg.is_empty() {
                    continue;
                }
                match strip_string_literal(&arg) {
                    Some(literal) => literal_args.push(literal),
                    None => symbol_args.push(arg),
                }
            }
        }

        for literal in &literal_args {
            if let Some(url) = normalize_base_url(literal) {
                return Some(url);
            }
        }
        for symbol in &symbol_args {
            if let Some(value) = lookup_constant(symbol, &constants) {
                if let Some(url) = normalize_base_url(value) {
                    return Some(url);
                }
            }
        }
        debug!(
            project = project.project_id(),
            "no base URL literal or resolvable constant found in source"
        );
        None
    }
}

impl Default for BaseUrlResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-project resolution cache keyed by (symbol-index version,
/// config-file mtime). A miss for one project never clears another's
/// bucket.
#[derive(Debug, Default)]
pub struct BaseUrlCache {
    entries: HashMap<String, (u64, u64, ResolvedBaseUrl)>,
}

impl BaseUrlCache {
    pub fn resolve(
        &mut self,
        project: &dyn Project,
        resolver: &BaseUrlResolver,
    ) -> ResolvedBaseUrl {
        let index_version = project.modification_count();
        let config_mtime = project.config_file().map(|c| c.mtime).unwrap_or(0);

        if let Some((cached_version, cached_mtime, resolved)) =
            self.entries.get(project.project_id())
        {
            if *cached_version == index_version && *cached_mtime == config_mtime {
                return resolved.clone();
            }
        }

        debug!(
            project = project.project_id(),
            index_version, config_mtime, "recomputing base URL"
        );
        let resolved = resolver.resolve(project);
        self.entries.insert(
            project.project_id().to_string(),
            (index_version, config_mtime, resolved.clone()),
        );
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::MemProject;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("\"https://api.example.com/\""),
            Some("https://api.example.com".to_string())
        );
        assert_eq!(normalize_base_url("ftp://api.example.com"), None);
        assert_eq!(normalize_base_url("dev"), None);
        assert_eq!(normalize_base_url("https://"), None);
        assert_eq!(normalize_base_url("\"http://\""), None);
    }

    #[test]
    fn test_config_scalar_resolves_first() {
        let mut project = MemProject::new("p");
        project.set_config("baseUrl: https://config.example.com/\n");
        project.add_file(
            "Client.kt",
            "com.x",
            "val r = Retrofit.Builder().baseUrl(\"https://source.example.com\")",
        );

        let resolved = BaseUrlResolver::new().resolve(&project);
        assert_eq!(resolved.url.as_deref(), Some("https://config.example.com"));
        assert_eq!(resolved.provenance, Provenance::Config);
    }

    #[test]
    fn test_source_literal_inferred() {
        let mut project = MemProject::new("p");
        project.add_file(
            "Client.kt",
            "com.x",
            "val r = Retrofit.Builder().baseUrl(\"https://source.example.com/\").build()",
        );

        let resolved = BaseUrlResolver::new().resolve(&project);
        assert_eq!(resolved.url.as_deref(), Some("https://source.example.com"));
        assert_eq!(resolved.provenance, Provenance::Inferred);
    }

    #[test]
    fn test_source_constant_resolved_transitively() {
        let mut project = MemProject::new("p");
        project.add_file(
            "Constants.kt",
            "com.x",
            "const val API_BASE = \"https://constant.example.com\"\n",
        );
        project.add_file(
            "Client.kt",
            "com.x",
            "val r = Retrofit.Builder().baseUrl(ApiConstants.API_BASE).build()",
        );

        let resolved = BaseUrlResolver::new().resolve(&project);
        assert_eq!(resolved.url.as_deref(), Some("https://constant.example.com"));
        assert_eq!(resolved.provenance, Provenance::Inferred);
    }

    #[test]
    fn test_unresolvable_constant_degrades_to_none() {
        let mut project = MemProject::new("p");
        project.add_file(
            "Client.kt",
            "com.x",
            "val r = Retrofit.Builder().baseUrl(UNKNOWN_CONST).build()",
        );

        let resolved = BaseUrlResolver::new().resolve(&project);
        assert_eq!(resolved.url, None);
        assert_eq!(resolved.provenance, Provenance::None);
    }

    #[test]
    fn test_cache_invalidated_by_modification_count() {
        let mut project = MemProject::new("p");
        let resolver = BaseUrlResolver::new();
        let mut cache = BaseUrlCache::default();

        let first = cache.resolve(&project, &resolver);
        assert_eq!(first.url, None);

        project.add_file(
            "Client.kt",
            "com.x",
            "Retrofit.Builder().baseUrl(\"https://late.example.com\")",
        );
        let second = cache.resolve(&project, &resolver);
        assert_eq!(second.url.as_deref(), Some("https://late.example.com"));
    }

    #[test]
    fn test_cache_serves_stable_key() {
        let mut project = MemProject::new("p");
        project.add_file(
            "Client.kt",
            "com.x",
            "Retrofit.Builder().baseUrl(\"https://stable.example.com\")",
        );
        let resolver = BaseUrlResolver::new();
        let mut cache = BaseUrlCache::default();

        let first = cache.resolve(&project, &resolver);
        let second = cache.resolve(&project, &resolver);
        assert_eq!(first, second);
    }
}
