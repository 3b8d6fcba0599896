//! Scanning strategies and their composition.
//!
//! Three independent strategies produce candidate endpoints:
//! annotation-driven client definitions, imperative builder chains, and
//! custom wrapper methods. Each is best-effort on its own; the merge step
//! unions them, dedups by identity key with a fixed strategy preference,
//! and sorts deterministically.

pub mod annotations;
pub mod builder_chain;
pub mod wrapper;

use std::collections::BTreeMap;

use tracing::debug;

use crate::endpoint::{Endpoint, compare_endpoints};
use crate::project::Project;
use crate::source_index::SourceTextIndex;
use crate::url::UrlResolver;

/// Which strategy produced a candidate. Order is merge preference:
/// a declarative annotation hit always beats a heuristic one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StrategyKind {
    Annotation,
    BuilderChain,
    WrapperMethod,
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub endpoint: Endpoint,
    pub strategy: StrategyKind,
}

/// Union candidates from all strategies: one endpoint per identity key,
/// strongest strategy wins, output sorted by (service, path, function).
pub fn merge_candidates(candidates: Vec<Candidate>) -> Vec<Endpoint> {
    let mut by_key: BTreeMap<_, Candidate> = BTreeMap::new();
    for candidate in candidates {
        let key = candidate.endpoint.key();
        match by_key.get(&key) {
            Some(existing) if existing.strategy <= candidate.strategy => {
                debug!(?key, "dropping duplicate candidate from weaker strategy");
            }
            _ => {
                by_key.insert(key, candidate);
            }
        }
    }

    let mut endpoints: Vec<Endpoint> = by_key.into_values().map(|c| c.endpoint).collect();
    endpoints.sort_by(compare_endpoints);
    endpoints
}

/// All strategies over one project snapshot. The annotation strategy
/// walks the symbol index; the heuristic strategies walk raw file text
/// through the per-file [`SourceTextIndex`].
pub struct Scanner {
    annotation: annotations::AnnotationScanner,
    builder_chain: builder_chain::BuilderChainScanner,
    wrapper: wrapper::WrapperMethodScanner,
    url_resolver: UrlResolver,
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            annotation: annotations::AnnotationScanner::new(),
            builder_chain: builder_chain::BuilderChainScanner::new(),
            wrapper: wrapper::WrapperMethodScanner::new(),
            url_resolver: UrlResolver::new(),
        }
    }

    /// Run every strategy and merge. `fallback_base` is the project's
    /// resolved base URL, used as origin for relative builder URLs.
    pub fn scan(&self, project: &dyn Project, fallback_base: Option<&str>) -> Vec<Endpoint> {
        let mut candidates = self.annotation.scan(project.symbols());

        for file in project.files() {
            let index = SourceTextIndex::build(&file.name, &file.package, &file.text);
            let builder_hits = self.builder_chain.scan_file(
                &file.text,
                &index,
                &self.url_resolver,
                fallback_base,
            );
            debug!(
                file = file.name,
                hits = builder_hits.len(),
                "builder-chain pass complete"
            );
            candidates.extend(builder_hits);
            candidates.extend(self.wrapper.scan_file(&file.text, &index, fallback_base));
        }

        let mut endpoints = merge_candidates(candidates);
        // Relative endpoints with no base of their own resolve against
        // the project-wide one.
        if let Some(base) = fallback_base {
            for endpoint in &mut endpoints {
                if endpoint.base_url.is_none() && !endpoint.path.starts_with("http") {
                    endpoint.base_url = Some(base.to_string());
                }
            }
        }
        endpoints
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Extract a balanced argument list starting at the opening paren at
/// `open`. Returns the inner text and the index just past the closing
/// paren. Quote-aware so parens inside string literals do not count.
pub(crate) fn balanced_args(text: &str, open: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    if bytes.get(open) != Some(&b'(') {
        return None;
    }

    let mut depth = 0i32;
    let mut in_quote: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let c = bytes[i];
        match in_quote {
            Some(quote) => {
                if c == b'\\' {
                    i += 1;
                } else if c == quote {
                    in_quote = None;
                }
            }
            None => match c {
                b'"' | b'\'' => in_quote = Some(c),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((text[open + 1..i].to_string(), i + 1));
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

/// Split an argument list on top-level commas.
pub(crate) fn split_args(args: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut in_quote: Option<char> = None;

    for c in args.chars() {
        match in_quote {
            Some(quote) => {
                current.push(c);
                if c == quote {
                    in_quote = None;
                }
            }
            None => match c {
                '"' | '\'' => {
                    in_quote = Some(c);
                    current.push(c);
                }
                '(' | '<' | '[' => {
                    depth += 1;
                    current.push(c);
                }
                ')' | '>' | ']' => {
                    depth -= 1;
                    current.push(c);
                }
                ',' if depth == 0 => {
                    parts.push(current.trim().to_string());
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(service: &str, function: &str, method: &str, path: &str) -> Endpoint {
        Endpoint {
            http_method: method.to_string(),
            path: path.to_string(),
            service_fqn: service.to_string(),
            function_name: function.to_string(),
            request_type: None,
            response_type: None,
            base_url: None,
        }
    }

    #[test]
    fn test_merge_dedups_by_identity_key() {
        let annotation_hit = Candidate {
            endpoint: {
                let mut e = endpoint("com.x.Api", "getUser", "GET", "/users/{id}");
                e.response_type = Some("User".to_string());
                e
            },
            strategy: StrategyKind::Annotation,
        };
        let builder_hit = Candidate {
            endpoint: endpoint("com.x.Api", "getUser", "GET", "/users/{id}"),
            strategy: StrategyKind::BuilderChain,
        };

        let merged = merge_candidates(vec![builder_hit, annotation_hit]);
        assert_eq!(merged.len(), 1);
        // The annotation hit's richer record won.
        assert_eq!(merged[0].response_type.as_deref(), Some("User"));
    }

    #[test]
    fn test_merge_sorts_deterministically() {
        let candidates = vec![
            Candidate {
                endpoint: endpoint("com.x.B", "b", "GET", "/b"),
                strategy: StrategyKind::BuilderChain,
            },
            Candidate {
                endpoint: endpoint("com.x.A", "z", "GET", "/z"),
                strategy: StrategyKind::Annotation,
            },
            Candidate {
                endpoint: endpoint("com.x.A", "a", "GET", "/a"),
                strategy: StrategyKind::WrapperMethod,
            },
        ];
        let merged = merge_candidates(candidates);
        let order: Vec<_> = merged
            .iter()
            .map(|e| format!("{}{}", e.service_fqn, e.path))
            .collect();
        assert_eq!(order, vec!["com.x.A/a", "com.x.A/z", "com.x.B/b"]);
    }

    #[test]
    fn test_balanced_args_nested() {
        let text = "url(buildUrl(a, b) + \"/x\")";
        let (args, end) = balanced_args(text, 3).unwrap();
        assert_eq!(args, "buildUrl(a, b) + \"/x\"");
        assert_eq!(end, text.len());
    }

    #[test]
    fn test_balanced_args_quote_aware() {
        let text = "url(\"a)b\")";
        let (args, _) = balanced_args(text, 3).unwrap();
        assert_eq!(args, "\"a)b\"");
    }

    #[test]
    fn test_split_args_top_level_only() {
        assert_eq!(
            split_args("\"DELETE\", body(a, b)"),
            vec!["\"DELETE\"".to_string(), "body(a, b)".to_string()]
        );
    }
}
