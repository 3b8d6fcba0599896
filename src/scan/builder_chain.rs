//! Heuristic Builder-Chain Scanner
//!
//! Recovers endpoints from imperative request-builder code:
//!
//! ```java
//! Request request = new Request.Builder()
//!     .url(BASE_URL + "/users/" + id)
//!     .post(body)
//!     .build();
//! ```
//!
//! Two cooperating passes per candidate file. The function-body pass
//! groups signals per enclosing function (url, verb, explicit
//! `.method(...)` override) even when they sit on separate statements.
//! The block pass finds bounded builder-to-`.build()` slices and is the
//! sole source of truth for chains outside any recognized function span.
//! A third heuristic recognizes wrapper subclasses of the request-method
//! base pattern whose override hook sets the verb. Overlap between
//! passes is harmless: all candidates share one identity key.

use regex::Regex;

use crate::endpoint::Endpoint;
use crate::scan::{Candidate, StrategyKind, balanced_args, split_args};
use crate::source_index::SourceTextIndex;
use crate::url::{UrlResolver, strip_string_literal};

const BUILDER_TYPE: &str = "Request.Builder";
/// Longest slice a builder block may span before we give up on finding
/// its `.build()`.
const MAX_BLOCK_LEN: usize = 2000;

/// Verb/url/body signals collected from one text region.
#[derive(Debug, Default)]
struct ChainSignals {
    url_expr: Option<String>,
    verb: Option<String>,
    body_expr: Option<String>,
}

pub struct BuilderChainScanner {
    url_call: Regex,
    verb_call: Regex,
    method_override: Regex,
    wrapper_class: Regex,
    method_hook: Regex,
    ctor_call: Regex,
}

impl BuilderChainScanner {
    pub fn new() -> Self {
        Self {
            url_call: Regex::new(r"\.url\s*\(").unwrap(),
            verb_call: Regex::new(r"\.(get|post|put|delete|patch|head)\s*\(").unwrap(),
            method_override: Regex::new(r"\.method\s*\(").unwrap(),
            wrapper_class: Regex::new(
                r"class\s+([A-Za-z_][A-Za-z0-9_]*)[^{\n]*?(?:extends|:)\s*[\w.]*RequestBase",
            )
            .unwrap(),
            method_hook: Regex::new(r#"getMethod\s*\(\s*\)[^"{]*\{?[^"]*"([A-Za-z]+)""#).unwrap(),
            ctor_call: Regex::new(r"(?:new\s+)?\b([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap(),
        }
    }

    pub fn scan_file(
        &self,
        text: &str,
        index: &SourceTextIndex,
        urls: &UrlResolver,
        fallback_base: Option<&str>,
    ) -> Vec<Candidate> {
        // Cheap pre-filter before any regex work.
        if !text.contains(BUILDER_TYPE) && !text.contains(".url(") && !text.contains("RequestBase")
        {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        self.scan_function_bodies(text, index, urls, fallback_base, &mut candidates);
        self.scan_builder_blocks(text, index, urls, fallback_base, &mut candidates);
        self.scan_wrapper_subclasses(text, index, urls, fallback_base, &mut candidates);
        candidates
    }

    /// Function-body pass: per-function signal grouping. A function
    /// qualifies only if it names an HTTP verb and visibly touches the
    /// builder type.
    fn scan_function_bodies(
        &self,
        text: &str,
        index: &SourceTextIndex,
        urls: &UrlResolver,
        fallback_base: Option<&str>,
        out: &mut Vec<Candidate>,
    ) {
        for function in &index.functions {
            let body = &text[function.offset..function.end];
            if !body.contains(BUILDER_TYPE) {
                continue;
            }
            let signals = self.collect_signals(body);
            let (Some(url_expr), Some(verb)) = (&signals.url_expr, &signals.verb) else {
                continue;
            };

            let resolved = urls.resolve(url_expr, &index.constants, fallback_base);
            out.push(Candidate {
                endpoint: Endpoint {
                    http_method: verb.clone(),
                    path: resolved.path,
                    service_fqn: index.class_for_offset(function.offset),
                    function_name: function.name.clone(),
                    request_type: infer_body_type(body, verb, signals.body_expr.as_deref()),
                    response_type: None,
                    base_url: resolved.base_url,
                },
                strategy: StrategyKind::BuilderChain,
            });
        }
    }

    /// Block pass: bounded builder-construction-to-`.build()` slices,
    /// attributed to their lexical owner by offset.
    fn scan_builder_blocks(
        &self,
        text: &str,
        index: &SourceTextIndex,
        urls: &UrlResolver,
        fallback_base: Option<&str>,
        out: &mut Vec<Candidate>,
    ) {
        let mut search_from = 0;
        while let Some(found) = text[search_from..].find(BUILDER_TYPE) {
            let start = search_from + found;
            let window_end = (start + MAX_BLOCK_LEN).min(text.len());
            let window = &text[start..window_end];
            let block_end = window
                .find(".build()")
                .map(|i| i + ".build()".len())
                .unwrap_or(window.len());
            let block = &window[..block_end];
            search_from = start + BUILDER_TYPE.len();

            let signals = self.collect_signals(block);
            let Some(url_expr) = &signals.url_expr else {
                continue;
            };
            // A builder block with no explicit verb is a GET.
            let verb = signals.verb.clone().unwrap_or_else(|| "GET".to_string());

            let resolved = urls.resolve(url_expr, &index.constants, fallback_base);
            let (service_fqn, function_name) = index.context_for_offset(start);
            out.push(Candidate {
                endpoint: Endpoint {
                    http_method: verb.clone(),
                    path: resolved.path,
                    service_fqn,
                    function_name,
                    request_type: infer_body_type(block, &verb, signals.body_expr.as_deref()),
                    response_type: None,
                    base_url: resolved.base_url,
                },
                strategy: StrategyKind::BuilderChain,
            });
        }
    }

    /// Wrapper-subclass pass: `class HttpDelete extends HttpRequestBase`
    /// with a `getMethod()` hook returning the verb; each constructor
    /// call's first argument is the URL expression.
    fn scan_wrapper_subclasses(
        &self,
        text: &str,
        index: &SourceTextIndex,
        urls: &UrlResolver,
        fallback_base: Option<&str>,
        out: &mut Vec<Candidate>,
    ) {
        for caps in self.wrapper_class.captures_iter(text) {
            let class_name = caps.get(1).unwrap().as_str();
            let decl_end = caps.get(0).unwrap().end();
            let hook_window = &text[decl_end..(decl_end + 600).min(text.len())];
            let Some(verb) = self
                .method_hook
                .captures(hook_window)
                .map(|c| c[1].to_uppercase())
            else {
                continue;
            };

            for call in self.ctor_call.captures_iter(text) {
                if &call[1] != class_name {
                    continue;
                }
                let whole = call.get(0).unwrap();
                // Skip the class declaration itself.
                if whole.start() >= caps.get(0).unwrap().start() && whole.start() < decl_end {
                    continue;
                }
                let paren = whole.end() - 1;
                let Some((args, _)) = balanced_args(text, paren) else {
                    continue;
                };
                let Some(url_expr) = split_args(&args).into_iter().next() else {
                    continue;
                };

                let resolved = urls.resolve(&url_expr, &index.constants, fallback_base);
                let (service_fqn, function_name) = index.context_for_offset(whole.start());
                out.push(Candidate {
                    endpoint: Endpoint {
                        http_method: verb.clone(),
                        path: resolved.path,
                        service_fqn,
                        function_name,
                        request_type: infer_body_type("", &verb, None),
                        response_type: None,
                        base_url: resolved.base_url,
                    },
                    strategy: StrategyKind::BuilderChain,
                });
            }
        }
    }

    /// Collect url/verb/body signals from a text region. An explicit
    /// `.method("VERB", body)` override wins over a verb method call.
    fn collect_signals(&self, region: &str) -> ChainSignals {
        let mut signals = ChainSignals::default();

        if let Some(m) = self.url_call.find(region) {
            if let Some((args, _)) = balanced_args(region, m.end() - 1) {
                signals.url_expr = Some(args);
            }
        }

        if let Some(caps) = self.verb_call.captures(region) {
            let verb = caps[1].to_uppercase();
            let paren = caps.get(0).unwrap().end() - 1;
            let body_arg = balanced_args(region, paren)
                .map(|(args, _)| args)
                .filter(|a| !a.trim().is_empty() && a.trim() != "null");
            if carries_body(&verb) {
                signals.body_expr = body_arg;
            }
            signals.verb = Some(verb);
        }

        if let Some(m) = self.method_override.find(region) {
            if let Some((args, _)) = balanced_args(region, m.end() - 1) {
                let parts = split_args(&args);
                if let Some(verb) = parts.first().and_then(|p| strip_string_literal(p)) {
                    signals.verb = Some(verb.to_uppercase());
                    signals.body_expr = parts
                        .get(1)
                        .filter(|b| !b.trim().is_empty() && b.trim() != "null")
                        .cloned();
                }
            }
        }

        signals
    }
}

impl Default for BuilderChainScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn carries_body(verb: &str) -> bool {
    matches!(verb, "POST" | "PUT" | "PATCH")
}

/// Body type from textual presence of the known body builder names,
/// else a generic body for verbs that conventionally carry one.
fn infer_body_type(region: &str, verb: &str, body_expr: Option<&str>) -> Option<String> {
    for name in ["MultipartBody", "FormBody", "RequestBody"] {
        if region.contains(name) {
            return Some(name.to_string());
        }
    }
    if carries_body(verb) || body_expr.is_some() {
        return Some("RequestBody".to_string());
    }
    None
}
