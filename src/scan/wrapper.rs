//! Heuristic Wrapper-Method Scanner
//!
//! Last-resort strategy for thin custom wrappers where no `.url(...)`
//! call is visible: the URL arrives through a parameter. If the
//! enclosing function (or, absent that, the class primary constructor)
//! takes a string parameter with a URL-suggestive name, an endpoint with
//! a `{param}` placeholder path is synthesized so the wrapper is not
//! silently dropped. This never overrides a stronger strategy's result.

use regex::Regex;

use crate::endpoint::Endpoint;
use crate::scan::{Candidate, StrategyKind, balanced_args, split_args};
use crate::source_index::SourceTextIndex;

const URL_PARAM_NAMES: [&str; 5] = ["url", "uri", "path", "endpoint", "route"];
const BODY_PARAM_TYPES: [&str; 3] = ["MultipartBody", "FormBody", "RequestBody"];

/// Tokens that mark a function as request-plumbing at all.
const REQUEST_MARKERS: [&str; 3] = ["Request", "newCall", "execute("];

#[derive(Debug, Clone)]
struct TextParam {
    name: String,
    type_text: String,
}

pub struct WrapperMethodScanner {
    class_decl: Regex,
}

impl WrapperMethodScanner {
    pub fn new() -> Self {
        Self {
            class_decl: Regex::new(r"class\s+[A-Za-z_][A-Za-z0-9_]*\s*").unwrap(),
        }
    }

    pub fn scan_file(
        &self,
        text: &str,
        index: &SourceTextIndex,
        fallback_base: Option<&str>,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for function in &index.functions {
            let body = &text[function.offset..function.end];
            if body.contains(".url(") {
                // The builder-chain scanner owns this one.
                continue;
            }
            if !REQUEST_MARKERS.iter().any(|marker| body.contains(marker)) {
                continue;
            }

            let params = function_params(text, function.offset)
                .filter(|p| !p.is_empty())
                .or_else(|| self.constructor_params(text, function.offset));
            let Some(params) = params else { continue };

            let Some(url_param) = params.iter().find(|p| is_url_param(p)) else {
                continue;
            };
            let body_type = params
                .iter()
                .find_map(|p| BODY_PARAM_TYPES.iter().find(|t| p.type_text.contains(**t)))
                .map(|t| t.to_string());

            candidates.push(Candidate {
                endpoint: Endpoint {
                    http_method: if body_type.is_some() { "POST" } else { "GET" }.to_string(),
                    path: format!("/{{{}}}", url_param.name),
                    service_fqn: index.class_for_offset(function.offset),
                    function_name: function.name.clone(),
                    request_type: body_type,
                    response_type: None,
                    base_url: fallback_base.map(|b| b.to_string()),
                },
                strategy: StrategyKind::WrapperMethod,
            });
        }

        candidates
    }

    /// Primary-constructor parameters of the nearest preceding class
    /// declaration.
    fn constructor_params(&self, text: &str, before: usize) -> Option<Vec<TextParam>> {
        let decl = self
            .class_decl
            .find_iter(text)
            .take_while(|m| m.start() <= before)
            .last()?;
        let after = &text[decl.end()..];
        if !after.starts_with('(') {
            return None;
        }
        let (args, _) = balanced_args(text, decl.end())?;
        Some(parse_params(&args))
    }
}

impl Default for WrapperMethodScanner {
    fn default() -> Self {
        Self::new()
    }
}

fn is_url_param(param: &TextParam) -> bool {
    if !param.type_text.contains("String") {
        return false;
    }
    let name = param.name.to_lowercase();
    URL_PARAM_NAMES
        .iter()
        .any(|token| name == *token || name.ends_with(token))
}

/// Parameter list of the function declared at `offset`, parsed from the
/// raw text.
fn function_params(text: &str, offset: usize) -> Option<Vec<TextParam>> {
    let open = text[offset..].find('(')? + offset;
    let (args, _) = balanced_args(text, open)?;
    Some(parse_params(&args))
}

/// Parse `name: Type` (Kotlin) or `Type name` (Java) parameter entries.
fn parse_params(args: &str) -> Vec<TextParam> {
    split_args(args)
        .into_iter()
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            if let Some((name_part, type_part)) = entry.split_once(':') {
                let name = name_part.split_whitespace().last()?.to_string();
                let type_text = type_part.split('=').next().unwrap_or("").trim().to_string();
                Some(TextParam { name, type_text })
            } else {
                let mut words: Vec<&str> = entry.split_whitespace().collect();
                let name = words.pop()?.to_string();
                if words.is_empty() {
                    return None;
                }
                Some(TextParam {
                    name,
                    type_text: words.join(" "),
                })
            }
        })
        .collect()
}
