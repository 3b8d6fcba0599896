//! URL Expression Resolution
//!
//! Shared logic for turning a builder-chain URL argument into something
//! matchable. The same expression grammar shows up in every heuristic
//! strategy, so it lives here once:
//!
//! 1. Direct string literals: `"https://h/users"` → used verbatim
//! 2. Concatenation: `BASE + "/users/" + id` → constants resolved,
//!    unresolved tokens become `{id}` placeholders
//! 3. String templates: `"$BASE/users/${user.id}"` → `{id}` placeholders
//!    (constants tried first)
//! 4. Absolute results split into (origin, path+query); relative results
//!    become the path with the project's inferred base URL as fallback

use std::collections::HashMap;

use regex::Regex;

/// Outcome of resolving one URL expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedUrl {
    /// Path plus query string, single leading `/`.
    pub path: String,
    /// Absolute origin when the expression resolved to a full URL,
    /// otherwise the supplied fallback.
    pub base_url: Option<String>,
    /// Whether any part of the expression stayed unresolved at scan time.
    pub is_dynamic: bool,
}

/// Resolves URL argument expressions against a per-file constant table.
#[derive(Debug)]
pub struct UrlResolver {
    template_expr: Regex,
    trailing_ident: Regex,
}

impl UrlResolver {
    pub fn new() -> Self {
        Self {
            template_expr: Regex::new(r"\$\{([^}]+)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
            trailing_ident: Regex::new(r"([A-Za-z_][A-Za-z0-9_]*)\s*(?:\(\s*\))?$").unwrap(),
        }
    }

    /// Resolve a raw `.url(...)` argument expression.
    pub fn resolve(
        &self,
        expr: &str,
        constants: &HashMap<String, String>,
        fallback_base: Option<&str>,
    ) -> ResolvedUrl {
        let trimmed = expr.trim();
        let mut dynamic = false;

        let mut resolved = String::new();
        for token in split_concat(trimmed) {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            if let Some(literal) = strip_string_literal(token) {
                let expanded = self.expand_templates(&literal, constants, &mut dynamic);
                resolved.push_str(&expanded);
            } else if let Some(value) = lookup_constant(token, constants) {
                resolved.push_str(value);
            } else {
                dynamic = true;
                resolved.push_str(&self.placeholder_for(token));
            }
        }

        self.finish(resolved, dynamic, fallback_base)
    }

    fn finish(&self, resolved: String, dynamic: bool, fallback_base: Option<&str>) -> ResolvedUrl {
        if let Some((origin, path)) = split_absolute_url(&resolved) {
            return ResolvedUrl {
                path,
                base_url: Some(origin),
                is_dynamic: dynamic,
            };
        }

        let path = if resolved.is_empty() {
            "/".to_string()
        } else if resolved.starts_with('/') {
            resolved
        } else {
            format!("/{}", resolved)
        };

        ResolvedUrl {
            path,
            base_url: fallback_base.map(|b| b.to_string()),
            is_dynamic: dynamic,
        }
    }

    /// Convert `${expr}` / `$name` template pieces inside a literal,
    /// resolving against constants before falling back to a placeholder.
    fn expand_templates(
        &self,
        literal: &str,
        constants: &HashMap<String, String>,
        dynamic: &mut bool,
    ) -> String {
        if !literal.contains('$') {
            return literal.to_string();
        }

        let mut result = String::new();
        let mut last = 0;
        for caps in self.template_expr.captures_iter(literal) {
            let whole = caps.get(0).unwrap();
            result.push_str(&literal[last..whole.start()]);
            last = whole.end();

            let inner = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or("");
            if let Some(value) = lookup_constant(inner, constants) {
                result.push_str(value);
            } else {
                *dynamic = true;
                result.push_str(&self.placeholder_for(inner));
            }
        }
        result.push_str(&literal[last..]);
        result
    }

    /// `{name}` segment for an unresolved expression, named after its
    /// trailing identifier (`user.getId()` → `{getId}`, `id` → `{id}`).
    fn placeholder_for(&self, expr: &str) -> String {
        let name = self
            .trailing_ident
            .captures(expr.trim())
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "param".to_string());
        format!("{{{}}}", name)
    }
}

impl Default for UrlResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Split an absolute URL into (origin, path+query). Origin keeps scheme,
/// host and port with no trailing slash; a bare origin maps to path `/`.
pub fn split_absolute_url(url: &str) -> Option<(String, String)> {
    let rest = url
        .strip_prefix("https://")
        .map(|r| ("https://", r))
        .or_else(|| url.strip_prefix("http://").map(|r| ("http://", r)))?;

    let (scheme, after) = rest;
    match after.find('/') {
        Some(slash_idx) => {
            let origin = format!("{}{}", scheme, &after[..slash_idx]);
            let path = after[slash_idx..].to_string();
            Some((origin, path))
        }
        None => Some((format!("{}{}", scheme, after), "/".to_string())),
    }
}

/// Strip surrounding quotes from a string-literal token, if it is one.
pub fn strip_string_literal(token: &str) -> Option<String> {
    let trimmed = token.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return Some(trimmed[1..trimmed.len() - 1].to_string());
        }
    }
    None
}

/// Look up a constant by exact name or dotted-suffix match in either
/// direction (`ApiConstants.BASE_URL` finds `BASE_URL`; `BASE_URL` finds
/// `com.x.ApiConstants.BASE_URL`).
pub fn lookup_constant<'a>(name: &str, constants: &'a HashMap<String, String>) -> Option<&'a str> {
    let name = name.trim();
    if let Some(value) = constants.get(name) {
        return Some(value);
    }
    if let Some(last) = name.rsplit('.').next() {
        if last != name {
            if let Some(value) = constants.get(last) {
                return Some(value);
            }
        }
    }
    constants
        .iter()
        .find(|(key, _)| key.ends_with(&format!(".{}", name)))
        .map(|(_, value)| value.as_str())
}

/// Split a concatenation expression on top-level `+`, ignoring `+` inside
/// quoted strings or parentheses.
fn split_concat(expr: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quote: Option<char> = None;

    for c in expr.chars() {
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
                '(' | '[' => {
                    depth += 1;
                    current.push(c);
                }
                ')' | ']' => {
                    depth = depth.saturating_sub(1);
                    current.push(c);
                }
                '+' if depth == 0 => {
                    tokens.push(current.clone());
                    current.clear();
                }
                _ => current.push(c),
            },
        }
    }
    tokens.push(current);
    tokens
}
