//! Annotation-Strategy Scanner
//!
//! Walks the host symbol index for methods decorated with the fixed set
//! of HTTP-verb annotations and reads method/path/body/response straight
//! off the declaration. This is the only strategy with declarative
//! ground truth, so its candidates win every merge tie.

use crate::endpoint::{Endpoint, normalize_path};
use crate::project::{MethodSymbol, SymbolIndex};
use crate::scan::{Candidate, StrategyKind};

const VERB_ANNOTATIONS: [&str; 7] = ["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"];
const GENERIC_HTTP_ANNOTATION: &str = "HTTP";
const BODY_ANNOTATION: &str = "Body";

/// Return-type wrappers unwrapped one level: `Call<User>` → `User`.
const RESPONSE_WRAPPERS: [&str; 2] = ["Call", "Response"];

pub struct AnnotationScanner;

impl AnnotationScanner {
    pub fn new() -> Self {
        Self
    }

    pub fn scan(&self, symbols: &dyn SymbolIndex) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for verb in VERB_ANNOTATIONS {
            for method in symbols.methods_annotated_with(verb) {
                let path = method
                    .annotation(verb)
                    .and_then(|a| a.value())
                    .unwrap_or("");
                candidates.push(self.candidate(&method, verb, path));
            }
        }

        // Generic @HTTP carries its verb and path as named attributes;
        // the verb defaults to GET when absent.
        for method in symbols.methods_annotated_with(GENERIC_HTTP_ANNOTATION) {
            let annotation = method.annotation(GENERIC_HTTP_ANNOTATION);
            let verb = annotation
                .and_then(|a| a.attr("method"))
                .unwrap_or("GET")
                .to_uppercase();
            let path = annotation.and_then(|a| a.attr("path")).unwrap_or("");
            candidates.push(self.candidate(&method, &verb, path));
        }

        candidates.sort_by(|a, b| {
            (&a.endpoint.service_fqn, &a.endpoint.path)
                .cmp(&(&b.endpoint.service_fqn, &b.endpoint.path))
        });
        candidates
    }

    fn candidate(&self, method: &MethodSymbol, verb: &str, path: &str) -> Candidate {
        Candidate {
            endpoint: Endpoint {
                http_method: verb.to_uppercase(),
                path: normalize_path(path),
                service_fqn: method.class_fqn.clone(),
                function_name: method.name.clone(),
                request_type: request_type(method),
                response_type: response_type(method),
                base_url: None,
            },
            strategy: StrategyKind::Annotation,
        }
    }
}

impl Default for AnnotationScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Type of the first parameter carrying `@Body`, if any.
fn request_type(method: &MethodSymbol) -> Option<String> {
    method
        .params
        .iter()
        .find(|p| p.annotation(BODY_ANNOTATION).is_some())
        .map(|p| simple_type_name(&p.type_text))
}

/// Response type from the declared return type, unwrapping one level of
/// the known generic wrappers. A suspend-function compiled signature
/// leaves an opaque return type; in that case the trailing
/// `Continuation<? super T>` parameter carries the real one.
fn response_type(method: &MethodSymbol) -> Option<String> {
    let raw = method.return_type.as_deref().unwrap_or("").trim();
    let unwrapped = unwrap_one_level(raw);

    if is_opaque_placeholder(&unwrapped) {
        if let Some(from_continuation) = continuation_type(method) {
            return Some(from_continuation);
        }
    }

    match unwrapped.as_str() {
        "" | "void" | "Void" | "Unit" => None,
        _ if is_opaque_placeholder(&unwrapped) => None,
        _ => Some(unwrapped),
    }
}

fn unwrap_one_level(raw: &str) -> String {
    if let Some((outer, rest)) = raw.split_once('<') {
        if let Some(inner) = rest.strip_suffix('>') {
            let simple = outer.rsplit('.').next().unwrap_or(outer).trim();
            if RESPONSE_WRAPPERS.contains(&simple) {
                return inner.trim().to_string();
            }
        }
    }
    raw.to_string()
}

fn is_opaque_placeholder(ty: &str) -> bool {
    matches!(
        ty.trim_end_matches('?'),
        "Object" | "java.lang.Object" | "Any" | "kotlin.Any"
    )
}

/// Unwrap the type argument of a trailing continuation parameter,
/// stripping variance prefixes (`? super `, `in `, `out `).
fn continuation_type(method: &MethodSymbol) -> Option<String> {
    let last = method.params.last()?;
    let ty = last.type_text.trim();
    let start = ty.find("Continuation<")?;
    let inner = ty[start + "Continuation<".len()..]
        .strip_suffix('>')?
        .trim();
    let inner = inner
        .strip_prefix("? super ")
        .or_else(|| inner.strip_prefix("? extends "))
        .or_else(|| inner.strip_prefix("in "))
        .or_else(|| inner.strip_prefix("out "))
        .unwrap_or(inner)
        .trim();
    let unwrapped = unwrap_one_level(inner);
    if unwrapped.is_empty() || is_opaque_placeholder(&unwrapped) {
        None
    } else {
        Some(unwrapped)
    }
}

fn simple_type_name(ty: &str) -> String {
    ty.trim().to_string()
}
