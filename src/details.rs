//! Per-Endpoint Detail Resolver
//!
//! On-demand enrichment for one already-discovered endpoint: parameter
//! lists per category, auth requirement, and best-effort JSON sample
//! payloads. Re-derives everything from the declaring method rather than
//! trusting scan-time leftovers, so details stay correct after edits.

use std::collections::HashMap;

use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::endpoint::{Endpoint, EndpointKey, normalize_path};
use crate::project::{ClassSymbol, MethodSymbol, Project, SymbolIndex};
use crate::scan::balanced_args;
use crate::source_index::SourceTextIndex;
use crate::url::strip_string_literal;

const AUTHORIZATION_HEADER: &str = "Authorization";
/// Recursion cap for sample payload trees.
const MAX_SAMPLE_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuthRequirement {
    None,
    Optional,
    Required,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub type_text: String,
}

/// One parameter category. `has_dynamic_entries` marks map-typed
/// parameters whose key set is unknown at scan time.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParamList {
    pub entries: Vec<Parameter>,
    pub has_dynamic_entries: bool,
}

impl ParamList {
    fn push(&mut self, name: &str, type_text: &str) {
        self.entries.push(Parameter {
            name: name.to_string(),
            type_text: type_text.to_string(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && !self.has_dynamic_entries
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EndpointDocDetails {
    /// Which style produced the record ("annotation" or "builder").
    pub provider: String,
    pub file: String,
    pub line: u32,
    pub path_params: ParamList,
    pub query_params: ParamList,
    pub header_params: ParamList,
    pub field_params: ParamList,
    pub part_params: ParamList,
    pub auth: AuthRequirement,
    /// True when the URL expression could not be fully resolved.
    pub is_dynamic_url: bool,
    pub request_sample: Option<String>,
    pub response_sample: Option<String>,
}

impl EndpointDocDetails {
    fn empty(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            file: String::new(),
            line: 0,
            path_params: ParamList::default(),
            query_params: ParamList::default(),
            header_params: ParamList::default(),
            field_params: ParamList::default(),
            part_params: ParamList::default(),
            auth: AuthRequirement::None,
            is_dynamic_url: false,
            request_sample: None,
            response_sample: None,
        }
    }
}

pub struct DetailResolver {
    header_call: Regex,
    form_part: Regex,
    form_add: Regex,
    query_key: Regex,
    path_token: Regex,
    url_call: Regex,
}

impl DetailResolver {
    pub fn new() -> Self {
        Self {
            header_call: Regex::new(r#"\.(?:addHeader|header)\s*\(\s*"([^"]+)"\s*,\s*([^)]*)\)"#)
                .unwrap(),
            form_part: Regex::new(r#"\.addFormDataPart\s*\(\s*"([^"]+)""#).unwrap(),
            form_add: Regex::new(r#"\.add\s*\(\s*"([^"]+)"\s*,"#).unwrap(),
            query_key: Regex::new(r"[?&]([A-Za-z_][A-Za-z0-9_]*)=").unwrap(),
            path_token: Regex::new(r"\{(\w+)\}").unwrap(),
            url_call: Regex::new(r"\.url\s*\(").unwrap(),
        }
    }

    pub fn resolve(&self, project: &dyn Project, endpoint: &Endpoint) -> EndpointDocDetails {
        let symbols = project.symbols();

        if let Some((class, method)) = locate_declaring_method(symbols, endpoint) {
            if has_verb_annotation(&method) {
                let mut details = self.from_annotations(&class, &method);
                self.attach_samples(symbols, endpoint, &mut details);
                return details;
            }
            if let Some(body) = method.body.clone() {
                let mut details = self.from_body_text(&body, endpoint);
                details.file = method.file.clone();
                details.line = method.line;
                self.attach_samples(symbols, endpoint, &mut details);
                return details;
            }
        }

        // No symbol-index hit: fall back to a raw-text search for the
        // declaring function.
        if let Some((file, line, body)) = locate_in_files(project, endpoint) {
            let mut details = self.from_body_text(&body, endpoint);
            details.file = file;
            details.line = line;
            self.attach_samples(symbols, endpoint, &mut details);
            return details;
        }

        debug!(
            service = endpoint.service_fqn,
            function = endpoint.function_name,
            "declaring method not found; returning empty details"
        );
        let mut details = EndpointDocDetails::empty("builder");
        self.collect_path_tokens(&endpoint.path, &mut details);
        details
    }

    /// Declarative branch: parameter annotations plus static `@Headers`
    /// literals merged from class and method level.
    fn from_annotations(&self, class: &ClassSymbol, method: &MethodSymbol) -> EndpointDocDetails {
        let mut details = EndpointDocDetails::empty("annotation");
        details.file = method.file.clone();
        details.line = method.line;

        for param in &method.params {
            for annotation in &param.annotations {
                let name = annotation.value().unwrap_or(&param.name);
                match annotation.name.as_str() {
                    "Path" => details.path_params.push(name, &param.type_text),
                    "Query" => details.query_params.push(name, &param.type_text),
                    "QueryMap" => details.query_params.has_dynamic_entries = true,
                    "Header" => details.header_params.push(name, &param.type_text),
                    "HeaderMap" => details.header_params.has_dynamic_entries = true,
                    "Field" => details.field_params.push(name, &param.type_text),
                    "FieldMap" => details.field_params.has_dynamic_entries = true,
                    "Part" => details.part_params.push(name, &param.type_text),
                    "PartMap" => details.part_params.has_dynamic_entries = true,
                    "Url" => details.is_dynamic_url = true,
                    _ => {}
                }
            }
        }

        // Static header literals ("Name: value") at either level.
        for annotation in class
            .annotations
            .iter()
            .chain(method.annotations.iter())
            .filter(|a| a.name == "Headers")
        {
            for literal in &annotation.positional {
                if let Some((name, value)) = literal.split_once(':') {
                    details.header_params.push(name.trim(), value.trim());
                }
            }
        }

        details.auth = auth_requirement(&details.header_params);
        details
    }

    /// Heuristic branch: re-scan the method's raw text.
    fn from_body_text(&self, body: &str, endpoint: &Endpoint) -> EndpointDocDetails {
        let mut details = EndpointDocDetails::empty("builder");

        if let Some(m) = self.url_call.find(body) {
            if let Some((arg, _)) = balanced_args(body, m.end() - 1) {
                let literal = strip_string_literal(arg.trim());
                // Interior quotes mean the argument was a concatenation,
                // not a single literal.
                details.is_dynamic_url = literal
                    .as_ref()
                    .map(|l| l.contains('$') || l.contains('"'))
                    .unwrap_or(true);
                if let Some(literal) = literal {
                    for caps in self.query_key.captures_iter(&literal) {
                        details.query_params.push(&caps[1], "String");
                    }
                }
            }
        }

        for caps in self.header_call.captures_iter(body) {
            let value = caps[2].trim();
            let type_text = strip_string_literal(value)
                .unwrap_or_else(|| "dynamic".to_string());
            details.header_params.push(&caps[1], &type_text);
        }
        if body.contains(".headers(") {
            details.header_params.has_dynamic_entries = true;
        }

        for caps in self.form_part.captures_iter(body) {
            details.part_params.push(&caps[1], "String");
        }
        if body.contains("FormBody") {
            for caps in self.form_add.captures_iter(body) {
                details.field_params.push(&caps[1], "String");
            }
        }

        self.collect_path_tokens(&endpoint.path, &mut details);
        details.auth = auth_requirement(&details.header_params);
        details
    }

    fn collect_path_tokens(&self, path: &str, details: &mut EndpointDocDetails) {
        for caps in self.path_token.captures_iter(path) {
            details.path_params.push(&caps[1], "String");
        }
    }

    fn attach_samples(
        &self,
        symbols: &dyn SymbolIndex,
        endpoint: &Endpoint,
        details: &mut EndpointDocDetails,
    ) {
        details.request_sample = endpoint
            .request_type
            .as_deref()
            .and_then(|ty| sample_for_type(symbols, &endpoint.service_fqn, ty));
        details.response_sample = endpoint
            .response_type
            .as_deref()
            .and_then(|ty| sample_for_type(symbols, &endpoint.service_fqn, ty));
    }
}

impl Default for DetailResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Auth is required when an `Authorization` header is present by name,
/// optional when only a dynamic header map could carry one.
fn auth_requirement(headers: &ParamList) -> AuthRequirement {
    if headers
        .entries
        .iter()
        .any(|h| h.name.eq_ignore_ascii_case(AUTHORIZATION_HEADER))
    {
        return AuthRequirement::Required;
    }
    if headers.has_dynamic_entries {
        return AuthRequirement::Optional;
    }
    AuthRequirement::None
}

fn has_verb_annotation(method: &MethodSymbol) -> bool {
    const VERBS: [&str; 8] = [
        "GET", "POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS", "HTTP",
    ];
    method.annotations.iter().any(|a| VERBS.contains(&a.name.as_str()))
}

/// Prefer the method whose independently-recomputed verb and path match
/// the endpoint exactly; fall back to any method with the same name.
fn locate_declaring_method(
    symbols: &dyn SymbolIndex,
    endpoint: &Endpoint,
) -> Option<(ClassSymbol, MethodSymbol)> {
    let class = symbols.find_class(&endpoint.service_fqn)?;
    let same_name: Vec<&MethodSymbol> = class
        .methods
        .iter()
        .filter(|m| m.name == endpoint.function_name)
        .collect();

    let exact = same_name.iter().find(|m| {
        m.annotations.iter().any(|a| {
            let verb_matches = a.name.eq_ignore_ascii_case(&endpoint.http_method)
                || a.attr("method")
                    .map(|v| v.eq_ignore_ascii_case(&endpoint.http_method))
                    .unwrap_or(false);
            let path = a.attr("path").or_else(|| a.value()).unwrap_or("");
            verb_matches && normalize_path(path) == endpoint.path
        })
    });

    let method = exact.or(same_name.first())?;
    Some((class.clone(), (*method).clone()))
}

/// Raw-text fallback: find the named function in the named class across
/// project files and return (file, line, body text).
fn locate_in_files(project: &dyn Project, endpoint: &Endpoint) -> Option<(String, u32, String)> {
    for file in project.files() {
        let index = SourceTextIndex::build(&file.name, &file.package, &file.text);
        for function in &index.functions {
            if function.name != endpoint.function_name {
                continue;
            }
            if index.class_for_offset(function.offset) != endpoint.service_fqn {
                continue;
            }
            let line = file.text[..function.offset].matches('\n').count() as u32 + 1;
            let body = file.text[function.offset..function.end].to_string();
            return Some((file.name.clone(), line, body));
        }
    }
    None
}

/// Build a pretty-printed JSON example for a named type by walking its
/// fields through the symbol index, depth-capped.
fn sample_for_type(symbols: &dyn SymbolIndex, service_fqn: &str, type_name: &str) -> Option<String> {
    let class = resolve_type(symbols, service_fqn, type_name)?;
    let value = sample_object(symbols, service_fqn, &class, MAX_SAMPLE_DEPTH);
    serde_json::to_string_pretty(&value).ok()
}

fn resolve_type(
    symbols: &dyn SymbolIndex,
    service_fqn: &str,
    type_name: &str,
) -> Option<ClassSymbol> {
    if let Some(class) = symbols.find_class(type_name) {
        return Some(class);
    }
    // Try the service's own package.
    let package = service_fqn.rsplit_once('.').map(|(p, _)| p)?;
    symbols.find_class(&format!("{}.{}", package, type_name))
}

fn sample_object(
    symbols: &dyn SymbolIndex,
    service_fqn: &str,
    class: &ClassSymbol,
    depth: usize,
) -> Value {
    if depth == 0 {
        return Value::Null;
    }
    let mut map = serde_json::Map::new();
    for field in &class.fields {
        map.insert(
            field.name.clone(),
            sample_value(symbols, service_fqn, &field.name, &field.type_text, depth),
        );
    }
    Value::Object(map)
}

fn sample_value(
    symbols: &dyn SymbolIndex,
    service_fqn: &str,
    field_name: &str,
    type_text: &str,
    depth: usize,
) -> Value {
    let ty = type_text.trim().trim_end_matches('?');

    if let Some(inner) = element_type(ty) {
        return json!([sample_value(symbols, service_fqn, field_name, inner, depth)]);
    }

    match ty {
        "String" | "java.lang.String" | "CharSequence" => {
            Value::String(example_string(field_name))
        }
        "Int" | "Integer" | "int" | "Long" | "long" | "Short" | "short" => json!(1),
        "Double" | "double" | "Float" | "float" | "BigDecimal" => json!(1.0),
        "Boolean" | "boolean" => json!(true),
        _ if ty.starts_with("Map<") || ty.starts_with("HashMap<") => json!({}),
        _ => match resolve_type(symbols, service_fqn, ty) {
            Some(class) => sample_object(symbols, service_fqn, &class, depth - 1),
            None => Value::Null,
        },
    }
}

fn element_type(ty: &str) -> Option<&str> {
    for prefix in ["List<", "MutableList<", "Set<", "ArrayList<", "Collection<"] {
        if let Some(rest) = ty.strip_prefix(prefix) {
            return rest.strip_suffix('>');
        }
    }
    None
}

/// Field-name driven example values, so samples read plausibly.
fn example_string(field_name: &str) -> String {
    let name = field_name.to_lowercase();
    if name.contains("email") {
        "user@example.com".to_string()
    } else if name.contains("url") || name.contains("uri") {
        "https://example.com".to_string()
    } else if name.contains("date") || name.contains("time") {
        "2024-01-01T00:00:00Z".to_string()
    } else if name.ends_with("id") {
        "1".to_string()
    } else if name.contains("name") {
        "example".to_string()
    } else {
        "string".to_string()
    }
}

/// Bounded per-endpoint details cache keyed by (index version, endpoint
/// key). When full it clears wholesale instead of evicting individual
/// entries; re-population is cheap relative to the correctness risk of a
/// partial-eviction bug.
#[derive(Debug, Default)]
pub struct DetailCache {
    entries: HashMap<(u64, EndpointKey), EndpointDocDetails>,
    capacity: usize,
}

impl DetailCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
        }
    }

    pub fn get(&self, version: u64, key: &EndpointKey) -> Option<&EndpointDocDetails> {
        self.entries.get(&(version, key.clone()))
    }

    pub fn put(&mut self, version: u64, key: EndpointKey, details: EndpointDocDetails) {
        if self.entries.len() >= self.capacity.max(1) {
            debug!(len = self.entries.len(), "detail cache full, clearing wholesale");
            self.entries.clear();
        }
        self.entries.insert((version, key), details);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::{AnnotationUse, FieldSymbol, MemProject, ParamSymbol};

    fn annotated_project() -> MemProject {
        let mut project = MemProject::new("p");

        let mut api = ClassSymbol::new("com.x.Api");
        api.annotations
            .push(AnnotationUse::with_value("Headers", "Accept: application/json"));
        api.methods.push(MethodSymbol {
            class_fqn: "com.x.Api".to_string(),
            name: "getUser".to_string(),
            return_type: Some("Call<User>".to_string()),
            params: vec![
                ParamSymbol {
                    name: "id".to_string(),
                    type_text: "String".to_string(),
                    annotations: vec![AnnotationUse::with_value("Path", "id")],
                },
                ParamSymbol {
                    name: "verbose".to_string(),
                    type_text: "Boolean".to_string(),
                    annotations: vec![AnnotationUse::with_value("Query", "verbose")],
                },
                ParamSymbol {
                    name: "token".to_string(),
                    type_text: "String".to_string(),
                    annotations: vec![AnnotationUse::with_value("Header", "Authorization")],
                },
            ],
            annotations: vec![AnnotationUse::with_value("GET", "users/{id}")],
            file: "Api.kt".to_string(),
            line: 10,
            body: None,
        });
        project.add_class(api);

        let mut user = ClassSymbol::new("com.x.User");
        user.fields = vec![
            FieldSymbol {
                name: "userId".to_string(),
                type_text: "String".to_string(),
            },
            FieldSymbol {
                name: "email".to_string(),
                type_text: "String".to_string(),
            },
            FieldSymbol {
                name: "active".to_string(),
                type_text: "Boolean".to_string(),
            },
        ];
        project.add_class(user);
        project
    }

    fn get_user_endpoint() -> Endpoint {
        Endpoint {
            http_method: "GET".to_string(),
            path: "/users/{id}".to_string(),
            service_fqn: "com.x.Api".to_string(),
            function_name: "getUser".to_string(),
            request_type: None,
            response_type: Some("User".to_string()),
            base_url: None,
        }
    }

    #[test]
    fn test_declarative_params_and_headers() {
        let project = annotated_project();
        let details = DetailResolver::new().resolve(&project, &get_user_endpoint());

        assert_eq!(details.provider, "annotation");
        assert_eq!(details.file, "Api.kt");
        assert_eq!(details.line, 10);
        assert_eq!(details.path_params.entries[0].name, "id");
        assert_eq!(details.query_params.entries[0].name, "verbose");
        // Class-level static header merged in.
        assert!(
            details
                .header_params
                .entries
                .iter()
                .any(|h| h.name == "Accept")
        );
        assert_eq!(details.auth, AuthRequirement::Required);
    }

    #[test]
    fn test_response_sample_from_fields() {
        let project = annotated_project();
        let details = DetailResolver::new().resolve(&project, &get_user_endpoint());

        let sample = details.response_sample.expect("sample generated");
        let value: Value = serde_json::from_str(&sample).unwrap();
        assert_eq!(value["userId"], json!("1"));
        assert_eq!(value["email"], json!("user@example.com"));
        assert_eq!(value["active"], json!(true));
    }

    #[test]
    fn test_header_map_without_authorization_is_optional() {
        let mut project = MemProject::new("p");
        let mut api = ClassSymbol::new("com.x.Api");
        api.methods.push(MethodSymbol {
            class_fqn: "com.x.Api".to_string(),
            name: "list".to_string(),
            return_type: None,
            params: vec![ParamSymbol {
                name: "headers".to_string(),
                type_text: "Map<String, String>".to_string(),
                annotations: vec![AnnotationUse::new("HeaderMap")],
            }],
            annotations: vec![AnnotationUse::with_value("GET", "items")],
            file: "Api.kt".to_string(),
            line: 3,
            body: None,
        });
        project.add_class(api);

        let endpoint = Endpoint {
            http_method: "GET".to_string(),
            path: "/items".to_string(),
            service_fqn: "com.x.Api".to_string(),
            function_name: "list".to_string(),
            request_type: None,
            response_type: None,
            base_url: None,
        };
        let details = DetailResolver::new().resolve(&project, &endpoint);
        assert!(details.header_params.has_dynamic_entries);
        assert_eq!(details.auth, AuthRequirement::Optional);
    }

    #[test]
    fn test_heuristic_branch_from_file_text() {
        let mut project = MemProject::new("p");
        project.add_file(
            "Client.kt",
            "com.x",
            r#"
class Client {
    fun search(term: String) {
        val request = Request.Builder()
            .url("https://h/search?q=" + term + "&limit=10")
            .addHeader("Authorization", token)
            .addHeader("Accept", "application/json")
            .get()
            .build()
    }
}
"#,
        );

        let endpoint = Endpoint {
            http_method: "GET".to_string(),
            path: "/search?q={term}&limit=10".to_string(),
            service_fqn: "com.x.Client".to_string(),
            function_name: "search".to_string(),
            request_type: None,
            response_type: None,
            base_url: Some("https://h".to_string()),
        };
        let details = DetailResolver::new().resolve(&project, &endpoint);

        assert_eq!(details.provider, "builder");
        assert!(details.is_dynamic_url);
        assert!(
            details
                .header_params
                .entries
                .iter()
                .any(|h| h.name == "Authorization")
        );
        assert_eq!(details.auth, AuthRequirement::Required);
        assert_eq!(details.path_params.entries[0].name, "term");
    }

    #[test]
    fn test_multipart_field_names_extracted() {
        let mut project = MemProject::new("p");
        project.add_file(
            "Uploads.kt",
            "com.x",
            r#"
class Uploads {
    fun upload(file: File) {
        val body = MultipartBody.Builder()
            .addFormDataPart("file", file.name)
            .addFormDataPart("caption", caption)
            .build()
        val request = Request.Builder().url("https://h/upload").post(body).build()
    }
}
"#,
        );

        let endpoint = Endpoint {
            http_method: "POST".to_string(),
            path: "/upload".to_string(),
            service_fqn: "com.x.Uploads".to_string(),
            function_name: "upload".to_string(),
            request_type: Some("MultipartBody".to_string()),
            response_type: None,
            base_url: Some("https://h".to_string()),
        };
        let details = DetailResolver::new().resolve(&project, &endpoint);

        let part_names: Vec<_> = details
            .part_params
            .entries
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(part_names, vec!["file", "caption"]);
        assert!(!details.is_dynamic_url);
    }

    #[test]
    fn test_detail_cache_clears_wholesale() {
        let mut cache = DetailCache::with_capacity(2);
        let details = EndpointDocDetails::empty("annotation");
        let key = |n: &str| EndpointKey {
            http_method: "GET".to_string(),
            path: format!("/{}", n),
            service_fqn: "com.x.Api".to_string(),
            function_name: n.to_string(),
        };

        cache.put(1, key("a"), details.clone());
        cache.put(1, key("b"), details.clone());
        assert!(cache.get(1, &key("a")).is_some());

        // Third insert clears everything first.
        cache.put(1, key("c"), details);
        assert!(cache.get(1, &key("a")).is_none());
        assert!(cache.get(1, &key("c")).is_some());
    }

    #[test]
    fn test_version_keyed_entries() {
        let mut cache = DetailCache::with_capacity(16);
        let key = EndpointKey {
            http_method: "GET".to_string(),
            path: "/a".to_string(),
            service_fqn: "com.x.Api".to_string(),
            function_name: "a".to_string(),
        };
        cache.put(1, key.clone(), EndpointDocDetails::empty("annotation"));
        assert!(cache.get(1, &key).is_some());
        assert!(cache.get(2, &key).is_none());
    }
}
