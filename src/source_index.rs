//! Source Text Index
//!
//! One-pass, per-file structural index over raw source text: class and
//! function declaration offsets, declared return types where visible, and
//! simple single-assignment string constants. No semantic resolution.
//!
//! Attribution uses the nearest-preceding-declaration rule: the enclosing
//! class/function of an offset is the last one declared at or before it.
//! That is a deliberate approximation that holds for well-formed code and
//! avoids a real parser.

use std::collections::HashMap;

use regex::Regex;

#[derive(Debug, Clone)]
pub struct FunctionDecl {
    pub offset: usize,
    /// Exclusive end of the lexical region attributed to this function.
    pub end: usize,
    pub name: String,
    pub return_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SourceTextIndex {
    pub file_name: String,
    pub package_name: String,
    /// Ordered (offset, class name) pairs.
    pub classes: Vec<(usize, String)>,
    /// Ordered function declarations.
    pub functions: Vec<FunctionDecl>,
    /// Bare constant name -> string value.
    pub constants: HashMap<String, String>,
}

impl SourceTextIndex {
    pub fn build(file_name: &str, package_name: &str, text: &str) -> Self {
        let class_pattern = Regex::new(
            r"(?m)^\s*(?:(?:public|private|protected|internal|abstract|final|open|data|sealed|static)\s+)*(?:class|interface|object|enum)\s+([A-Za-z_][A-Za-z0-9_]*)",
        )
        .unwrap();
        let kotlin_fn_pattern = Regex::new(
            r"(?:^|\n)\s*(?:(?:public|private|protected|internal|open|override|suspend|inline|operator)\s+)*fun\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(",
        )
        .unwrap();
        let java_method_pattern = Regex::new(
            r"(?m)^\s*(?:(?:public|protected|private|static|final|abstract|default|synchronized|native)\s+)+([A-Za-z_][\w.]*(?:<[^;{}()=]*>)?(?:\[\])?)\s+([A-Za-z_][A-Za-z0-9_]*)\s*\(",
        )
        .unwrap();
        let kotlin_const_pattern = Regex::new(
            r#"(?:const\s+)?val\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?::\s*String\s*)?=\s*"([^"\n]*)""#,
        )
        .unwrap();
        let java_const_pattern = Regex::new(
            r#"(?:static\s+final|final\s+static|static|final)\s+String\s+([A-Za-z_][A-Za-z0-9_]*)\s*=\s*"([^"\n]*)""#,
        )
        .unwrap();

        let mut classes = Vec::new();
        for caps in class_pattern.captures_iter(text) {
            let m = caps.get(1).unwrap();
            classes.push((m.start(), m.as_str().to_string()));
        }

        let mut functions = Vec::new();
        for caps in kotlin_fn_pattern.captures_iter(text) {
            let m = caps.get(1).unwrap();
            functions.push(FunctionDecl {
                offset: m.start(),
                end: text.len(),
                name: m.as_str().to_string(),
                return_type: kotlin_return_type(text, m.end()),
            });
        }
        for caps in java_method_pattern.captures_iter(text) {
            let return_type = caps.get(1).unwrap().as_str().trim().to_string();
            // Skip constructor-like and control-flow false positives.
            if matches!(return_type.as_str(), "new" | "return" | "throw" | "else") {
                continue;
            }
            let m = caps.get(2).unwrap();
            functions.push(FunctionDecl {
                offset: m.start(),
                end: text.len(),
                name: m.as_str().to_string(),
                return_type: Some(return_type),
            });
        }
        functions.sort_by_key(|f| f.offset);
        functions.dedup_by_key(|f| f.offset);

        // A function's region ends where the next declaration starts.
        let boundaries: Vec<usize> = functions.iter().map(|f| f.offset).collect();
        for (i, function) in functions.iter_mut().enumerate() {
            if let Some(next) = boundaries.get(i + 1) {
                function.end = *next;
            }
        }

        let mut constants = HashMap::new();
        for pattern in [&kotlin_const_pattern, &java_const_pattern] {
            for caps in pattern.captures_iter(text) {
                let name = caps.get(1).unwrap().as_str().to_string();
                let value = caps.get(2).unwrap().as_str().to_string();
                constants.entry(name).or_insert(value);
            }
        }

        Self {
            file_name: file_name.to_string(),
            package_name: package_name.to_string(),
            classes,
            functions,
            constants,
        }
    }

    /// Nearest enclosing class FQN for an offset, falling back to the
    /// file's base name when no class declaration precedes it.
    pub fn class_for_offset(&self, offset: usize) -> String {
        let name = self
            .classes
            .iter()
            .take_while(|(start, _)| *start <= offset)
            .last()
            .map(|(_, name)| name.clone())
            .unwrap_or_else(|| file_base_name(&self.file_name));

        if self.package_name.is_empty() {
            name
        } else {
            format!("{}.{}", self.package_name, name)
        }
    }

    /// Nearest enclosing function at or before an offset, falling back to
    /// a synthetic offset-derived name so the identity key stays unique.
    pub fn function_for_offset(&self, offset: usize) -> String {
        self.functions
            .iter()
            .take_while(|f| f.offset <= offset)
            .last()
            .map(|f| f.name.clone())
            .unwrap_or_else(|| format!("fn_at_{}", offset))
    }

    /// (class FQN, function name) attribution for a heuristic match.
    pub fn context_for_offset(&self, offset: usize) -> (String, String) {
        (self.class_for_offset(offset), self.function_for_offset(offset))
    }

    /// Function declaration whose lexical region contains the offset.
    pub fn function_decl_for_offset(&self, offset: usize) -> Option<&FunctionDecl> {
        self.functions
            .iter()
            .take_while(|f| f.offset <= offset)
            .last()
    }
}

/// Capture a Kotlin `: ReturnType` after the parameter list that starts
/// at `params_start` (the index of the opening paren).
fn kotlin_return_type(text: &str, params_start: usize) -> Option<String> {
    let bytes = text.as_bytes();
    let mut i = params_start;
    let mut depth = 0i32;
    while i < bytes.len() {
        match bytes[i] {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
        i += 1;
    }
    if i >= bytes.len() {
        return None;
    }

    let after = text[i + 1..].trim_start();
    let rest = after.strip_prefix(':')?;
    let end = rest
        .find(['{', '=', '\n'])
        .unwrap_or(rest.len());
    let ty = rest[..end].trim();
    if ty.is_empty() { None } else { Some(ty.to_string()) }
}

fn file_base_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    base.rsplit_once('.')
        .map(|(stem, _)| stem.to_string())
        .unwrap_or_else(|| base.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KOTLIN_SOURCE: &str = r#"
package com.x.api

const val BASE_URL = "https://api.example.com"

class UserClient {
    fun getUser(id: String): User {
        return fetch(BASE_URL + "/users/" + id)
    }

    fun deleteUser(id: String) {
    }
}

object Helpers {
    fun helperFn(): String = "x"
}
"#;

    const JAVA_SOURCE: &str = r#"
package com.x.legacy;

public class OrderService {
    private static final String ORDERS_PATH = "/orders";

    public Order getOrder(String id) {
        return null;
    }

    public void cancelOrder(String id) {
    }
}
"#;

    #[test]
    fn test_kotlin_classes_and_functions_indexed() {
        let index = SourceTextIndex::build("UserClient.kt", "com.x.api", KOTLIN_SOURCE);

        let class_names: Vec<_> = index.classes.iter().map(|(_, n)| n.as_str()).collect();
        assert_eq!(class_names, vec!["UserClient", "Helpers"]);

        let fn_names: Vec<_> = index.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fn_names, vec!["getUser", "deleteUser", "helperFn"]);
    }

    #[test]
    fn test_kotlin_return_type_captured() {
        let index = SourceTextIndex::build("UserClient.kt", "com.x.api", KOTLIN_SOURCE);
        let get_user = index.functions.iter().find(|f| f.name == "getUser").unwrap();
        assert_eq!(get_user.return_type.as_deref(), Some("User"));

        let delete = index.functions.iter().find(|f| f.name == "deleteUser").unwrap();
        assert_eq!(delete.return_type, None);
    }

    #[test]
    fn test_java_methods_and_constants_indexed() {
        let index = SourceTextIndex::build("OrderService.java", "com.x.legacy", JAVA_SOURCE);

        let fn_names: Vec<_> = index.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(fn_names, vec!["getOrder", "cancelOrder"]);
        assert_eq!(
            index.constants.get("ORDERS_PATH").map(String::as_str),
            Some("/orders")
        );
    }

    #[test]
    fn test_constants_collected() {
        let index = SourceTextIndex::build("UserClient.kt", "com.x.api", KOTLIN_SOURCE);
        assert_eq!(
            index.constants.get("BASE_URL").map(String::as_str),
            Some("https://api.example.com")
        );
    }

    #[test]
    fn test_context_for_offset_nearest_preceding() {
        let index = SourceTextIndex::build("UserClient.kt", "com.x.api", KOTLIN_SOURCE);
        let offset = KOTLIN_SOURCE.find("fetch(").unwrap();
        let (class_fqn, function) = index.context_for_offset(offset);

        assert_eq!(class_fqn, "com.x.api.UserClient");
        assert_eq!(function, "getUser");
    }

    #[test]
    fn test_context_fallbacks() {
        let index = SourceTextIndex::build("Loose.kt", "", "val x = fetch(\"/y\")\n");
        let (class_fqn, function) = index.context_for_offset(8);

        assert_eq!(class_fqn, "Loose");
        assert_eq!(function, "fn_at_8");
    }

    #[test]
    fn test_function_regions_bounded_by_next_declaration() {
        let index = SourceTextIndex::build("UserClient.kt", "com.x.api", KOTLIN_SOURCE);
        let get_user = index.functions.iter().find(|f| f.name == "getUser").unwrap();
        let body = &KOTLIN_SOURCE[get_user.offset..get_user.end];

        assert!(body.contains("fetch("));
        assert!(!body.contains("deleteUser"));
    }
}
