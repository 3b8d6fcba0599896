//! Host collaborator interfaces.
//!
//! The engine never parses the host language for real; it consumes a
//! symbol index and a file provider supplied by the host (an IDE, a CLI
//! walker, a test fixture). Both are read-only contracts; the
//! modification counter is the sole cache-invalidation signal.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Raw text of one project source unit.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub package: String,
    pub text: String,
}

/// The project-root override document, with its modification stamp.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub path: String,
    pub text: String,
    pub mtime: u64,
}

/// One annotation usage: `@GET("users/{id}")`, `@HTTP(method = "DELETE",
/// path = "users/{id}")`, ...
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnnotationUse {
    pub name: String,
    pub positional: Vec<String>,
    pub named: HashMap<String, String>,
}

impl AnnotationUse {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_value(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            positional: vec![value.to_string()],
            named: HashMap::new(),
        }
    }

    /// The `value` attribute, or the first positional attribute.
    pub fn value(&self) -> Option<&str> {
        self.named
            .get("value")
            .map(String::as_str)
            .or_else(|| self.positional.first().map(String::as_str))
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.named
            .get(name)
            .map(String::as_str)
            .or_else(|| if name == "value" { self.value() } else { None })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSymbol {
    pub name: String,
    pub type_text: String,
    pub annotations: Vec<AnnotationUse>,
}

impl ParamSymbol {
    pub fn annotation(&self, name: &str) -> Option<&AnnotationUse> {
        self.annotations.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodSymbol {
    pub class_fqn: String,
    pub name: String,
    pub return_type: Option<String>,
    pub params: Vec<ParamSymbol>,
    pub annotations: Vec<AnnotationUse>,
    pub file: String,
    pub line: u32,
    /// Raw body text when the host can supply it; the heuristic detail
    /// branch re-scans this.
    pub body: Option<String>,
}

impl MethodSymbol {
    pub fn annotation(&self, name: &str) -> Option<&AnnotationUse> {
        self.annotations.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSymbol {
    pub name: String,
    pub type_text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassSymbol {
    pub fqn: String,
    pub annotations: Vec<AnnotationUse>,
    pub methods: Vec<MethodSymbol>,
    pub fields: Vec<FieldSymbol>,
    pub constructor_params: Vec<ParamSymbol>,
}

impl ClassSymbol {
    pub fn new(fqn: &str) -> Self {
        Self {
            fqn: fqn.to_string(),
            ..Default::default()
        }
    }
}

/// Host-provided declarative symbol source. Backed by an IDE index in
/// production and by [`MemProject`] in tests.
pub trait SymbolIndex {
    /// All methods carrying the named annotation, across the project.
    fn methods_annotated_with(&self, annotation: &str) -> Vec<MethodSymbol>;

    /// Look up a class by fully-qualified name.
    fn find_class(&self, fqn: &str) -> Option<ClassSymbol>;
}

/// A read-only snapshot of one project: identity, files, override file
/// and symbol index. The modification counter increases monotonically on
/// any relevant edit.
pub trait Project {
    fn project_id(&self) -> &str;
    fn modification_count(&self) -> u64;
    fn files(&self) -> Vec<SourceFile>;
    fn config_file(&self) -> Option<ConfigFile>;
    fn symbols(&self) -> &dyn SymbolIndex;
}

/// In-memory project fixture. Tests (and anything else that already has
/// symbols at hand) populate it directly.
#[derive(Debug, Default)]
pub struct MemProject {
    id: String,
    modification_count: u64,
    files: Vec<SourceFile>,
    config: Option<ConfigFile>,
    classes: HashMap<String, ClassSymbol>,
}

impl MemProject {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            modification_count: 1,
            ..Default::default()
        }
    }

    pub fn add_file(&mut self, name: &str, package: &str, text: &str) {
        self.files.push(SourceFile {
            name: name.to_string(),
            package: package.to_string(),
            text: text.to_string(),
        });
        self.modification_count += 1;
    }

    pub fn set_config(&mut self, text: &str) {
        let mtime = self.config.as_ref().map(|c| c.mtime + 1).unwrap_or(1);
        self.config = Some(ConfigFile {
            path: format!("{}/apiscout.yaml", self.id),
            text: text.to_string(),
            mtime,
        });
    }

    pub fn add_class(&mut self, class: ClassSymbol) {
        self.classes.insert(class.fqn.clone(), class);
        self.modification_count += 1;
    }

    /// Simulate an edit without changing content.
    pub fn touch(&mut self) {
        self.modification_count += 1;
    }
}

impl SymbolIndex for MemProject {
    fn methods_annotated_with(&self, annotation: &str) -> Vec<MethodSymbol> {
        let mut methods: Vec<MethodSymbol> = self
            .classes
            .values()
            .flat_map(|class| class.methods.iter())
            .filter(|method| method.annotation(annotation).is_some())
            .cloned()
            .collect();
        methods.sort_by(|a, b| (&a.class_fqn, &a.name).cmp(&(&b.class_fqn, &b.name)));
        methods
    }

    fn find_class(&self, fqn: &str) -> Option<ClassSymbol> {
        self.classes.get(fqn).cloned()
    }
}

impl Project for MemProject {
    fn project_id(&self) -> &str {
        &self.id
    }

    fn modification_count(&self) -> u64 {
        self.modification_count
    }

    fn files(&self) -> Vec<SourceFile> {
        self.files.clone()
    }

    fn config_file(&self) -> Option<ConfigFile> {
        self.config.clone()
    }

    fn symbols(&self) -> &dyn SymbolIndex {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_annotation_value_prefers_named_value() {
        let mut annotation = AnnotationUse::with_value("GET", "positional");
        annotation
            .named
            .insert("value".to_string(), "named".to_string());
        assert_eq!(annotation.value(), Some("named"));
    }

    #[test]
    fn test_mem_project_annotated_method_lookup() {
        let mut project = MemProject::new("p");
        let mut class = ClassSymbol::new("com.x.Api");
        class.methods.push(MethodSymbol {
            class_fqn: "com.x.Api".to_string(),
            name: "getUser".to_string(),
            return_type: Some("Call<User>".to_string()),
            params: vec![],
            annotations: vec![AnnotationUse::with_value("GET", "users/{id}")],
            file: "Api.kt".to_string(),
            line: 4,
            body: None,
        });
        project.add_class(class);

        let hits = project.methods_annotated_with("GET");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "getUser");
        assert!(project.methods_annotated_with("POST").is_empty());
    }

    #[test]
    fn test_modification_count_increases_on_edit() {
        let mut project = MemProject::new("p");
        let before = project.modification_count();
        project.add_file("A.kt", "com.x", "");
        assert!(project.modification_count() > before);
    }
}
