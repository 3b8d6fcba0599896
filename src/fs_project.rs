//! Filesystem-backed project host for the CLI.
//!
//! Walks a directory for Java/Kotlin sources, picks up the root
//! `apiscout.yaml`, and builds a best-effort regex symbol index so the
//! declarative pass works without a real compiler frontend. IDE hosts
//! supply their own [`Project`] implementation instead.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::ScoutError;
use crate::project::{
    AnnotationUse, ClassSymbol, ConfigFile, FieldSymbol, MethodSymbol, ParamSymbol, Project,
    SourceFile, SymbolIndex,
};
use crate::scan::{balanced_args, split_args};
use crate::url::strip_string_literal;

const CONFIG_FILE_NAME: &str = "apiscout.yaml";
const SOURCE_EXTENSIONS: [&str; 3] = ["java", "kt", "kts"];
const IGNORED_DIRS: [&str; 6] = ["target", "build", "out", "node_modules", ".git", ".gradle"];

#[derive(Debug)]
pub struct FsProject {
    root: PathBuf,
    id: String,
    modification_count: u64,
    files: Vec<SourceFile>,
    config: Option<ConfigFile>,
    classes: HashMap<String, ClassSymbol>,
}

impl FsProject {
    /// Snapshot the directory tree. The modification count is the latest
    /// source mtime, so re-opening after an edit yields a new version.
    pub fn open(root: &Path) -> Result<Self, ScoutError> {
        if !root.is_dir() {
            return Err(ScoutError::NotADirectory(root.display().to_string()));
        }

        let mut files = Vec::new();
        let mut latest_mtime = 1u64;
        let indexer = SourceIndexer::new();
        let mut classes = HashMap::new();

        for entry in WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_ignored_dir(e))
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() || !has_source_extension(entry.path()) {
                continue;
            }
            let text = match fs::read_to_string(entry.path()) {
                Ok(text) => text,
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "skipping unreadable file");
                    continue;
                }
            };
            latest_mtime = latest_mtime.max(file_mtime(entry.path()));

            let name = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .display()
                .to_string();
            let package = indexer.package_of(&text);
            indexer.index_file(&name, &package, &text, &mut classes);
            files.push(SourceFile {
                name,
                package,
                text,
            });
        }

        debug!(
            root = %root.display(),
            files = files.len(),
            classes = classes.len(),
            "project snapshot built"
        );

        let config = read_config(&root.join(CONFIG_FILE_NAME))?;
        Ok(Self {
            id: root.display().to_string(),
            root: root.to_path_buf(),
            modification_count: latest_mtime,
            files,
            config,
            classes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Project for FsProject {
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

impl SymbolIndex for FsProject {
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

fn is_ignored_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| IGNORED_DIRS.contains(&name) || name.starts_with('.'))
            .unwrap_or(false)
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SOURCE_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

fn file_mtime(path: &Path) -> u64 {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(1)
}

fn read_config(path: &Path) -> Result<Option<ConfigFile>, ScoutError> {
    if !path.is_file() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).map_err(|source| ScoutError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(Some(ConfigFile {
        path: path.display().to_string(),
        text,
        mtime: file_mtime(path),
    }))
}

/// Regex-level symbol harvester. It only needs to be right about the
/// shapes the scanner consumes: annotated methods, their parameters, and
/// plain data-class fields for sample payloads.
struct SourceIndexer {
    package_decl: Regex,
    class_decl: Regex,
    annotation: Regex,
    kotlin_fun: Regex,
    java_method: Regex,
    kotlin_field: Regex,
    java_field: Regex,
}

impl SourceIndexer {
    fn new() -> Self {
        Self {
            package_decl: Regex::new(r"(?m)^\s*package\s+([\w.]+)").unwrap(),
            class_decl: Regex::new(
                r"(?m)^\s*(?:public\s+|internal\s+|abstract\s+|final\s+|open\s+|data\s+)*(?:class|interface|object)\s+([A-Za-z_]\w*)",
            )
            .unwrap(),
            annotation: Regex::new(r"@([A-Za-z_]\w*)").unwrap(),
            kotlin_fun: Regex::new(r"(?m)^\s*(?:suspend\s+|override\s+|private\s+|internal\s+)*fun\s+([A-Za-z_]\w*)\s*\(").unwrap(),
            java_method: Regex::new(
                r"(?m)^\s*(?:public|protected|private|static|default|abstract|final|synchronized)[\w\s<>\[\],.?]*?\s([A-Za-z_]\w*)\s*\(",
            )
            .unwrap(),
            kotlin_field: Regex::new(r"\bva[lr]\s+([A-Za-z_]\w*)\s*:\s*([\w.<>?,\s]+?)\s*(?:=|,|\)|$)")
                .unwrap(),
            java_field: Regex::new(
                r"(?m)^\s*(?:public|private|protected|final|\s)+([A-Za-z_][\w.<>,\s]*?)\s+([A-Za-z_]\w*)\s*(?:=|;)",
            )
            .unwrap(),
        }
    }

    fn package_of(&self, text: &str) -> String {
        self.package_decl
            .captures(text)
            .map(|c| c[1].to_string())
            .unwrap_or_default()
    }

    fn index_file(
        &self,
        file_name: &str,
        package: &str,
        text: &str,
        classes: &mut HashMap<String, ClassSymbol>,
    ) {
        // Class declarations in file order; each owns the text up to the
        // next declaration.
        let decls: Vec<(usize, String)> = self
            .class_decl
            .captures_iter(text)
            .filter_map(|caps| {
                let m = caps.get(1)?;
                let fqn = if package.is_empty() {
                    m.as_str().to_string()
                } else {
                    format!("{}.{}", package, m.as_str())
                };
                Some((m.start(), fqn))
            })
            .collect();

        for (i, (offset, fqn)) in decls.iter().enumerate() {
            let end = decls.get(i + 1).map(|(o, _)| *o).unwrap_or(text.len());
            let mut class = classes
                .remove(fqn)
                .unwrap_or_else(|| ClassSymbol::new(fqn));
            class.annotations = self.annotations_before(text, *offset);
            self.harvest_methods(file_name, fqn, text, *offset, end, &mut class);
            self.harvest_fields(&text[*offset..end], &mut class);
            classes.insert(fqn.clone(), class);
        }
    }

    fn harvest_methods(
        &self,
        file_name: &str,
        class_fqn: &str,
        text: &str,
        start: usize,
        end: usize,
        class: &mut ClassSymbol,
    ) {
        let region = &text[start..end];
        let mut found: Vec<(usize, String)> = Vec::new();
        for caps in self.kotlin_fun.captures_iter(region) {
            let m = caps.get(1).unwrap();
            found.push((start + m.start(), m.as_str().to_string()));
        }
        for caps in self.java_method.captures_iter(region) {
            let m = caps.get(1).unwrap();
            let name = m.as_str();
            if matches!(name, "new" | "return" | "throw" | "if" | "while" | "for" | "catch") {
                continue;
            }
            found.push((start + m.start(), name.to_string()));
        }
        found.sort();
        found.dedup();

        for (offset, name) in found {
            let annotations = self.annotations_before(text, offset);
            let Some(open) = text[offset..].find('(').map(|i| offset + i) else {
                continue;
            };
            let Some((params_text, close)) = balanced_args(text, open) else {
                continue;
            };
            // Kotlin return types follow the params, Java's precede the
            // name.
            let return_type =
                return_type_after(&text[close..]).or_else(|| java_return_type(text, offset));
            class.methods.push(MethodSymbol {
                class_fqn: class_fqn.to_string(),
                name,
                return_type,
                params: self.parse_params(&params_text),
                annotations,
                file: file_name.to_string(),
                line: line_of(text, offset),
                body: Some(body_after(text, close)),
            });
        }
    }

    /// Annotations in the contiguous run of `@...` lines directly above
    /// a declaration, plus any on the declaration line itself.
    fn annotations_before(&self, text: &str, offset: usize) -> Vec<AnnotationUse> {
        let mut annotations = Vec::new();
        let head = &text[..offset];
        let mut lines = head.lines().rev();

        // `offset` points at the declared name, so the last line of
        // `head` is the declaration line's prefix.
        if let Some(decl_prefix) = lines.next() {
            annotations.extend(self.parse_annotation_line(decl_prefix.trim()));
        }
        for line in lines {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if !trimmed.starts_with('@') {
                break;
            }
            annotations.extend(self.parse_annotation_line(trimmed));
        }
        annotations.reverse();
        annotations
    }

    fn parse_annotation_line(&self, line: &str) -> Vec<AnnotationUse> {
        let mut out = Vec::new();
        for caps in self.annotation.captures_iter(line) {
            let name = caps[1].to_string();
            let mut annotation = AnnotationUse::new(&name);
            let after = &line[caps.get(0).unwrap().end()..];
            if let Some(rel) = after.find(|c: char| !c.is_whitespace()) {
                if after.as_bytes().get(rel) == Some(&b'(') {
                    if let Some((args, _)) = balanced_args(after, rel) {
                        fill_annotation_args(&mut annotation, &args);
                    }
                }
            }
            out.push(annotation);
        }
        out
    }

    fn parse_params(&self, params_text: &str) -> Vec<ParamSymbol> {
        split_args(params_text)
            .into_iter()
            .filter(|p| !p.is_empty())
            .filter_map(|entry| {
                let annotations: Vec<AnnotationUse> = self.parse_annotation_line(&entry);
                let stripped = strip_annotations(&entry);
                let bare = stripped.trim();

                let (name, type_text) = if let Some((left, right)) = bare.split_once(':') {
                    // Kotlin: name: Type
                    (left.split_whitespace().last()?.to_string(), right.trim().to_string())
                } else {
                    // Java: Type name
                    let mut words: Vec<&str> = bare.split_whitespace().collect();
                    let name = words.pop()?.to_string();
                    (name, words.join(" "))
                };
                Some(ParamSymbol {
                    name,
                    type_text,
                    annotations,
                })
            })
            .collect()
    }

    fn harvest_fields(&self, region: &str, class: &mut ClassSymbol) {
        for caps in self.kotlin_field.captures_iter(region) {
            class.fields.push(FieldSymbol {
                name: caps[1].to_string(),
                type_text: caps[2].trim().to_string(),
            });
        }
        for caps in self.java_field.captures_iter(region) {
            let type_text = caps[1].trim();
            if type_text.is_empty() || type_text == "return" {
                continue;
            }
            class.fields.push(FieldSymbol {
                name: caps[2].to_string(),
                type_text: type_text.to_string(),
            });
        }
        class.fields.dedup_by(|a, b| a.name == b.name);
    }
}

/// Remove every `@Name(...)` usage, balanced-paren aware, leaving the
/// bare parameter declaration.
fn strip_annotations(entry: &str) -> String {
    let mut out = String::new();
    let mut rest = entry;
    while let Some(at) = rest.find('@') {
        out.push_str(&rest[..at]);
        let after = &rest[at + 1..];
        let name_end = after
            .find(|c: char| !c.is_alphanumeric() && c != '_')
            .unwrap_or(after.len());
        let tail = &after[name_end..];
        let ws = tail.len() - tail.trim_start().len();
        if tail[ws..].starts_with('(') {
            if let Some((_, close)) = balanced_args(tail, ws) {
                rest = &tail[close..];
                continue;
            }
        }
        rest = tail;
    }
    out.push_str(rest);
    out
}

/// `value = "x"` and bare-string args of one annotation.
fn fill_annotation_args(annotation: &mut AnnotationUse, args: &str) {
    for part in split_args(args) {
        if let Some((key, value)) = part.split_once('=') {
            let value = strip_string_literal(value.trim()).unwrap_or_else(|| value.trim().to_string());
            annotation.named.insert(key.trim().to_string(), value);
        } else if let Some(literal) = strip_string_literal(&part) {
            annotation.positional.push(literal);
        }
    }
}

fn java_return_type(text: &str, name_offset: usize) -> Option<String> {
    let line_start = text[..name_offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let ty = text[line_start..name_offset].split_whitespace().last()?;
    match ty {
        "fun" | "void" | "public" | "protected" | "private" | "static" | "abstract" | "final"
        | "default" | "synchronized" => None,
        _ => Some(ty.to_string()),
    }
}

fn return_type_after(after_params: &str) -> Option<String> {
    let trimmed = after_params.trim_start();
    let rest = trimmed.strip_prefix(':')?;
    let line = rest.trim_start().lines().next()?;
    let end = line
        .find(|c: char| c == '{' || c == '=')
        .unwrap_or(line.len());
    let ty = line[..end].trim();
    (!ty.is_empty()).then(|| ty.to_string())
}

/// Body slice from the opening brace after the signature to the next
/// top-of-file declaration boundary; good enough for text re-scans.
fn body_after(text: &str, close: usize) -> String {
    let rest = &text[close..];
    let Some(brace) = rest.find('{') else {
        return String::new();
    };
    let mut depth = 0usize;
    for (i, c) in rest[brace..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return rest[brace..brace + i + 1].to_string();
                }
            }
            _ => {}
        }
    }
    rest[brace..].to_string()
}

fn line_of(text: &str, offset: usize) -> u32 {
    text[..offset].matches('\n').count() as u32 + 1
}
