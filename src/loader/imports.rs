//! Import declarations of a Go file and the package names they bind

use super::parser::{field_children, named_children, node_text, unquote, SourceFile};
use std::collections::HashMap;
use tree_sitter::Node;

/// One import spec: `name "path"` or just `"path"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    pub name: Option<String>,
    pub path: String,
}

impl ImportSpec {
    /// The identifier this import binds in file scope, if any.
    ///
    /// Blank and dot imports bind nothing addressable.
    pub fn binding(&self) -> Option<String> {
        match self.name.as_deref() {
            Some("_") | Some(".") => None,
            Some(alias) => Some(alias.to_string()),
            None => Some(default_package_name(&self.path)),
        }
    }
}

/// Collect every import spec of a file, in source order
pub fn collect_imports(file: &SourceFile) -> Vec<ImportSpec> {
    let mut specs = Vec::new();
    for decl in named_children(&file.root()) {
        if decl.kind() == "import_declaration" {
            collect_specs(&decl, &file.source, &mut specs);
        }
    }
    specs
}

fn collect_specs(node: &Node, source: &str, specs: &mut Vec<ImportSpec>) {
    for child in named_children(node) {
        match child.kind() {
            "import_spec" => {
                let Some(path) = child.child_by_field_name("path") else {
                    continue;
                };
                let name = field_children(&child, "name")
                    .first()
                    .map(|n| node_text(n, source).to_string());
                specs.push(ImportSpec {
                    name,
                    path: unquote(node_text(&path, source)).to_string(),
                });
            }
            "import_spec_list" => collect_specs(&child, source, specs),
            _ => {}
        }
    }
}

/// Map from the identifier bound in file scope to the import path
pub fn import_bindings(file: &SourceFile) -> HashMap<String, String> {
    collect_imports(file)
        .into_iter()
        .filter_map(|spec| spec.binding().map(|name| (name, spec.path)))
        .collect()
}

/// Package name Go would most likely declare for an import path.
///
/// Uses the last path element, skipping a trailing major version element
/// (`echo/v4`), dropping a `gopkg.in` style `.vN` suffix and a `go-` prefix.
pub fn default_package_name(path: &str) -> String {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.len() > 1 && segments.last().is_some_and(|s| is_major_version(s)) {
        segments.pop();
    }
    let last = segments.last().copied().unwrap_or(path);
    let last = match last.rsplit_once('.') {
        Some((base, suffix)) if is_major_version(suffix) => base,
        _ => last,
    };
    let last = last.strip_prefix("go-").unwrap_or(last);
    last.replace('-', "_")
}

fn is_major_version(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|digits| !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parser::parse_source;
    use indoc::indoc;
    use std::path::Path;

    #[test]
    fn test_default_package_name() {
        assert_eq!(default_package_name("database/sql"), "sql");
        assert_eq!(default_package_name("github.com/labstack/echo/v4"), "echo");
        assert_eq!(default_package_name("gopkg.in/yaml.v3"), "yaml");
        assert_eq!(default_package_name("github.com/go-sql-driver/mysql"), "mysql");
        assert_eq!(default_package_name("github.com/mattn/go-sqlite3"), "sqlite3");
        assert_eq!(default_package_name("context"), "context");
    }

    #[test]
    fn test_collect_imports_grouped_and_aliased() {
        let source = indoc! {r#"
            package store

            import "context"

            import (
                stdsql "database/sql"
                _ "github.com/lib/pq"
                "github.com/jmoiron/sqlx"
            )
        "#};
        let file = parse_source(source, Path::new("store.go")).unwrap();
        let imports = collect_imports(&file);
        assert_eq!(imports.len(), 4);
        assert_eq!(imports[0].path, "context");
        assert_eq!(imports[1].name.as_deref(), Some("stdsql"));

        let bindings = import_bindings(&file);
        assert_eq!(bindings.get("stdsql").map(String::as_str), Some("database/sql"));
        assert_eq!(
            bindings.get("sqlx").map(String::as_str),
            Some("github.com/jmoiron/sqlx")
        );
        assert!(!bindings.contains_key("pq"));
        assert!(!bindings.contains_key("_"));
    }
}
