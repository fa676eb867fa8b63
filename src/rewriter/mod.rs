//! The rewrite engine
//!
//! One preorder walk per file applies three coordinated rewrites:
//! retargeting SQL handle calls to their context-aware methods, adding a
//! leading `ctx context.Context` parameter to non-entry functions (and
//! patching their same-file call sites), and seeding `ctx` at HTTP and
//! framework entry points. Classification always looks at the original
//! syntax, so a function's decision never depends on edits made earlier in
//! the walk.

pub mod edits;
pub mod imports;
pub mod patcher;

use crate::classifier::{
    first_param_name, param_name_at, parameter_decls, Classifier, FunctionClass,
};
use crate::config::SqlctxizeConfig;
use crate::loader::parser::{
    block_statements, field_children, named_children, node_line, node_text,
};
use crate::loader::SourceFile;
use crate::types::FileTypes;
use edits::{EditSet, CTX};
use std::ops::AddAssign;
use tree_sitter::Node;

/// What a rewrite changed in one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub retargeted: usize,
    pub augmented: usize,
    pub patched: usize,
    pub seeded: usize,
    pub import_added: bool,
}

impl RewriteStats {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

impl AddAssign for RewriteStats {
    fn add_assign(&mut self, other: Self) {
        self.retargeted += other.retargeted;
        self.augmented += other.augmented;
        self.patched += other.patched;
        self.seeded += other.seeded;
        self.import_added |= other.import_added;
    }
}

/// Rendered output of one file
#[derive(Debug)]
pub struct Rewrite {
    pub output: String,
    pub stats: RewriteStats,
}

pub struct Rewriter<'a> {
    config: &'a SqlctxizeConfig,
    classifier: Classifier<'a>,
}

impl<'a> Rewriter<'a> {
    pub fn new(config: &'a SqlctxizeConfig) -> Self {
        Self {
            config,
            classifier: Classifier::new(config),
        }
    }

    /// Rewrite one file given the expression types of its package
    pub fn rewrite_file(&self, file: &SourceFile, types: &FileTypes) -> Rewrite {
        let mut pass = FilePass {
            rewriter: self,
            file,
            types,
            edits: EditSet::new(),
            stats: RewriteStats::default(),
        };
        pass.walk(file.root());

        if !pass.edits.is_empty() {
            pass.stats.import_added = imports::ensure_context_import(file, &mut pass.edits);
        }
        log::debug!(
            "{}: {} retargeted, {} augmented, {} patched, {} seeded",
            file.file_name(),
            pass.stats.retargeted,
            pass.stats.augmented,
            pass.stats.patched,
            pass.stats.seeded
        );

        Rewrite {
            output: pass.edits.render(&file.source),
            stats: pass.stats,
        }
    }

    /// `ctx := r.Context()` for an HTTP handler
    fn http_seed(&self, func: &Node, source: &str) -> String {
        let request = self.seed_receiver(func, source, 1, "r");
        format!("{} := {}.Context()", CTX, request)
    }

    /// `ctx := c.Request().Context()` for a framework handler
    fn framework_seed(&self, func: &Node, source: &str) -> String {
        let context = self.seed_receiver(func, source, 0, "c");
        format!("{} := {}.Request().Context()", CTX, context)
    }

    fn seed_receiver<'s>(
        &self,
        func: &Node,
        source: &'s str,
        index: usize,
        fallback: &'s str,
    ) -> &'s str {
        if !self.config.entry_points.use_declared_names {
            return fallback;
        }
        match param_name_at(func, source, index) {
            Some(name) if name != "_" => name,
            _ => fallback,
        }
    }
}

struct FilePass<'r, 'f> {
    rewriter: &'r Rewriter<'r>,
    file: &'f SourceFile,
    types: &'f FileTypes,
    edits: EditSet,
    stats: RewriteStats,
}

impl<'r, 'f> FilePass<'r, 'f> {
    fn walk(&mut self, node: Node<'f>) {
        match node.kind() {
            "call_expression" => self.retarget(&node),
            "function_declaration" | "method_declaration" => self.function(&node),
            "func_literal" => self.function_literal(&node),
            _ => {}
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'f>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.walk(child);
        }
    }

    fn source(&self) -> &'f str {
        &self.file.source
    }

    fn retarget(&mut self, call: &Node) {
        let Some(sql) = self
            .rewriter
            .classifier
            .sql_call(call, self.source(), self.types)
        else {
            return;
        };
        let (Some(function), Some(args)) = (
            call.child_by_field_name("function"),
            call.child_by_field_name("arguments"),
        ) else {
            return;
        };
        let Some(field) = function.child_by_field_name("field") else {
            return;
        };
        if self.edits.rename(&field, sql.replacement) {
            self.edits.prepend_ctx_arg(&args, self.source());
            self.stats.retargeted += 1;
            log::trace!(
                "{}:{}: {} -> {}",
                self.file.file_name(),
                call.start_position().row + 1,
                sql.method,
                sql.replacement
            );
        }
    }

    fn function(&mut self, func: &Node) {
        let source = self.source();
        match self.rewriter.classifier.classify(func, source) {
            FunctionClass::Plain => self.augment(func),
            FunctionClass::HttpHandler => {
                let seed = self.rewriter.http_seed(func, source);
                self.seed(func, &seed);
            }
            FunctionClass::FrameworkHandler => {
                let seed = self.rewriter.framework_seed(func, source);
                self.seed(func, &seed);
            }
            FunctionClass::FrameworkMiddleware | FunctionClass::Entry => {}
        }
    }

    fn function_literal(&mut self, literal: &Node) {
        let source = self.source();
        if self.rewriter.classifier.classify(literal, source) == FunctionClass::FrameworkHandler {
            let seed = self.rewriter.framework_seed(literal, source);
            self.seed(literal, &seed);
        }
    }

    /// Add the leading `ctx` parameter and patch same-file callers
    fn augment(&mut self, func: &Node) {
        let source = self.source();
        let (Some(name), Some(params)) = (
            func.child_by_field_name("name"),
            func.child_by_field_name("parameters"),
        ) else {
            return;
        };
        if first_param_name(func, source) == Some(CTX) || self.edits.has_ctx_param(&params) {
            return;
        }
        if !self.edits.prepend_ctx_param(&params, source) {
            return;
        }
        self.stats.augmented += 1;
        let name = node_text(&name, source);
        if declares_ctx_after_first(func, source) {
            log::warn!(
                "{}:{}: {} already has a ctx parameter that is not first; the added one will clash",
                self.file.file_name(),
                node_line(func),
                name
            );
        }
        self.stats.patched += patcher::patch_call_sites(name, self.file, &mut self.edits);
    }

    fn seed(&mut self, func: &Node, statement: &str) {
        let Some(body) = func.child_by_field_name("body") else {
            return;
        };
        if binds_ctx_first(&body, self.source()) || self.edits.is_seeded(&body) {
            return;
        }
        if self.edits.seed_body(&body, self.source(), statement) {
            self.stats.seeded += 1;
        }
    }
}

/// Whether a parameter other than the first is named `ctx`
fn declares_ctx_after_first(func: &Node, source: &str) -> bool {
    let mut names = parameter_decls(func)
        .into_iter()
        .flat_map(|decl| field_children(&decl, "name"));
    names.next();
    names.any(|name| node_text(&name, source) == CTX)
}

/// Whether the body already starts with `ctx := ...`
fn binds_ctx_first(body: &Node, source: &str) -> bool {
    let Some(first) = block_statements(body).into_iter().next() else {
        return false;
    };
    if first.kind() != "short_var_declaration" {
        return false;
    }
    first
        .child_by_field_name("left")
        .map(|left| named_children(&left))
        .is_some_and(|names| {
            names.len() == 1 && node_text(&names[0], source) == CTX
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parser::parse_source;
    use crate::types::{Checker, PackageRegistry};
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn rewrite_with(source: &str, config: &SqlctxizeConfig) -> Rewrite {
        let file = parse_source(source, Path::new("a.go")).unwrap();
        let registry =
            PackageRegistry::build("a", "example.com/a", std::slice::from_ref(&file)).unwrap();
        let types = Checker::new(&registry, &file).check_file();
        Rewriter::new(config).rewrite_file(&file, &types)
    }

    fn rewrite(source: &str) -> Rewrite {
        rewrite_with(source, &SqlctxizeConfig::default())
    }

    #[test]
    fn test_handler_helper_chain() {
        let result = rewrite(indoc! {r#"
            package a

            import (
            	"database/sql"
            	"net/http"
            )

            var db *sql.DB

            func handler(w http.ResponseWriter, r *http.Request) { subHandler() }

            func subHandler() { db.Query("SELECT 1") }
        "#});
        assert_eq!(
            result.output,
            indoc! {r#"
                package a

                import (
                	"context"
                )

                import (
                	"database/sql"
                	"net/http"
                )

                var db *sql.DB

                func handler(w http.ResponseWriter, r *http.Request) {
                	ctx := r.Context()
                	subHandler(ctx)
                }

                func subHandler(ctx context.Context) { db.QueryContext(ctx, "SELECT 1") }
            "#}
        );
        assert_eq!(
            result.stats,
            RewriteStats {
                retargeted: 1,
                augmented: 1,
                patched: 1,
                seeded: 1,
                import_added: true,
            }
        );
    }

    #[test]
    fn test_existing_ctx_parameter_is_kept() {
        let source = indoc! {r#"
            package a

            import "context"

            func load(ctx context.Context) {}

            func main() { load(ctx) }
        "#};
        let result = rewrite(source);
        assert_eq!(result.output, source);
        assert!(result.stats.is_noop());
    }

    #[test]
    fn test_ctx_in_later_position_is_detected() {
        let source = indoc! {r#"
            package a

            import "context"

            func late(id int, ctx context.Context) {}
            func pair(a, ctx int) {}
            func first(ctx context.Context, id int) {}
            func none(id int) {}
        "#};
        let file = parse_source(source, Path::new("a.go")).unwrap();
        let found: Vec<&str> = named_children(&file.root())
            .into_iter()
            .filter(|n| n.kind() == "function_declaration")
            .filter(|f| declares_ctx_after_first(f, source))
            .filter_map(|f| f.child_by_field_name("name"))
            .map(|n| node_text(&n, source))
            .collect();
        assert_eq!(found, vec!["late", "pair"]);

        // The function is still augmented; the clash is only reported
        let output = rewrite(source).output;
        assert!(output.contains("func late(ctx context.Context, id int, ctx context.Context) {}"));
    }

    #[test]
    fn test_main_is_not_augmented() {
        let result = rewrite("package main\n\nfunc main() { run() }\n\nfunc run() {}\n");
        assert!(result.output.contains("func main() { run(ctx) }"));
        assert!(result.output.contains("func run(ctx context.Context) {}"));
    }

    #[test]
    fn test_middleware_literal_is_seeded() {
        let result = rewrite(indoc! {r#"
            package a

            import "github.com/labstack/echo/v4"

            func mw(next echo.HandlerFunc) echo.HandlerFunc {
            	return func(c echo.Context) error { return next(c) }
            }
        "#});
        assert_eq!(
            result.output,
            indoc! {r#"
                package a

                import (
                	"context"
                )

                import "github.com/labstack/echo/v4"

                func mw(next echo.HandlerFunc) echo.HandlerFunc {
                	return func(c echo.Context) error {
                		ctx := c.Request().Context()
                		return next(c)
                	}
                }
            "#}
        );
        assert_eq!(result.stats.augmented, 0);
    }

    #[test]
    fn test_declared_parameter_names_option() {
        let mut config = SqlctxizeConfig::default();
        config.entry_points.use_declared_names = true;
        let result = rewrite_with(
            indoc! {r#"
                package a

                import "net/http"

                func h(w http.ResponseWriter, req *http.Request) {
                	w.WriteHeader(200)
                }
            "#},
            &config,
        );
        assert!(result.output.contains("\tctx := req.Context()\n\tw.WriteHeader(200)"));
    }

    #[test]
    fn test_seed_is_not_repeated() {
        let source = indoc! {r#"
            package a

            import "net/http"

            func h(w http.ResponseWriter, r *http.Request) {
            	ctx := r.Context()
            	_ = ctx
            }
        "#};
        let result = rewrite(source);
        assert_eq!(result.output, source);
    }

    #[test]
    fn test_untouched_file_gets_no_import() {
        let source = "package a\n\nfunc f(ctx int) {}\n";
        let result = rewrite(source);
        assert_eq!(result.output, source);
        assert!(!result.stats.import_added);
    }
}
