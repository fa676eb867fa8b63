//! Pure predicates over syntax and resolved types
//!
//! Entry-point shapes are matched on the declared parameter types as
//! written, so files with unresolved imports still classify. Call
//! classification only trusts resolved receiver types.

use crate::config::SqlctxizeConfig;
use crate::loader::parser::{named_children, node_text};
use crate::types::external::DATABASE_SQL;
use crate::types::{FileTypes, TypeDesc};
use tree_sitter::Node;

/// `database/sql` handle methods and their context-aware replacements
pub const STANDARD_RENAMES: &[(&str, &str)] = &[
    ("Query", "QueryContext"),
    ("Exec", "ExecContext"),
    ("Prepare", "PrepareContext"),
    ("QueryRow", "QueryRowContext"),
];

/// sqlx methods and their context-aware replacements
pub const EXTENDED_RENAMES: &[(&str, &str)] = &[
    ("Connect", "ConnectContext"),
    ("Get", "GetContext"),
    ("MustExec", "MustExecContext"),
    ("NamedExec", "NamedExecContext"),
    ("NamedQuery", "NamedQueryContext"),
    ("PrepareNamed", "PrepareNamedContext"),
    ("QueryRowx", "QueryRowxContext"),
    ("Queryx", "QueryxContext"),
    ("Select", "SelectContext"),
];

fn rename_in(table: &[(&str, &'static str)], method: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(original, _)| *original == method)
        .map(|(_, replacement)| *replacement)
}

/// Classification of a function declaration or literal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionClass {
    /// `func(w http.ResponseWriter, r *http.Request)`
    HttpHandler,
    /// First parameter typed `echo.Context`
    FrameworkHandler,
    /// First parameter typed `echo.HandlerFunc`
    FrameworkMiddleware,
    /// `main` or another configured entry function
    Entry,
    /// Everything else; these gain a context parameter
    Plain,
}

/// Which rename table matched a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlApi {
    Standard,
    Extended,
}

/// A call expression that should be retargeted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlCall {
    pub api: SqlApi,
    pub method: String,
    pub replacement: &'static str,
}

/// Predicates parameterized by the entry-point and handle configuration
pub struct Classifier<'a> {
    config: &'a SqlctxizeConfig,
}

impl<'a> Classifier<'a> {
    pub fn new(config: &'a SqlctxizeConfig) -> Self {
        Self { config }
    }

    /// Classify a `function_declaration`, `method_declaration` or `func_literal`
    pub fn classify(&self, func: &Node, source: &str) -> FunctionClass {
        let params = parameter_decls(func);
        if self.is_http_handler(&params, source) {
            FunctionClass::HttpHandler
        } else if self.first_param_is(&params, source, "Context") {
            FunctionClass::FrameworkHandler
        } else if self.first_param_is(&params, source, "HandlerFunc") {
            FunctionClass::FrameworkMiddleware
        } else if self.is_main(func, source) {
            FunctionClass::Entry
        } else {
            FunctionClass::Plain
        }
    }

    /// Top-level function whose name is a configured entry function
    pub fn is_main(&self, func: &Node, source: &str) -> bool {
        if func.kind() != "function_declaration" {
            return false;
        }
        func.child_by_field_name("name").is_some_and(|name| {
            let name = node_text(&name, source);
            self.config
                .rewrite
                .entry_functions
                .iter()
                .any(|entry| entry == name)
        })
    }

    fn is_http_handler(&self, params: &[Node], source: &str) -> bool {
        let package = self.config.entry_points.http_package.as_str();
        let [writer, request] = params else {
            return false;
        };
        let writer_ok = writer
            .child_by_field_name("type")
            .is_some_and(|t| is_qualified(&t, source, package, "ResponseWriter"));
        let request_ok = request
            .child_by_field_name("type")
            .filter(|t| t.kind() == "pointer_type")
            .and_then(|t| named_children(&t).into_iter().next())
            .is_some_and(|t| is_qualified(&t, source, package, "Request"));
        writer_ok && request_ok
    }

    fn first_param_is(&self, params: &[Node], source: &str, member: &str) -> bool {
        let package = self.config.entry_points.framework_package.as_str();
        params
            .first()
            .and_then(|p| p.child_by_field_name("type"))
            .is_some_and(|t| is_qualified(&t, source, package, member))
    }

    /// Match a call on a SQL handle, standard table first
    pub fn sql_call(&self, call: &Node, source: &str, types: &FileTypes) -> Option<SqlCall> {
        let function = call.child_by_field_name("function")?;
        if function.kind() != "selector_expression" {
            return None;
        }
        let operand = function.child_by_field_name("operand")?;
        let method = node_text(&function.child_by_field_name("field")?, source);
        let receiver = types.describe(&operand);

        if let Some(replacement) = rename_in(STANDARD_RENAMES, method) {
            if self.is_standard_handle(&receiver) {
                return Some(SqlCall {
                    api: SqlApi::Standard,
                    method: method.to_string(),
                    replacement,
                });
            }
        }
        if let Some(replacement) = rename_in(EXTENDED_RENAMES, method) {
            if self.is_extended_receiver(&receiver) {
                return Some(SqlCall {
                    api: SqlApi::Extended,
                    method: method.to_string(),
                    replacement,
                });
            }
        }
        None
    }

    fn is_standard_handle(&self, receiver: &TypeDesc) -> bool {
        match receiver {
            TypeDesc::NamedPointer(named) => {
                named.package == DATABASE_SQL
                    && self
                        .config
                        .rewrite
                        .handle_types
                        .iter()
                        .any(|handle| *handle == named.name)
            }
            _ => false,
        }
    }

    fn is_extended_receiver(&self, receiver: &TypeDesc) -> bool {
        receiver.type_string().is_some_and(|ty| {
            ty.trim_start_matches('*')
                .contains(self.config.rewrite.extended_package.as_str())
        })
    }
}

/// Parameter declarations of a function's own parameter list
pub fn parameter_decls<'t>(func: &Node<'t>) -> Vec<Node<'t>> {
    func.child_by_field_name("parameters")
        .map(|list| named_children(&list))
        .unwrap_or_default()
}

/// Name of the first parameter, if it has one
pub fn first_param_name<'s>(func: &Node, source: &'s str) -> Option<&'s str> {
    let first = parameter_decls(func).into_iter().next()?;
    let name = first.child_by_field_name("name")?;
    Some(node_text(&name, source))
}

/// Declared name of the parameter at `index`, counting each declaration once
pub fn param_name_at<'s>(func: &Node, source: &'s str, index: usize) -> Option<&'s str> {
    let param = parameter_decls(func).into_iter().nth(index)?;
    let name = param.child_by_field_name("name")?;
    Some(node_text(&name, source))
}

/// `pkg.Member` written as a qualified type
fn is_qualified(type_node: &Node, source: &str, package: &str, member: &str) -> bool {
    if type_node.kind() != "qualified_type" {
        return false;
    }
    let pkg = type_node.child_by_field_name("package");
    let name = type_node.child_by_field_name("name");
    matches!(
        (pkg, name),
        (Some(p), Some(n)) if node_text(&p, source) == package && node_text(&n, source) == member
    )
}
