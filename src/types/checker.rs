use super::external;
use super::registry::{var_specs, PackageRegistry, TypeResolver};
use super::{FileTypes, GoType};
use crate::loader::imports::import_bindings;
use crate::loader::parser::{block_items, field_children, named_children, node_text};
use crate::loader::SourceFile;
use std::collections::HashMap;
use tree_sitter::Node;

/// Variable types declared in one lexical scope
#[derive(Debug, Default)]
struct Scope {
    variables: HashMap<String, GoType>,
}

const STATEMENT_KINDS: &[&str] = &[
    "short_var_declaration",
    "var_declaration",
    "const_declaration",
    "type_declaration",
    "assignment_statement",
    "expression_statement",
    "return_statement",
    "go_statement",
    "defer_statement",
    "send_statement",
    "inc_statement",
    "dec_statement",
    "if_statement",
    "for_statement",
    "expression_switch_statement",
    "type_switch_statement",
    "select_statement",
    "labeled_statement",
    "block",
    "statement_list",
    "break_statement",
    "continue_statement",
    "goto_statement",
    "fallthrough_statement",
    "empty_statement",
];

/// Walks one file and records a type for every expression it visits
pub struct Checker<'a> {
    registry: &'a PackageRegistry,
    file: &'a SourceFile,
    imports: HashMap<String, String>,
    source: &'a str,
    scopes: Vec<Scope>,
    table: FileTypes,
}

impl<'a> Checker<'a> {
    pub fn new(registry: &'a PackageRegistry, file: &'a SourceFile) -> Self {
        Self {
            registry,
            file,
            imports: import_bindings(file),
            source: &file.source,
            scopes: Vec::new(),
            table: FileTypes::default(),
        }
    }

    fn resolver(&self) -> TypeResolver<'_> {
        TypeResolver {
            package_path: &self.registry.package_path,
            imports: &self.imports,
            source: self.source,
        }
    }

    fn resolve_type(&self, node: &Node) -> GoType {
        let ty = self.resolver().resolve(node);
        self.registry.normalize(ty)
    }

    /// Check every top-level declaration and return the file's type table
    pub fn check_file(mut self) -> FileTypes {
        let file = self.file;
        for decl in named_children(&file.root()) {
            match decl.kind() {
                "function_declaration" | "method_declaration" => self.check_function(&decl),
                "var_declaration" | "const_declaration" => {
                    for child in named_children(&decl) {
                        self.visit(&child);
                    }
                }
                _ => {}
            }
        }
        self.table
    }

    /// Types of the names declared by a package-level `var` spec without a type
    pub fn value_types(mut self, spec: &Node) -> Vec<GoType> {
        let names = field_children(spec, "name").len();
        match spec.child_by_field_name("value") {
            Some(values) => self.expression_list_types(&values, names),
            None => vec![GoType::Unknown; names],
        }
    }

    fn enter_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    fn exit_scope(&mut self) {
        self.scopes.pop();
    }

    /// Record a variable with its type in the innermost scope
    fn record_variable(&mut self, name: &str, ty: GoType) {
        if name == "_" {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.variables.insert(name.to_string(), ty);
        }
    }

    /// Resolve an identifier through the scope stack, then package scope, then imports
    fn resolve_identifier(&self, name: &str) -> GoType {
        for scope in self.scopes.iter().rev() {
            if let Some(ty) = scope.variables.get(name) {
                return ty.clone();
            }
        }
        if let Some(ty) = self.registry.variable(name) {
            return ty.clone();
        }
        if let Some(sig) = self.registry.function(name) {
            return GoType::Func(Box::new(sig.clone()));
        }
        if let Some(path) = self.imports.get(name) {
            return GoType::Package(path.clone());
        }
        GoType::Unknown
    }

    /// Whether an identifier in expression position names a type rather than a value
    fn names_type(&self, name: &str) -> bool {
        let shadowed = self
            .scopes
            .iter()
            .any(|scope| scope.variables.contains_key(name));
        !shadowed
            && (external::is_basic_type(name) || self.registry.declares_type(name))
            && self.registry.variable(name).is_none()
    }

    fn check_function(&mut self, func: &Node) {
        self.enter_scope();
        if let Some(receiver) = func.child_by_field_name("receiver") {
            self.bind_parameters(&receiver);
        }
        if let Some(params) = func.child_by_field_name("parameters") {
            self.bind_parameters(&params);
        }
        if let Some(result) = func.child_by_field_name("result") {
            if result.kind() == "parameter_list" {
                self.bind_parameters(&result);
            }
        }
        if let Some(body) = func.child_by_field_name("body") {
            self.check_block(&body);
        }
        self.exit_scope();
    }

    fn bind_parameters(&mut self, list: &Node) {
        for param in named_children(list) {
            let Some(type_node) = param.child_by_field_name("type") else {
                continue;
            };
            let mut ty = self.resolve_type(&type_node);
            if param.kind() == "variadic_parameter_declaration" {
                ty = GoType::Slice(Box::new(ty));
            }
            for name in field_children(&param, "name") {
                self.table.record(&name, ty.clone());
                let name = node_text(&name, self.source).to_string();
                self.record_variable(&name, ty.clone());
            }
        }
    }

    fn check_block(&mut self, block: &Node) {
        self.enter_scope();
        for stmt in block_items(block, false) {
            self.statement(&stmt);
        }
        self.exit_scope();
    }

    /// Dispatch on statements, falling back to expressions for anything else
    fn visit(&mut self, node: &Node) {
        if STATEMENT_KINDS.contains(&node.kind()) {
            self.statement(node);
        } else {
            self.expr(node);
        }
    }

    fn visit_children(&mut self, node: &Node) {
        for child in named_children(node) {
            self.visit(&child);
        }
    }

    fn statement(&mut self, node: &Node) {
        match node.kind() {
            "block" => self.check_block(node),
            "statement_list" => self.visit_children(node),
            "short_var_declaration" => self.short_var_declaration(node),
            "var_declaration" => {
                for spec in var_specs(node) {
                    self.var_spec(&spec);
                }
            }
            "const_declaration" => {
                let mut specs = Vec::new();
                for child in named_children(node) {
                    if child.kind() == "const_spec" {
                        specs.push(child);
                    }
                }
                for spec in specs {
                    self.var_spec(&spec);
                }
            }
            "if_statement" => {
                self.enter_scope();
                if let Some(init) = node.child_by_field_name("initializer") {
                    self.visit(&init);
                }
                if let Some(condition) = node.child_by_field_name("condition") {
                    self.expr(&condition);
                }
                if let Some(consequence) = node.child_by_field_name("consequence") {
                    self.check_block(&consequence);
                }
                if let Some(alternative) = node.child_by_field_name("alternative") {
                    self.statement(&alternative);
                }
                self.exit_scope();
            }
            "for_statement" => self.for_statement(node),
            "expression_switch_statement" | "select_statement" => {
                self.enter_scope();
                if let Some(init) = node.child_by_field_name("initializer") {
                    self.visit(&init);
                }
                if let Some(value) = node.child_by_field_name("value") {
                    self.expr(&value);
                }
                for case in named_children(node) {
                    if matches!(
                        case.kind(),
                        "expression_case" | "default_case" | "communication_case"
                    ) {
                        self.case_clause(&case, None);
                    }
                }
                self.exit_scope();
            }
            "type_switch_statement" => self.type_switch(node),
            "labeled_statement" => {
                for child in named_children(node) {
                    if child.kind() != "label_name" {
                        self.visit(&child);
                    }
                }
            }
            "type_declaration" => {}
            _ => self.visit_children(node),
        }
    }

    fn short_var_declaration(&mut self, node: &Node) {
        let (Some(left), Some(right)) = (
            node.child_by_field_name("left"),
            node.child_by_field_name("right"),
        ) else {
            return;
        };
        let names = named_children(&left);
        let types = self.expression_list_types(&right, names.len());
        for (name, ty) in names.iter().zip(types) {
            if name.kind() == "identifier" {
                let text = node_text(name, self.source).to_string();
                // Redeclaration in the same scope keeps the original type
                let existing = self
                    .scopes
                    .last()
                    .and_then(|scope| scope.variables.get(&text))
                    .cloned();
                let ty = existing.unwrap_or(ty);
                self.table.record(name, ty.clone());
                self.record_variable(&text, ty);
            }
        }
    }

    fn var_spec(&mut self, spec: &Node) {
        let declared = spec
            .child_by_field_name("type")
            .map(|t| self.resolve_type(&t));
        let names = field_children(spec, "name");
        let values = match spec.child_by_field_name("value") {
            Some(values) => self.expression_list_types(&values, names.len()),
            None => vec![GoType::Unknown; names.len()],
        };
        for (name, value_ty) in names.iter().zip(values) {
            let ty = declared.clone().unwrap_or(value_ty);
            self.table.record(name, ty.clone());
            let text = node_text(name, self.source).to_string();
            self.record_variable(&text, ty);
        }
    }

    /// Types of an expression list assigned to `count` names, spreading a
    /// single multi-value call across them
    fn expression_list_types(&mut self, list: &Node, count: usize) -> Vec<GoType> {
        let exprs = if list.kind() == "expression_list" {
            named_children(list)
        } else {
            vec![*list]
        };
        let mut types: Vec<GoType> = exprs.iter().map(|e| self.expr(e)).collect();
        if types.len() == 1 && count > 1 {
            if let GoType::Tuple(items) = &types[0] {
                types = items.clone();
            }
        }
        types.resize(count, GoType::Unknown);
        types
    }

    fn for_statement(&mut self, node: &Node) {
        self.enter_scope();
        for child in named_children(node) {
            match child.kind() {
                "for_clause" => {
                    if let Some(init) = child.child_by_field_name("initializer") {
                        self.visit(&init);
                    }
                    if let Some(condition) = child.child_by_field_name("condition") {
                        self.expr(&condition);
                    }
                    if let Some(update) = child.child_by_field_name("update") {
                        self.visit(&update);
                    }
                }
                "range_clause" => self.range_clause(&child),
                "block" => self.check_block(&child),
                _ => {
                    self.expr(&child);
                }
            }
        }
        self.exit_scope();
    }

    fn range_clause(&mut self, clause: &Node) {
        let ranged = clause
            .child_by_field_name("right")
            .map(|right| self.expr(&right))
            .unwrap_or_default();
        let Some(left) = clause.child_by_field_name("left") else {
            return;
        };
        let (key, value) = match ranged.deref() {
            GoType::Slice(elem) => (GoType::Basic("int".into()), elem.as_ref().clone()),
            GoType::Map(k, v) => (k.as_ref().clone(), v.as_ref().clone()),
            GoType::Basic(name) if name == "string" => {
                (GoType::Basic("int".into()), GoType::Basic("rune".into()))
            }
            _ => (GoType::Unknown, GoType::Unknown),
        };
        let declares = node_text(clause, self.source)
            .split("range")
            .next()
            .is_some_and(|head| head.contains(":="));
        for (name, ty) in named_children(&left).iter().zip([key, value]) {
            if declares && name.kind() == "identifier" {
                self.table.record(name, ty.clone());
                let text = node_text(name, self.source).to_string();
                self.record_variable(&text, ty);
            } else {
                self.expr(name);
            }
        }
    }

    fn type_switch(&mut self, node: &Node) {
        self.enter_scope();
        if let Some(init) = node.child_by_field_name("initializer") {
            self.visit(&init);
        }
        let subject = node
            .child_by_field_name("value")
            .map(|value| self.expr(&value))
            .unwrap_or_default();
        let alias = node
            .child_by_field_name("alias")
            .and_then(|alias| named_children(&alias).into_iter().next())
            .map(|ident| node_text(&ident, self.source).to_string());

        for case in named_children(node) {
            match case.kind() {
                "type_case" => {
                    let types = field_children(&case, "type");
                    let bound = match (&alias, types.as_slice()) {
                        (Some(name), [single]) => {
                            Some((name.clone(), self.resolve_type(single)))
                        }
                        (Some(name), _) => Some((name.clone(), subject.clone())),
                        (None, _) => None,
                    };
                    self.case_clause(&case, bound);
                }
                "default_case" => {
                    let bound = alias.clone().map(|name| (name, subject.clone()));
                    self.case_clause(&case, bound);
                }
                _ => {}
            }
        }
        self.exit_scope();
    }

    /// Statements of a `case` clause in their own scope
    fn case_clause(&mut self, case: &Node, bound: Option<(String, GoType)>) {
        self.enter_scope();
        if let Some((name, ty)) = bound {
            self.record_variable(&name, ty);
        }
        let skipped: Vec<Node> = field_children(case, "type");
        for child in named_children(case) {
            if skipped.iter().any(|t| t.id() == child.id()) {
                continue;
            }
            match child.kind() {
                "expression_list" => {
                    for expr in named_children(&child) {
                        self.expr(&expr);
                    }
                }
                _ => self.visit(&child),
            }
        }
        self.exit_scope();
    }

    /// Type an expression, recording it and everything below it
    fn expr(&mut self, node: &Node) -> GoType {
        let ty = self.expr_type(node);
        let ty = self.registry.normalize(ty);
        self.table.record(node, ty.clone());
        ty
    }

    fn expr_type(&mut self, node: &Node) -> GoType {
        match node.kind() {
            "identifier" => self.resolve_identifier(node_text(node, self.source)),
            "selector_expression" => self.selector(node),
            "call_expression" => self.call(node),
            "parenthesized_expression" => named_children(node)
                .first()
                .map(|inner| self.expr(inner))
                .unwrap_or_default(),
            "unary_expression" => self.unary(node),
            "composite_literal" => {
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit_children(&body);
                }
                node.child_by_field_name("type")
                    .map(|t| self.resolve_type(&t))
                    .unwrap_or_default()
            }
            "func_literal" => {
                let signature = self.resolver().signature(node);
                self.check_function(node);
                GoType::Func(Box::new(signature))
            }
            "index_expression" => {
                let operand = node
                    .child_by_field_name("operand")
                    .map(|o| self.expr(&o))
                    .unwrap_or_default();
                if let Some(index) = node.child_by_field_name("index") {
                    self.expr(&index);
                }
                match operand.deref() {
                    GoType::Slice(elem) => elem.as_ref().clone(),
                    GoType::Map(_, value) => value.as_ref().clone(),
                    _ => GoType::Unknown,
                }
            }
            "slice_expression" => {
                self.visit_children(node);
                node.child_by_field_name("operand")
                    .and_then(|o| self.table.get(&o).cloned())
                    .unwrap_or_default()
            }
            "type_assertion_expression" => {
                if let Some(operand) = node.child_by_field_name("operand") {
                    self.expr(&operand);
                }
                node.child_by_field_name("type")
                    .map(|t| self.resolve_type(&t))
                    .unwrap_or_default()
            }
            "type_conversion_expression" => {
                if let Some(operand) = node.child_by_field_name("operand") {
                    self.expr(&operand);
                }
                node.child_by_field_name("type")
                    .map(|t| self.resolve_type(&t))
                    .unwrap_or_default()
            }
            "binary_expression" => {
                let left = node
                    .child_by_field_name("left")
                    .map(|l| self.expr(&l))
                    .unwrap_or_default();
                if let Some(right) = node.child_by_field_name("right") {
                    self.expr(&right);
                }
                let op = node
                    .child_by_field_name("operator")
                    .map(|op| node_text(&op, self.source))
                    .unwrap_or_default();
                match op {
                    "==" | "!=" | "<" | "<=" | ">" | ">=" | "&&" | "||" => {
                        GoType::Basic("bool".into())
                    }
                    _ => left,
                }
            }
            "interpreted_string_literal" | "raw_string_literal" => GoType::Basic("string".into()),
            "int_literal" => GoType::Basic("int".into()),
            "float_literal" => GoType::Basic("float64".into()),
            "rune_literal" => GoType::Basic("rune".into()),
            "true" | "false" => GoType::Basic("bool".into()),
            _ => {
                self.visit_children(node);
                GoType::Unknown
            }
        }
    }

    fn selector(&mut self, node: &Node) -> GoType {
        let (Some(operand), Some(field)) = (
            node.child_by_field_name("operand"),
            node.child_by_field_name("field"),
        ) else {
            return GoType::Unknown;
        };
        let operand_ty = self.expr(&operand);
        let member = node_text(&field, self.source);
        match &operand_ty {
            GoType::Package(path) => external::package_member(path, member),
            GoType::Unknown => GoType::Unknown,
            other => self.registry.member(other, member),
        }
    }

    fn call(&mut self, node: &Node) -> GoType {
        let Some(function) = node.child_by_field_name("function") else {
            return GoType::Unknown;
        };
        let arguments = node
            .child_by_field_name("arguments")
            .map(|args| named_children(&args))
            .unwrap_or_default();

        if function.kind() == "identifier" {
            let name = node_text(&function, self.source);
            match name {
                "new" | "make" if self.resolve_identifier(name).is_unknown() => {
                    let made = arguments
                        .first()
                        .map(|t| self.resolve_type(t))
                        .unwrap_or_default();
                    for arg in arguments.iter().skip(1) {
                        self.expr(arg);
                    }
                    return if name == "new" {
                        GoType::pointer_to(made)
                    } else {
                        made
                    };
                }
                _ if self.names_type(name) => {
                    for arg in &arguments {
                        self.expr(arg);
                    }
                    return self.resolve_type(&function);
                }
                _ => {}
            }
        }

        let callee = self.expr(&function);
        for arg in &arguments {
            self.visit(arg);
        }
        match callee {
            GoType::Func(signature) => signature.call_result(),
            _ => GoType::Unknown,
        }
    }

    fn unary(&mut self, node: &Node) -> GoType {
        let operand = node
            .child_by_field_name("operand")
            .map(|o| self.expr(&o))
            .unwrap_or_default();
        let op = node
            .child_by_field_name("operator")
            .map(|op| node_text(&op, self.source))
            .unwrap_or_default();
        match op {
            "&" => GoType::pointer_to(operand),
            "*" => match operand {
                GoType::Pointer(inner) => *inner,
                _ => GoType::Unknown,
            },
            "<-" => GoType::Unknown,
            "!" => GoType::Basic("bool".into()),
            _ => operand,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parser::parse_source;
    use crate::types::external::{DATABASE_SQL, SQLX};
    use crate::types::{NamedType, TypeDesc};
    use indoc::indoc;
    use std::path::Path;

    /// Find the receiver of the first call whose method is `method`
    fn receiver_desc(source: &str, method: &str) -> TypeDesc {
        let file = parse_source(source, Path::new("a.go")).unwrap();
        let registry = PackageRegistry::build("a", "example.com/a", std::slice::from_ref(&file))
            .unwrap();
        let types = Checker::new(&registry, &file).check_file();

        let mut stack = vec![file.root()];
        while let Some(node) = stack.pop() {
            if node.kind() == "selector_expression" {
                let field = node.child_by_field_name("field").unwrap();
                if file.text(&field) == method {
                    let operand = node.child_by_field_name("operand").unwrap();
                    return types.describe(&operand);
                }
            }
            let mut cursor = node.walk();
            stack.extend(node.children(&mut cursor));
        }
        panic!("no call to {method}");
    }

    fn sql_db() -> TypeDesc {
        TypeDesc::NamedPointer(NamedType::new(DATABASE_SQL, "DB"))
    }

    #[test]
    fn test_package_var_receiver() {
        let desc = receiver_desc(
            indoc! {r#"
                package a

                import "database/sql"

                var db *sql.DB

                func list() { db.Query("SELECT 1") }
            "#},
            "Query",
        );
        assert_eq!(desc, sql_db());
    }

    #[test]
    fn test_parameter_and_aliased_import() {
        let desc = receiver_desc(
            indoc! {r#"
                package a

                import stdsql "database/sql"

                func list(conn *stdsql.DB) { conn.Exec("DELETE FROM t") }
            "#},
            "Exec",
        );
        assert_eq!(desc, sql_db());
    }

    #[test]
    fn test_multi_value_short_var_declaration() {
        let desc = receiver_desc(
            indoc! {r#"
                package a

                import "database/sql"

                func open() {
                    conn, err := sql.Open("postgres", "")
                    if err != nil {
                        return
                    }
                    conn.QueryRow("SELECT 1")
                }
            "#},
            "QueryRow",
        );
        assert_eq!(desc, sql_db());
    }

    #[test]
    fn test_struct_field_through_method_receiver() {
        let desc = receiver_desc(
            indoc! {r#"
                package a

                import "github.com/jmoiron/sqlx"

                type Repo struct {
                    db *sqlx.DB
                }

                func (r *Repo) Load() {
                    tx := r.db.MustBegin()
                    tx.Select(nil, "SELECT 1")
                }
            "#},
            "Select",
        );
        assert_eq!(desc, TypeDesc::NamedPointer(NamedType::new(SQLX, "Tx")));
    }

    #[test]
    fn test_shadowing_in_inner_scope() {
        let desc = receiver_desc(
            indoc! {r#"
                package a

                import "database/sql"

                var db *sql.DB

                type fake struct{}

                func (fake) Query(string) {}

                func run() {
                    {
                        db := fake{}
                        db.Query("x")
                    }
                }
            "#},
            "Query",
        );
        assert_eq!(
            desc,
            TypeDesc::Named(NamedType::new("example.com/a", "fake"))
        );
    }

    #[test]
    fn test_range_over_slice_of_handles() {
        let desc = receiver_desc(
            indoc! {r#"
                package a

                import "database/sql"

                func pingAll(dbs []*sql.DB) {
                    for _, d := range dbs {
                        d.Exec("SELECT 1")
                    }
                }
            "#},
            "Exec",
        );
        assert_eq!(desc, sql_db());
    }

    #[test]
    fn test_func_literal_parameters_are_scoped() {
        let desc = receiver_desc(
            indoc! {r#"
                package a

                import "database/sql"

                func run() {
                    work := func(h *sql.DB) {
                        h.Prepare("SELECT 1")
                    }
                    _ = work
                }
            "#},
            "Prepare",
        );
        assert_eq!(desc, sql_db());
    }

    #[test]
    fn test_unknown_receiver_stays_unresolved() {
        let desc = receiver_desc(
            indoc! {r#"
                package a

                func run() { client.Query("x") }
            "#},
            "Query",
        );
        assert_eq!(desc, TypeDesc::Unresolved);
    }

    #[test]
    fn test_new_and_address_of() {
        let desc = receiver_desc(
            indoc! {r#"
                package a

                import "database/sql"

                func run() {
                    var value sql.DB
                    p := &value
                    p.Query("x")
                    q := new(sql.DB)
                    q.Exec("y")
                }
            "#},
            "Query",
        );
        assert_eq!(desc, sql_db());
    }
}
