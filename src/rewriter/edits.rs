//! Edit overlay for an immutable syntax tree
//!
//! Every rewrite is recorded against the node it changes, keyed by
//! [`NodeKey`], and later rendered as byte splices over the original source.
//! Queries such as "does this argument list already start with `ctx`" look
//! at the overlay first, so callers observe the tree as if it had been
//! mutated in place.

use crate::loader::parser::{block_items, named_children, node_text};
use crate::types::NodeKey;
use std::collections::HashSet;
use tree_sitter::Node;

pub const CTX: &str = "ctx";
pub const CTX_PARAM: &str = "ctx context.Context";

/// Replace `source[start..end]` with `text`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Splice {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Splice {
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            start: at,
            end: at,
            text: text.into(),
        }
    }

    pub fn replace(start: usize, end: usize, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Pending rewrites of one file
#[derive(Debug, Default)]
pub struct EditSet {
    splices: Vec<Splice>,
    renamed: HashSet<NodeKey>,
    ctx_args: HashSet<NodeKey>,
    ctx_params: HashSet<NodeKey>,
    seeded: HashSet<NodeKey>,
}

impl EditSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.splices.is_empty()
    }

    /// Rename the identifier `field`; a node is renamed at most once
    pub fn rename(&mut self, field: &Node, replacement: &str) -> bool {
        if !self.renamed.insert(NodeKey::of(field)) {
            return false;
        }
        self.splices.push(Splice::replace(
            field.start_byte(),
            field.end_byte(),
            replacement,
        ));
        true
    }

    /// Whether the argument list starts with `ctx` or `c`, counting a pending prepend
    pub fn has_leading_ctx(&self, args: &Node, source: &str) -> bool {
        if self.ctx_args.contains(&NodeKey::of(args)) {
            return true;
        }
        named_children(args).first().is_some_and(|first| {
            first.kind() == "identifier" && matches!(node_text(first, source), "ctx" | "c")
        })
    }

    /// Prepend the identifier `ctx` to an `argument_list`
    pub fn prepend_ctx_arg(&mut self, args: &Node, source: &str) -> bool {
        if !self.ctx_args.insert(NodeKey::of(args)) {
            return false;
        }
        self.splices
            .push(prepend_to_list(args, source, CTX, !named_children(args).is_empty()));
        true
    }

    /// Whether a leading `ctx` parameter is already pending for this list
    pub fn has_ctx_param(&self, params: &Node) -> bool {
        self.ctx_params.contains(&NodeKey::of(params))
    }

    /// Prepend `ctx context.Context` to a `parameter_list`.
    ///
    /// When every existing parameter is unnamed they are named `_`, since Go
    /// does not allow mixing named and unnamed parameters.
    pub fn prepend_ctx_param(&mut self, params: &Node, source: &str) -> bool {
        if !self.ctx_params.insert(NodeKey::of(params)) {
            return false;
        }
        let decls = named_children(params);
        self.splices
            .push(prepend_to_list(params, source, CTX_PARAM, !decls.is_empty()));

        let all_unnamed = !decls.is_empty()
            && decls
                .iter()
                .all(|decl| decl.child_by_field_name("name").is_none());
        if all_unnamed {
            for decl in decls {
                self.splices.push(Splice::insert(decl.start_byte(), "_ "));
            }
        }
        true
    }

    /// Whether a seed statement is already pending for this body
    pub fn is_seeded(&self, body: &Node) -> bool {
        self.seeded.contains(&NodeKey::of(body))
    }

    /// Insert `statement` as the first statement of `body`, laid out the way
    /// gofmt would print it
    pub fn seed_body(&mut self, body: &Node, source: &str, statement: &str) -> bool {
        if !self.seeded.insert(NodeKey::of(body)) {
            return false;
        }
        self.splices.extend(seed_splices(body, source, statement));
        true
    }

    /// Raw insertion, used for file-level additions such as imports
    pub fn insert(&mut self, at: usize, text: impl Into<String>) {
        self.splices.push(Splice::insert(at, text));
    }

    /// Apply all splices to `source`.
    ///
    /// Splices are applied in start order; one that overlaps an earlier
    /// splice is dropped with a warning.
    pub fn render(&self, source: &str) -> String {
        let mut ordered: Vec<&Splice> = self.splices.iter().collect();
        ordered.sort_by_key(|s| (s.start, s.end));

        let mut out = String::with_capacity(source.len() + 64 * ordered.len());
        let mut cursor = 0;
        for splice in ordered {
            if splice.start < cursor || splice.end > source.len() {
                log::warn!(
                    "dropping overlapping edit at bytes {}..{}",
                    splice.start,
                    splice.end
                );
                continue;
            }
            out.push_str(&source[cursor..splice.start]);
            out.push_str(&splice.text);
            cursor = splice.end;
        }
        out.push_str(&source[cursor..]);
        out
    }
}

/// Splice putting `item` first in a parenthesized list
fn prepend_to_list(list: &Node, source: &str, item: &str, has_items: bool) -> Splice {
    let open = list.start_byte() + 1;
    let close = list.end_byte().saturating_sub(1).max(open);
    if !has_items {
        // `()` or `( )`; comments inside an empty list are left alone
        let inside = &source[open..close];
        return if inside.trim().is_empty() {
            Splice::replace(open, close, item)
        } else {
            Splice::insert(open, item)
        };
    }
    let multiline = source[open..].starts_with(['\n', '\r']);
    if multiline {
        Splice::insert(open, format!("{},", item))
    } else {
        Splice::insert(open, format!("{}, ", item))
    }
}

/// Leading whitespace of the line containing byte `pos`
pub fn line_indent(source: &str, pos: usize) -> &str {
    let line_start = source[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let rest = &source[line_start..];
    let width = rest
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(rest.len());
    &rest[..width]
}

fn seed_splices(body: &Node, source: &str, statement: &str) -> Vec<Splice> {
    let open = body.start_byte() + 1;
    let close = body.end_byte().saturating_sub(1).max(open);
    let indent = line_indent(source, body.start_byte());
    let inner = format!("{}\t", indent);
    let items = block_items(body, true);

    let Some(first) = items.first() else {
        return vec![Splice::replace(
            open,
            close,
            format!("\n{}{}\n{}", inner, statement, indent),
        )];
    };

    let lead = &source[open..first.start_byte()];
    if lead.contains('\n') {
        let first_indent = line_indent(source, first.start_byte());
        return vec![Splice::insert(
            open,
            format!("\n{}{}", first_indent, statement),
        )];
    }

    let mut splices = vec![Splice::replace(
        open,
        first.start_byte(),
        format!("\n{}{}\n{}", inner, statement, inner),
    )];

    // A body written on one line is split into one statement per line
    if !source[open..close].contains('\n') {
        for pair in items.windows(2) {
            splices.push(Splice::replace(
                pair[0].end_byte(),
                pair[1].start_byte(),
                format!("\n{}", inner),
            ));
        }
        if let Some(last) = items.last() {
            splices.push(Splice::replace(
                last.end_byte(),
                close,
                format!("\n{}", indent),
            ));
        }
    }
    splices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parser::{parse_source, SourceFile};
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn parse(source: &str) -> SourceFile {
        parse_source(source, Path::new("a.go")).unwrap()
    }

    fn find<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
        if node.kind() == kind {
            return Some(node);
        }
        let mut cursor = node.walk();
        let children: Vec<Node<'t>> = node.children(&mut cursor).collect();
        children.into_iter().find_map(|child| find(child, kind))
    }

    fn function_body<'t>(file: &'t SourceFile) -> Node<'t> {
        find(file.root(), "function_declaration")
            .and_then(|f| f.child_by_field_name("body"))
            .unwrap()
    }

    #[test]
    fn test_prepend_ctx_arg_forms() {
        let file = parse("package a\n\nfunc f() { g(); h(1, 2) }\n");
        let mut edits = EditSet::new();
        let mut stack = vec![file.root()];
        while let Some(node) = stack.pop() {
            if node.kind() == "argument_list" {
                assert!(edits.prepend_ctx_arg(&node, &file.source));
                assert!(!edits.prepend_ctx_arg(&node, &file.source));
                assert!(edits.has_leading_ctx(&node, &file.source));
            }
            let mut cursor = node.walk();
            stack.extend(node.children(&mut cursor));
        }
        assert_eq!(
            edits.render(&file.source),
            "package a\n\nfunc f() { g(ctx); h(ctx, 1, 2) }\n"
        );
    }

    #[test]
    fn test_multiline_argument_list() {
        let file = parse("package a\n\nfunc f() {\n\tg(\n\t\t1,\n\t)\n}\n");
        let args = find(file.root(), "argument_list").unwrap();
        let mut edits = EditSet::new();
        edits.prepend_ctx_arg(&args, &file.source);
        assert_eq!(
            edits.render(&file.source),
            "package a\n\nfunc f() {\n\tg(ctx,\n\t\t1,\n\t)\n}\n"
        );
    }

    #[test]
    fn test_prepend_ctx_param_names_unnamed_params() {
        let file = parse("package a\n\nfunc f(int, ...string) {}\n");
        let params = find(file.root(), "parameter_list").unwrap();
        let mut edits = EditSet::new();
        edits.prepend_ctx_param(&params, &file.source);
        assert!(edits.has_ctx_param(&params));
        assert_eq!(
            edits.render(&file.source),
            "package a\n\nfunc f(ctx context.Context, _ int, _ ...string) {}\n"
        );
    }

    #[test]
    fn test_prepend_ctx_param_to_empty_list() {
        let file = parse("package a\n\nfunc f() {}\n");
        let params = find(file.root(), "parameter_list").unwrap();
        let mut edits = EditSet::new();
        edits.prepend_ctx_param(&params, &file.source);
        assert_eq!(
            edits.render(&file.source),
            "package a\n\nfunc f(ctx context.Context) {}\n"
        );
    }

    #[test]
    fn test_seed_multiline_body() {
        let file = parse("package a\n\nfunc f() {\n\t// lead\n\tg()\n}\n");
        let mut edits = EditSet::new();
        edits.seed_body(&function_body(&file), &file.source, "ctx := r.Context()");
        assert_eq!(
            edits.render(&file.source),
            "package a\n\nfunc f() {\n\tctx := r.Context()\n\t// lead\n\tg()\n}\n"
        );
    }

    #[test]
    fn test_seed_single_line_body_is_split() {
        let file = parse("package a\n\nfunc f() { g(); h() }\n");
        let mut edits = EditSet::new();
        edits.seed_body(&function_body(&file), &file.source, "ctx := r.Context()");
        assert_eq!(
            edits.render(&file.source),
            "package a\n\nfunc f() {\n\tctx := r.Context()\n\tg()\n\th()\n}\n"
        );
    }

    #[test]
    fn test_seed_empty_body() {
        let file = parse("package a\n\nfunc f() {}\n");
        let mut edits = EditSet::new();
        let body = function_body(&file);
        edits.seed_body(&body, &file.source, "ctx := r.Context()");
        assert!(edits.is_seeded(&body));
        assert_eq!(
            edits.render(&file.source),
            "package a\n\nfunc f() {\n\tctx := r.Context()\n}\n"
        );
    }

    #[test]
    fn test_overlapping_splice_is_dropped() {
        let mut edits = EditSet::new();
        edits.splices.push(Splice::replace(0, 5, "AAAAA"));
        edits.splices.push(Splice::replace(3, 7, "B"));
        assert_eq!(edits.render("0123456789"), "AAAAA56789");
    }

    #[test]
    fn test_line_indent() {
        let source = "a\n\t\tb {\n";
        assert_eq!(line_indent(source, source.find('{').unwrap()), "\t\t");
        assert_eq!(line_indent(source, 0), "");
    }
}
