//! Tree-sitter parser integration for Go
//!
//! Provides parsing with the tree-sitter Go grammar plus the small node
//! helpers shared by the checker, classifier and rewriter.

use crate::errors::{Error, Result};
use std::path::{Path, PathBuf};
use tree_sitter::{Node, Parser, Tree};

/// A parsed Go source file and its origin path
pub struct SourceFile {
    pub path: PathBuf,
    pub source: String,
    pub tree: Tree,
}

impl std::fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceFile")
            .field("path", &self.path)
            .field("len", &self.source.len())
            .finish()
    }
}

impl SourceFile {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn text(&self, node: &Node) -> &str {
        node_text(node, &self.source)
    }

    /// Name from the `package` clause, if the file has one
    pub fn package_name(&self) -> Option<&str> {
        let root = self.root();
        let mut cursor = root.walk();
        let clause = root
            .named_children(&mut cursor)
            .find(|n| n.kind() == "package_clause")?;
        let ident = clause.named_child(0)?;
        Some(node_text(&ident, &self.source))
    }

    /// File name without directories, used in log lines
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

fn go_parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser.set_language(&tree_sitter_go::LANGUAGE.into())?;
    Ok(parser)
}

/// Parse Go source code into a tree-sitter tree, rejecting files with syntax errors
pub fn parse_source(content: &str, path: &Path) -> Result<SourceFile> {
    let mut parser = go_parser()?;
    let tree = parser
        .parse(content, None)
        .ok_or_else(|| Error::parse(path, 1, 1, "parser produced no tree"))?;

    if let Some(bad) = first_error_node(tree.root_node()) {
        let message = if bad.is_missing() {
            format!("missing {}", bad.kind())
        } else {
            let snippet: String = node_text(&bad, content).chars().take(20).collect();
            format!("unexpected `{}`", snippet.trim())
        };
        return Err(Error::parse(path, node_line(&bad), node_column(&bad), message));
    }

    Ok(SourceFile {
        path: path.to_path_buf(),
        source: content.to_string(),
        tree,
    })
}

/// Locate the first ERROR or MISSING node in document order
pub fn first_error_node(node: Node) -> Option<Node> {
    if !node.has_error() {
        return None;
    }
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .find_map(first_error_node)
        .or(Some(node))
}

/// Get text for a tree-sitter node
pub fn node_text<'a>(node: &Node, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

/// Get the line number for a tree-sitter node (1-indexed)
pub fn node_line(node: &Node) -> usize {
    node.start_position().row + 1
}

/// Get the column number for a tree-sitter node (1-indexed)
pub fn node_column(node: &Node) -> usize {
    node.start_position().column + 1
}

/// Named children, skipping comments
pub fn named_children<'t>(node: &Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect()
}

/// All children carrying the given field name
pub fn field_children<'t>(node: &Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

/// Items inside a block, flattening the grammar's `statement_list` wrapper.
///
/// Comments are kept when `with_comments` is set so layout edits can move
/// them along with the statements around them.
pub fn block_items<'t>(block: &Node<'t>, with_comments: bool) -> Vec<Node<'t>> {
    let mut items = Vec::new();
    let mut cursor = block.walk();
    for child in block.named_children(&mut cursor) {
        if child.kind() == "statement_list" {
            let mut inner = child.walk();
            items.extend(
                child
                    .named_children(&mut inner)
                    .filter(|n| with_comments || n.kind() != "comment"),
            );
        } else if with_comments || child.kind() != "comment" {
            items.push(child);
        }
    }
    items
}

/// Statements of a block, without comments
pub fn block_statements<'t>(block: &Node<'t>) -> Vec<Node<'t>> {
    block_items(block, false)
}

/// Strip the quotes of an interpreted or raw string literal
pub fn unquote(literal: &str) -> &str {
    let trimmed = literal.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| trimmed.strip_prefix('`').and_then(|s| s.strip_suffix('`')))
        .unwrap_or(trimmed)
}
