//! Same-file call-site patching for functions that gained a `ctx` parameter

use super::edits::EditSet;
use crate::loader::parser::node_text;
use crate::loader::SourceFile;
use tree_sitter::Node;

/// Prepend `ctx` to every call of `name` in `file`.
///
/// A call matches when its callee is the bare identifier `name` or a
/// selector whose member is `name`. Calls already passing `ctx` or `c`
/// first are left alone. Returns the number of patched call sites.
pub fn patch_call_sites(name: &str, file: &SourceFile, edits: &mut EditSet) -> usize {
    let mut patched = 0;
    let mut stack = vec![file.root()];
    while let Some(node) = stack.pop() {
        if node.kind() == "call_expression" && calls_name(&node, name, &file.source) {
            if let Some(args) = node.child_by_field_name("arguments") {
                if !edits.has_leading_ctx(&args, &file.source)
                    && edits.prepend_ctx_arg(&args, &file.source)
                {
                    patched += 1;
                }
            }
        }
        let mut cursor = node.walk();
        stack.extend(node.named_children(&mut cursor));
    }
    if patched > 0 {
        log::debug!("{}: patched {} call(s) to {}", file.file_name(), patched, name);
    }
    patched
}

fn calls_name(call: &Node, name: &str, source: &str) -> bool {
    let Some(function) = call.child_by_field_name("function") else {
        return false;
    };
    match function.kind() {
        "identifier" => node_text(&function, source) == name,
        "selector_expression" => function
            .child_by_field_name("field")
            .is_some_and(|field| node_text(&field, source) == name),
        _ => false,
    }
}
