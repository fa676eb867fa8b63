//! Makes sure a rewritten file imports `context`

use super::edits::EditSet;
use crate::loader::imports::collect_imports;
use crate::loader::parser::named_children;
use crate::loader::SourceFile;
use crate::types::external::CONTEXT;

const CONTEXT_IMPORT: &str = "\n\nimport (\n\t\"context\"\n)";

/// Whether the file already imports the context package under any name
pub fn imports_context(file: &SourceFile) -> bool {
    collect_imports(file).iter().any(|spec| spec.path == CONTEXT)
}

/// Add an `import ("context")` declaration on the line after the package
/// clause, past any comment trailing the clause.
///
/// Returns whether a declaration was added.
pub fn ensure_context_import(file: &SourceFile, edits: &mut EditSet) -> bool {
    if imports_context(file) {
        return false;
    }
    let root = file.root();
    let Some(clause) = named_children(&root)
        .into_iter()
        .find(|n| n.kind() == "package_clause")
    else {
        log::warn!("{}: no package clause, context import not added", file.file_name());
        return false;
    };
    let row = clause.end_position().row;
    let end = named_children(&root)
        .into_iter()
        .filter(|n| n.kind() == "comment" && n.start_byte() >= clause.end_byte())
        .take_while(|n| n.start_position().row == row)
        .last()
        .map_or(clause.end_byte(), |comment| comment.end_byte());
    edits.insert(end_of_line(&file.source, end), CONTEXT_IMPORT);
    true
}

/// Offset of the newline ending the line that contains `offset`
fn end_of_line(source: &str, offset: usize) -> usize {
    source[offset..]
        .find('\n')
        .map_or(source.len(), |newline| offset + newline)
}
