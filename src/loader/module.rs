//! Import path discovery from the enclosing `go.mod`

use crate::config::directory_ancestors;
use std::fs;
use std::path::Path;

const MAX_MODULE_DEPTH: usize = 32;

/// Extract the module path from `go.mod` contents
pub fn parse_module_directive(contents: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let line = line.split("//").next()?.trim();
        let rest = line.strip_prefix("module")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let module = rest.trim().trim_matches('"');
        (!module.is_empty()).then(|| module.to_string())
    })
}

/// Import path of the package in `dir`.
///
/// Walks up to the nearest `go.mod` and joins its module path with the
/// relative directory. Falls back to the package clause name when no module
/// file is found.
pub fn package_import_path(dir: &Path, package_name: &str) -> String {
    let Ok(start) = dir.canonicalize() else {
        return package_name.to_string();
    };

    for ancestor in directory_ancestors(start.clone(), MAX_MODULE_DEPTH) {
        let go_mod = ancestor.join("go.mod");
        let Ok(contents) = fs::read_to_string(&go_mod) else {
            continue;
        };
        let Some(module) = parse_module_directive(&contents) else {
            log::debug!("{} has no module directive", go_mod.display());
            continue;
        };
        let relative = start
            .strip_prefix(&ancestor)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        return if relative.is_empty() {
            module
        } else {
            format!("{}/{}", module, relative)
        };
    }

    package_name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_module_directive() {
        assert_eq!(
            parse_module_directive("// comment\nmodule example.com/app // trailing\n\ngo 1.22\n"),
            Some("example.com/app".to_string())
        );
        assert_eq!(parse_module_directive("modules x\n"), None);
        assert_eq!(parse_module_directive("go 1.21\n"), None);
    }

    #[test]
    fn test_package_import_path_joins_relative_dir() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("go.mod"), "module example.com/app\n").unwrap();
        let pkg_dir = temp.path().join("internal").join("store");
        fs::create_dir_all(&pkg_dir).unwrap();

        assert_eq!(
            package_import_path(&pkg_dir, "store"),
            "example.com/app/internal/store"
        );
        assert_eq!(package_import_path(temp.path(), "main"), "example.com/app");
    }
}
