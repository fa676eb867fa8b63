//! Loads the Go packages of one directory
//!
//! Files are listed non-recursively in name order, parsed with
//! tree-sitter-go, grouped by their `package` clause and type-checked per
//! package. A failure in one package never prevents the others from loading.

pub mod imports;
pub mod module;
pub mod parser;

use crate::errors::{Error, Result};
use crate::types::{check_package, TypeEnvironment};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub use parser::{parse_source, SourceFile};

const GO_EXTENSION: &str = "go";

/// A type-checked package: its files in directory order plus their types
#[derive(Debug)]
pub struct Package {
    pub name: String,
    pub path: String,
    pub dir: PathBuf,
    pub files: Vec<SourceFile>,
    pub env: TypeEnvironment,
}

/// Packages that loaded, plus the diagnostics of those that did not
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub packages: Vec<Package>,
    pub failures: Vec<Error>,
}

/// Go source files directly inside `dir`, sorted by file name
pub fn list_go_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| Error::ReadDir {
            path: dir.to_path_buf(),
            source: e.into(),
        })?;
        let path = entry.path();
        if entry.file_type().is_file() && is_go_source(path) {
            files.push(path.to_path_buf());
        }
    }

    log::debug!("found {} Go files in {}", files.len(), dir.display());
    Ok(files)
}

fn is_go_source(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == GO_EXTENSION)
}

/// Package grouping of one directory, before type checking
struct PendingPackage {
    name: String,
    files: Vec<SourceFile>,
    failure: Option<Error>,
}

/// Load and type-check every package in `dir`.
///
/// Only an unreadable directory is an error; everything else is collected
/// into [`LoadOutcome::failures`].
pub fn load_dir(dir: &Path) -> Result<LoadOutcome> {
    let mut outcome = LoadOutcome::default();
    let mut pending: Vec<PendingPackage> = Vec::new();

    for path in list_go_files(dir)? {
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(source) => {
                outcome.failures.push(Error::ReadFile { path, source });
                continue;
            }
        };

        let (name, parsed) = match parse_source(&content, &path) {
            Ok(file) => match file.package_name() {
                Some(name) => (name.to_string(), Ok(file)),
                None => {
                    outcome
                        .failures
                        .push(Error::parse(&path, 1, 1, "missing package clause"));
                    continue;
                }
            },
            Err(err) => match sniff_package_name(&content) {
                Some(name) => (name, Err(err)),
                None => {
                    outcome.failures.push(err);
                    continue;
                }
            },
        };

        let index = match pending.iter().position(|p| p.name == name) {
            Some(index) => index,
            None => {
                pending.push(PendingPackage {
                    name: name.clone(),
                    files: Vec::new(),
                    failure: None,
                });
                pending.len() - 1
            }
        };
        let group = &mut pending[index];
        match parsed {
            Ok(file) => group.files.push(file),
            // The first diagnostic is the one reported for the package
            Err(err) => {
                if group.failure.is_none() {
                    group.failure = Some(err);
                }
            }
        }
    }

    for group in pending {
        if let Some(err) = group.failure {
            log::debug!("skipping package {} after parse failure", group.name);
            outcome.failures.push(err);
            continue;
        }
        let import_path = module::package_import_path(dir, &group.name);
        match check_package(&group.name, &import_path, &group.files) {
            Ok(env) => outcome.packages.push(Package {
                name: group.name,
                path: import_path,
                dir: dir.to_path_buf(),
                files: group.files,
                env,
            }),
            Err(err) => outcome.failures.push(err),
        }
    }

    Ok(outcome)
}

/// Package clause of a file that failed to parse, read line by line
fn sniff_package_name(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("package")?;
        if !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let name = rest.split("//").next()?.trim().trim_end_matches(';');
        (!name.is_empty()).then(|| name.to_string())
    })
}

/// Path equality that tolerates `./a.go` versus `a.go`
pub fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
