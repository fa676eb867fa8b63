// Test utility module for sqlctxize integration tests
#![allow(dead_code)]

use sqlctxize::commands::{run_rewrite, RewriteOptions, RunSummary};
use sqlctxize::config::SqlctxizeConfig;
use sqlctxize::emitter::EmitMode;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Defaults with the external formatter switched off, so tests do not
/// depend on a Go toolchain
pub fn test_config() -> SqlctxizeConfig {
    let mut config = SqlctxizeConfig::default();
    config.emit.format = false;
    config
}

/// Write `files` into a fresh directory
pub fn write_package(files: &[(&str, &str)]) -> TempDir {
    let temp = TempDir::new().unwrap();
    for (name, content) in files {
        fs::write(temp.path().join(name), content).unwrap();
    }
    temp
}

pub fn run_in(dir: &Path, mode: EmitMode, files: Vec<PathBuf>) -> (String, RunSummary) {
    let options = RewriteOptions {
        dir: dir.to_path_buf(),
        mode,
        files,
    };
    let mut out = Vec::new();
    let summary = run_rewrite(&options, &test_config(), &mut out).unwrap();
    (String::from_utf8(out).unwrap(), summary)
}

/// Rewrite a directory to stdout and return everything printed
pub fn rewrite_dir(dir: &Path) -> String {
    run_in(dir, EmitMode::Stdout, Vec::new()).0
}

/// Rewrite a single-file package and return its new source
pub fn rewrite_source(source: &str) -> String {
    let temp = write_package(&[("main.go", source)]);
    rewrite_dir(temp.path())
}
