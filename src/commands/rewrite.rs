use crate::config::SqlctxizeConfig;
use crate::emitter::{EmitMode, Emitter, Formatter};
use crate::errors::Result;
use crate::loader::{load_dir, same_file, Package};
use crate::rewriter::{RewriteStats, Rewriter};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct RewriteOptions {
    pub dir: PathBuf,
    pub mode: EmitMode,
    /// Restrict rewriting to these files; empty means every file in `dir`
    pub files: Vec<PathBuf>,
}

/// Totals over one invocation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub packages: usize,
    pub files: usize,
    pub changed: usize,
    pub failed_packages: usize,
    pub failed_files: usize,
    pub stats: RewriteStats,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.failed_packages > 0 || self.failed_files > 0
    }
}

/// Rewrite the selected packages and emit every processed file to `out`.
///
/// Only an unreadable directory aborts the run. Package and file failures
/// are logged, counted in the summary, and the run continues.
pub fn run_rewrite(
    options: &RewriteOptions,
    config: &SqlctxizeConfig,
    out: &mut dyn Write,
) -> Result<RunSummary> {
    let emitter = Emitter::new(options.mode, Formatter::locate(&config.emit));
    let rewriter = Rewriter::new(config);
    let mut summary = RunSummary::default();

    for dir in directories_to_load(options) {
        log::debug!("loading packages from {}", dir.display());
        let outcome = load_dir(&dir)?;
        for failure in &outcome.failures {
            log::error!("{}", failure);
        }
        summary.failed_packages += outcome.failures.len();

        for package in &outcome.packages {
            summary.packages += 1;
            process_package(package, options, &rewriter, &emitter, out, &mut summary);
        }
    }

    log::info!(
        "{} package(s), {} file(s), {} changed: {} calls retargeted, {} functions augmented, {} call sites patched, {} entry points seeded",
        summary.packages,
        summary.files,
        summary.changed,
        summary.stats.retargeted,
        summary.stats.augmented,
        summary.stats.patched,
        summary.stats.seeded
    );
    Ok(summary)
}

fn process_package(
    package: &Package,
    options: &RewriteOptions,
    rewriter: &Rewriter,
    emitter: &Emitter,
    out: &mut dyn Write,
    summary: &mut RunSummary,
) {
    for (index, file) in package.files.iter().enumerate() {
        if !is_selected(options, &file.path) {
            continue;
        }
        let Some(types) = package.env.file(index) else {
            log::error!("{}: no type information", file.path.display());
            summary.failed_files += 1;
            continue;
        };

        summary.files += 1;
        let rewrite = rewriter.rewrite_file(file, types);
        let rewritten = (!rewrite.stats.is_noop()).then_some(rewrite.output.as_str());
        match emitter.emit(&file.path, &file.source, rewritten, out) {
            Ok(changed) => {
                if changed {
                    summary.changed += 1;
                }
                summary.stats += rewrite.stats;
            }
            Err(err) => {
                log::error!("{}", err);
                summary.failed_files += 1;
            }
        }
    }
}

/// Directories whose packages must be loaded: the target directory, or the
/// parents of explicitly named files in first-seen order
fn directories_to_load(options: &RewriteOptions) -> Vec<PathBuf> {
    if options.files.is_empty() {
        return vec![options.dir.clone()];
    }
    let mut dirs: Vec<PathBuf> = Vec::new();
    for file in &options.files {
        let parent = match file.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !dirs.contains(&parent) {
            dirs.push(parent);
        }
    }
    dirs
}

fn is_selected(options: &RewriteOptions, path: &Path) -> bool {
    options.files.is_empty() || options.files.iter().any(|f| same_file(f, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(files: &[&str]) -> RewriteOptions {
        RewriteOptions {
            dir: PathBuf::from("."),
            mode: EmitMode::Stdout,
            files: files.iter().map(PathBuf::from).collect(),
        }
    }

    #[test]
    fn test_directories_default_to_target_dir() {
        assert_eq!(directories_to_load(&options(&[])), vec![PathBuf::from(".")]);
    }

    #[test]
    fn test_directories_from_named_files() {
        assert_eq!(
            directories_to_load(&options(&["a.go", "pkg/b.go", "pkg/c.go"])),
            vec![PathBuf::from("."), PathBuf::from("pkg")]
        );
    }

    #[test]
    fn test_selection() {
        let opts = options(&["pkg/b.go"]);
        assert!(is_selected(&opts, Path::new("pkg/b.go")));
        assert!(!is_selected(&opts, Path::new("pkg/c.go")));
        assert!(is_selected(&options(&[]), Path::new("anything.go")));
    }
}
