//! Serializes rewritten files: canonical formatting, then stdout, write-back
//! or a `gofmt -l` style listing

use crate::config::EmitConfig;
use crate::errors::{Error, Result};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Where rewritten files go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitMode {
    /// Print every processed file to standard output
    Stdout,
    /// Overwrite changed files in place
    Overwrite,
    /// Print the paths of files that would change
    List,
}

/// External canonical formatter, resolved once per run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formatter {
    Disabled,
    /// Configured but not found on PATH; output is emitted unformatted
    Missing(String),
    Available(PathBuf),
}

impl Formatter {
    /// Locate the configured formatter executable
    pub fn locate(config: &EmitConfig) -> Self {
        if !config.format {
            return Formatter::Disabled;
        }
        match which::which(&config.formatter) {
            Ok(path) => {
                log::debug!("using formatter {}", path.display());
                Formatter::Available(path)
            }
            Err(err) => {
                log::warn!(
                    "{} not found ({}); emitting unformatted output",
                    config.formatter,
                    err
                );
                Formatter::Missing(config.formatter.clone())
            }
        }
    }

    /// Run `source` through the formatter, returning it unchanged when
    /// formatting is off or unavailable
    pub fn format(&self, source: &str, path: &Path) -> Result<String> {
        let Formatter::Available(program) = self else {
            return Ok(source.to_string());
        };

        let mut child = Command::new(program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::format(path, format!("failed to run {}: {}", program.display(), e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(source.as_bytes())
                .map_err(|e| Error::format(path, format!("failed to feed formatter: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .map_err(|e| Error::format(path, format!("formatter did not finish: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .trim()
                .replace("<standard input>", &path.display().to_string());
            return Err(Error::format(path, message));
        }
        String::from_utf8(output.stdout)
            .map_err(|e| Error::format(path, format!("formatter produced invalid UTF-8: {}", e)))
    }
}

pub struct Emitter {
    mode: EmitMode,
    formatter: Formatter,
}

impl Emitter {
    pub fn new(mode: EmitMode, formatter: Formatter) -> Self {
        Self { mode, formatter }
    }

    /// Emit one file. `rewritten` is `None` when the rewriter left the file
    /// untouched. Returns whether the file content changed.
    pub fn emit(
        &self,
        path: &Path,
        original: &str,
        rewritten: Option<&str>,
        out: &mut dyn Write,
    ) -> Result<bool> {
        let text = match rewritten {
            Some(text) => self.formatter.format(text, path)?,
            None => original.to_string(),
        };
        let changed = text != original;

        match self.mode {
            EmitMode::Stdout => {
                out.write_all(text.as_bytes())
                    .map_err(|source| write_error(path, source))?;
                if !text.ends_with('\n') {
                    writeln!(out).map_err(|source| write_error(path, source))?;
                }
            }
            EmitMode::Overwrite if changed => {
                write_file(path, &text)?;
                log::info!("rewrote {}", path.display());
            }
            EmitMode::Overwrite => {}
            EmitMode::List if changed => {
                writeln!(out, "{}", path.display())
                    .map_err(|source| write_error(path, source))?;
            }
            EmitMode::List => {}
        }
        Ok(changed)
    }
}

fn write_error(path: &Path, source: std::io::Error) -> Error {
    Error::Write {
        path: path.to_path_buf(),
        source,
    }
}

/// Replace the file's contents; the handle is closed when this returns
pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    let mut file = File::create(path).map_err(|source| write_error(path, source))?;
    file.write_all(contents.as_bytes())
        .and_then(|_| file.flush())
        .map_err(|source| write_error(path, source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn emitter(mode: EmitMode) -> Emitter {
        Emitter::new(mode, Formatter::Disabled)
    }

    #[test]
    fn test_disabled_formatter_is_identity() {
        let config = EmitConfig {
            format: false,
            ..EmitConfig::default()
        };
        let formatter = Formatter::locate(&config);
        assert_eq!(formatter, Formatter::Disabled);
        assert_eq!(formatter.format("x", Path::new("a.go")).unwrap(), "x");
    }

    #[test]
    fn test_missing_formatter_falls_back() {
        let config = EmitConfig {
            format: true,
            formatter: "definitely-not-a-go-formatter".to_string(),
        };
        let formatter = Formatter::locate(&config);
        assert!(matches!(formatter, Formatter::Missing(_)));
        assert_eq!(formatter.format("x", Path::new("a.go")).unwrap(), "x");
    }

    #[test]
    fn test_stdout_prints_unchanged_files_too() {
        let mut out = Vec::new();
        let changed = emitter(EmitMode::Stdout)
            .emit(Path::new("a.go"), "package a\n", None, &mut out)
            .unwrap();
        assert!(!changed);
        assert_eq!(String::from_utf8(out).unwrap(), "package a\n");
    }

    #[test]
    fn test_overwrite_writes_only_changed_files() {
        let temp = TempDir::new().unwrap();
        let changed_path = temp.path().join("a.go");
        let same_path = temp.path().join("b.go");
        fs::write(&changed_path, "old\n").unwrap();
        fs::write(&same_path, "same\n").unwrap();

        let emitter = emitter(EmitMode::Overwrite);
        let mut out = Vec::new();
        assert!(emitter
            .emit(&changed_path, "old\n", Some("new\n"), &mut out)
            .unwrap());
        assert!(!emitter
            .emit(&same_path, "same\n", Some("same\n"), &mut out)
            .unwrap());

        assert_eq!(fs::read_to_string(&changed_path).unwrap(), "new\n");
        assert_eq!(fs::read_to_string(&same_path).unwrap(), "same\n");
        assert!(out.is_empty());
    }

    #[test]
    fn test_list_mode_prints_changed_paths() {
        let emitter = emitter(EmitMode::List);
        let mut out = Vec::new();
        emitter
            .emit(Path::new("dir/a.go"), "a", Some("b"), &mut out)
            .unwrap();
        emitter
            .emit(Path::new("dir/b.go"), "a", None, &mut out)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "dir/a.go\n");
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let err = write_file(&temp.path().join("missing").join("a.go"), "x").unwrap_err();
        assert!(matches!(err, Error::Write { .. }));
    }
}
