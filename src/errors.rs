//! Shared error types for sqlctxize

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for sqlctxize operations
#[derive(Debug, Error)]
pub enum Error {
    /// The target directory could not be listed
    #[error("Failed to read directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source file could not be read
    #[error("Failed to read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Parsing errors
    #[error("Parse error in {}:{line}:{column}: {message}", file.display())]
    Parse {
        file: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },

    /// Package-level resolution errors
    #[error("Type check failed for package {package}: {message}")]
    TypeCheck { package: String, message: String },

    /// The external formatter rejected the rendered source
    #[error("Failed to format {}: {message}", path.display())]
    Format { path: PathBuf, message: String },

    /// Write-back errors
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The Go grammar could not be loaded into the parser
    #[error("Failed to load Go grammar: {0}")]
    Language(#[from] tree_sitter::LanguageError),
}

impl Error {
    /// Create a parse error with location
    pub fn parse(
        file: impl Into<PathBuf>,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        Self::Parse {
            file: file.into(),
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a type check error for a package
    pub fn type_check(package: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TypeCheck {
            package: package.into(),
            message: message.into(),
        }
    }

    /// Create a formatter error for a file
    pub fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type alias using our error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_includes_location() {
        let err = Error::parse("handlers.go", 12, 4, "unexpected `}`");
        assert_eq!(
            err.to_string(),
            "Parse error in handlers.go:12:4: unexpected `}`"
        );
    }

    #[test]
    fn test_type_check_error_display() {
        let err = Error::type_check("store", "function helper redeclared");
        assert_eq!(
            err.to_string(),
            "Type check failed for package store: function helper redeclared"
        );
    }

    #[test]
    fn test_read_dir_error_keeps_source() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = Error::ReadDir {
            path: PathBuf::from("nowhere"),
            source,
        };
        assert!(err.to_string().starts_with("Failed to read directory nowhere"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
