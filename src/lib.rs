//! sqlctxize rewrites a Go package so that its `database/sql` and sqlx calls
//! take a `context.Context`, threading `ctx` through the package's functions
//! and seeding it at HTTP and echo entry points.

pub mod classifier;
pub mod cli;
pub mod commands;
pub mod config;
pub mod emitter;
pub mod errors;
pub mod loader;
pub mod rewriter;
pub mod types;

pub use crate::classifier::{Classifier, FunctionClass};
pub use crate::config::SqlctxizeConfig;
pub use crate::errors::{Error, Result};
pub use crate::loader::{load_dir, LoadOutcome, Package, SourceFile};
pub use crate::rewriter::{Rewrite, RewriteStats, Rewriter};
