//! Command implementations behind the CLI.
//!
//! - **rewrite**: load the packages of a directory, rewrite every selected
//!   file and emit the result

pub mod rewrite;

pub use rewrite::{run_rewrite, RewriteOptions, RunSummary};
