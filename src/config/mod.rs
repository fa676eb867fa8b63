//! Configuration for sqlctxize
//!
//! Settings live in `.sqlctxize.toml`, discovered from the target directory
//! upwards or passed explicitly with `--config`. Every field has a default
//! that reproduces the stock behavior, so an empty file is valid.

mod core;
mod loader;

pub use self::core::{EmitConfig, EntryPointConfig, RewriteConfig, SqlctxizeConfig};
pub use loader::{directory_ancestors, load_config, parse_and_validate_config, CONFIG_FILE_NAME};
