use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use super::core::SqlctxizeConfig;
use crate::errors::{Error, Result};

/// Name of the configuration file searched for next to the sources
pub const CONFIG_FILE_NAME: &str = ".sqlctxize.toml";

const MAX_TRAVERSAL_DEPTH: usize = 10;

/// Read the whole config file
pub(crate) fn read_config_file(path: &Path) -> std::result::Result<String, std::io::Error> {
    let file = fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut contents = String::new();
    reader.read_to_string(&mut contents)?;
    Ok(contents)
}

/// Parse and validate config from a TOML string
pub fn parse_and_validate_config(contents: &str) -> std::result::Result<SqlctxizeConfig, String> {
    let config = toml::from_str::<SqlctxizeConfig>(contents)
        .map_err(|e| format!("Failed to parse {}: {}", CONFIG_FILE_NAME, e))?;

    if config.rewrite.handle_types.iter().any(|t| t.trim().is_empty()) {
        return Err("rewrite.handle_types must not contain empty names".to_string());
    }
    if config.rewrite.extended_package.trim().is_empty() {
        return Err("rewrite.extended_package must not be empty".to_string());
    }
    if config.entry_points.http_package.trim().is_empty()
        || config.entry_points.framework_package.trim().is_empty()
    {
        return Err("entry_points package identifiers must not be empty".to_string());
    }

    Ok(config)
}

/// Try loading config from a specific path, logging anything but a missing file
pub(crate) fn try_load_config_from_path(config_path: &Path) -> Option<SqlctxizeConfig> {
    let contents = match read_config_file(config_path) {
        Ok(contents) => contents,
        Err(e) => {
            handle_read_error(config_path, &e);
            return None;
        }
    };

    match parse_and_validate_config(&contents) {
        Ok(config) => {
            log::debug!("Loaded config from {}", config_path.display());
            Some(config)
        }
        Err(e) => {
            log::warn!("{}. Using defaults.", e);
            None
        }
    }
}

pub(crate) fn handle_read_error(config_path: &Path, error: &std::io::Error) {
    if error.kind() != std::io::ErrorKind::NotFound {
        log::warn!(
            "Failed to read config file {}: {}",
            config_path.display(),
            error
        );
    }
}

/// Directory ancestors of `start`, nearest first, up to a depth limit
pub fn directory_ancestors(start: PathBuf, max_depth: usize) -> impl Iterator<Item = PathBuf> {
    std::iter::successors(Some(start), |dir| {
        let mut parent = dir.clone();
        if parent.pop() {
            Some(parent)
        } else {
            None
        }
    })
    .take(max_depth)
}

/// Load configuration for a source directory.
///
/// An explicit path must exist and parse; otherwise `.sqlctxize.toml` is
/// searched from `dir` upwards and defaults are used when none is found.
pub fn load_config(dir: &Path, explicit: Option<&Path>) -> Result<SqlctxizeConfig> {
    if let Some(path) = explicit {
        let contents = read_config_file(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        return parse_and_validate_config(&contents).map_err(Error::Configuration);
    }

    let start = dir
        .canonicalize()
        .unwrap_or_else(|_| dir.to_path_buf());

    Ok(directory_ancestors(start, MAX_TRAVERSAL_DEPTH)
        .map(|d| d.join(CONFIG_FILE_NAME))
        .find_map(|path| try_load_config_from_path(&path))
        .unwrap_or_else(|| {
            log::debug!("No {} found. Using default config.", CONFIG_FILE_NAME);
            SqlctxizeConfig::default()
        }))
}
