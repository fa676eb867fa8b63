use crate::emitter::EmitMode;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// Long options that Go-style invocations spell with a single dash
const GO_STYLE_LONG_FLAGS: &[&str] = &["dir", "config"];

#[derive(Parser, Debug)]
#[command(name = "sqlctxize")]
#[command(
    about = "Rewrite database/sql and sqlx calls in a Go package to their context-aware forms",
    long_about = None
)]
#[command(version)]
pub struct Cli {
    /// Overwrite source files instead of printing them
    #[arg(short = 'w')]
    pub write: bool,

    /// Directory whose Go files are processed
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// List files whose content would change
    #[arg(short = 'l', conflicts_with = "write")]
    pub list: bool,

    /// Configuration file (defaults to .sqlctxize.toml in the directory or its parents)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Skip the external formatter
    #[arg(long = "no-format")]
    pub no_format: bool,

    /// Increase verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Only rewrite these files; their packages are still loaded for type information
    pub files: Vec<PathBuf>,
}

impl Cli {
    pub fn emit_mode(&self) -> EmitMode {
        if self.list {
            EmitMode::List
        } else if self.write {
            EmitMode::Overwrite
        } else {
            EmitMode::Stdout
        }
    }
}

/// Accept `-dir x` and `-dir=x` as spelled by Go's flag package
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let Some(text) = arg.to_str() else {
                return arg;
            };
            let Some(rest) = text.strip_prefix('-').filter(|r| !r.starts_with('-')) else {
                return arg;
            };
            let name = rest.split('=').next().unwrap_or(rest);
            if GO_STYLE_LONG_FLAGS.contains(&name) {
                OsString::from(format!("-{}", text))
            } else {
                arg
            }
        })
        .collect()
}

/// Parse the process arguments, accepting Go-style long flags
pub fn parse_args() -> Cli {
    Cli::parse_from(normalize_args(std::env::args_os()))
}
