use anyhow::{Context, Result};
use sqlctxize::cli::{parse_args, Cli};
use sqlctxize::commands::{run_rewrite, RewriteOptions};
use sqlctxize::config::load_config;
use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = parse_args();
    init_logging(cli.verbosity);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

// Default filter by -v count; RUST_LOG still wins
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = load_config(&cli.dir, cli.config.as_deref())
        .context("could not load configuration")?;
    if cli.no_format {
        config.emit.format = false;
    }

    let options = RewriteOptions {
        dir: cli.dir.clone(),
        mode: cli.emit_mode(),
        files: cli.files.clone(),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = run_rewrite(&options, &config, &mut out)?;
    out.flush().context("could not flush standard output")?;

    if summary.has_failures() {
        log::warn!(
            "{} package(s) and {} file(s) could not be processed",
            summary.failed_packages,
            summary.failed_files
        );
    }
    Ok(())
}
