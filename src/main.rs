use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use dustpan::cli::{self, CliAction, USAGE};
use dustpan::config::{self, Config, FileConfig};
use dustpan::driver;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args_os()
        .skip(1)
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();

    // --ignore-config only counts as the very first argument.
    let file_config = if args.first().map(String::as_str) == Some("--ignore-config") {
        FileConfig::default()
    } else {
        let explicit = std::env::var_os("DUSTPAN_CONFIG").map(PathBuf::from);
        FileConfig::load(explicit.as_deref())?
    };

    let log_file = std::env::var_os("DUSTPAN_LOG_FILE")
        .map(PathBuf::from)
        .or_else(|| file_config.log_file.clone());
    init_logging(log_file.as_deref())?;

    let no_color = config::no_color_requested(std::env::var_os("NO_COLOR").as_deref());
    let config = Config::from_file(&file_config, no_color)?;
    tracing::debug!(?config, "Loaded configuration");

    match cli::parse_args(args, config)? {
        CliAction::Help => print!("{USAGE}"),
        CliAction::Version => println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        CliAction::Run(invocation) => driver::run(invocation)?,
    }

    Ok(())
}

/// Log to `log_file` if given. Otherwise only errors go to stderr, since the
/// dashboard owns the terminal.
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let default = if log_file.is_some() { "dustpan=warn" } else { "dustpan=error" };
    let filter = EnvFilter::try_from_env("DUSTPAN_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Can't open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(false).with_ansi(false).with_writer(Mutex::new(file)))
                .with(filter)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
    }
    Ok(())
}
