use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Severity of a message emitted by the mirroring core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Per-request detail, only shown with `--verbose`
    Verbose,
    Info,
    Error,
}

/// Side channel the core reports progress and failures through
#[cfg_attr(test, mockall::automock)]
pub trait Logger: Send + Sync {
    fn log(&self, level: LogLevel, message: &str);
}

/// Logger that forwards to the installed `tracing` subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Verbose => debug!("{}", message),
            LogLevel::Info => info!("{}", message),
            LogLevel::Error => error!("{}", message),
        }
    }
}

/// Initialize the logging system
///
/// Terminal output always goes to stderr; a log file, when given, receives
/// the same events without ANSI colouring.
pub fn init_logging(verbose: bool, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };

    let env_filter = EnvFilter::from_default_env()
        .add_directive(format!("site_mirror={}", level).parse()?)
        .add_directive("warn".parse()?);

    let fmt_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    if let Some(log_file) = log_file {
        if let Some(parent) = log_file.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create log directory: {}", parent.display()))?;
        }

        let file = fs::File::create(&log_file)
            .context(format!("Failed to create log file: {}", log_file.display()))?;
        let file_layer = fmt::layer().with_target(true).with_ansi(false).with_writer(file);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
    }

    Ok(())
}

/// Default location for `--log-file` when given without a path
pub fn default_log_file() -> PathBuf {
    let mut path = if let Some(proj_dirs) =
        directories::ProjectDirs::from("org", "site-mirror", "site-mirror")
    {
        proj_dirs.data_dir().to_path_buf()
    } else {
        PathBuf::from("./logs")
    };

    path.push("mirror.log");
    path
}
