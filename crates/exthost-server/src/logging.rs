//! Tracing subscriber setup.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::error::{Result, ServerError};
use crate::settings::{LogFormat, Settings};

/// Rolled log files kept on disk.
pub const MAX_LOG_FILES: usize = 30;

/// Keeps the file writer flushing. Drop it only when the process is done
/// logging.
#[derive(Debug, Default)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Pick the filter directive: `--verbose` wins, then `RUST_LOG`, then the
/// settings file.
pub fn filter_directive(settings: &Settings, verbose: bool) -> String {
    if verbose {
        return "debug".to_string();
    }
    std::env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| settings.logging.filter.clone())
}

/// Install the global subscriber: console output in the configured format,
/// plus a daily-rolling file when a log directory is configured.
pub fn init(settings: &Settings, verbose: bool) -> Result<LoggingGuard> {
    let filter = EnvFilter::try_new(filter_directive(settings, verbose))
        .map_err(|e| ServerError::Logging(e.to_string()))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(match settings.logging.format {
        LogFormat::Pretty => fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed(),
    });

    let mut guard = LoggingGuard::default();
    if let Some(dir) = settings.log_dir() {
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("exthost")
            .filename_suffix("log")
            .max_log_files(MAX_LOG_FILES)
            .build(&dir)
            .map_err(|e| ServerError::Logging(format!("{}: {e}", dir.display())))?;
        let (writer, file_guard) = tracing_appender::non_blocking(appender);
        layers.push(fmt::layer().with_ansi(false).with_writer(writer).boxed());
        guard._file = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| ServerError::Logging(e.to_string()))?;

    tracing::debug!(format = ?settings.logging.format, "Logging initialised");
    Ok(guard)
}
