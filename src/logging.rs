//! Tracing subscriber setup for the binary.

use tracing_appender::non_blocking;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};
use crate::errors::{ResonateError, Result};

/// Keeps the non-blocking writer flushing; drop it only on shutdown.
pub struct LoggingGuard(#[allow(dead_code)] non_blocking::WorkerGuard);

pub fn init_logging(cfg: &LoggingConfig) -> Result<LoggingGuard> {
    let (writer, guard) = non_blocking(std::io::stdout());
    let filter = std::env::var("RUST_LOG")
        .ok()
        .map(EnvFilter::new)
        .unwrap_or_else(|| EnvFilter::new(cfg.filter_directives.clone()));

    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(cfg.include_target)
        .with_file(cfg.include_file_line)
        .with_line_number(cfg.include_file_line);

    let registry = tracing_subscriber::registry().with(filter);

    let installed = match cfg.format {
        LogFormat::Json => registry
            .with(layer.json().flatten_event(true).with_current_span(true))
            .try_init(),
        LogFormat::Pretty => registry.with(layer).try_init(),
    };
    installed.map_err(|e| ResonateError::Config(format!("logging already initialised: {e}")))?;

    Ok(LoggingGuard(guard))
}
