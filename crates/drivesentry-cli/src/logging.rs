//! Structured logging setup for the binary.
//!
//! The core only emits `tracing` events; this module decides where they go.
//! `RUST_LOG`, when set, always wins over the configured level.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Single-line, human-readable.
    #[default]
    Compact,
    /// Multi-line, human-readable.
    Pretty,
    /// One JSON object per line.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. "info".
    pub level: String,
    pub format: LogFormat,
    /// Include thread names (watcher threads are named after their watcher)
    pub include_thread_names: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            include_thread_names: false,
        }
    }
}

impl LoggingConfig {
    /// Verbose logging: debug level plus thread names.
    pub fn verbose(format: LogFormat) -> Self {
        Self {
            level: "debug".to_string(),
            format,
            include_thread_names: true,
        }
    }
}

/// Initialize structured logging based on configuration
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("Invalid log level {:?}", config.level))?;

    let builder = tracing_fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_thread_names(config.include_thread_names);

    match config.format {
        LogFormat::Compact => tracing::subscriber::set_global_default(builder.compact().finish()),
        LogFormat::Pretty => tracing::subscriber::set_global_default(builder.pretty().finish()),
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish()),
    }
    .context("Failed to set global tracing subscriber")?;

    tracing::debug!(
        "Structured logging initialized (level {}, format {})",
        config.level,
        config.format
    );
    Ok(())
}

/// Route panics through `tracing` before the default hook runs, so a
/// watcher thread that panics leaves a record in the same log stream.
pub fn setup_panic_hook() {
    let original_hook = std::panic::take_hook();

    std::panic::set_hook(Box::new(move |panic_info| {
        let panic_msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.as_str()
        } else {
            "Unknown panic payload"
        };

        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "Unknown location".to_string());

        let thread = std::thread::current();
        tracing::error!(
            panic.msg = panic_msg,
            panic.location = location,
            panic.thread = thread.name().unwrap_or("unnamed"),
            "Application panicked"
        );

        original_hook(panic_info);
    }));
}
