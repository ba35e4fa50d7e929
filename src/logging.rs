//! Structured logging setup.
//!
//! Everything in the crate logs through `tracing`; this module only installs
//! a subscriber. Library users with their own subscriber never call it.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `ATOMR_LOG_LEVEL` | `info` | base level when `RUST_LOG` is unset |
//! | `ATOMR_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `ATOMR_LOG_TARGET_FILTER` | unset | extra comma separated directives |
//! | `ATOMR_LOG_ASYNC` | `false` | write through a non-blocking worker |
//! | `ATOMR_LOG_INCLUDE_LOCATION` | `false` | add file and line |

use anyhow::{Context, Result};
use std::env;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    pub async_logging: bool,
    /// Comma separated `EnvFilter` directives
    pub target_filter: Option<String>,
    pub include_location: bool,
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`LogConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str| lookup(key).and_then(|s| s.parse().ok()).unwrap_or(false);
        Self {
            log_level: lookup("ATOMR_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            format: LogFormat::parse(&lookup("ATOMR_LOG_FORMAT").unwrap_or_default()),
            async_logging: flag("ATOMR_LOG_ASYNC"),
            target_filter: lookup("ATOMR_LOG_TARGET_FILTER"),
            include_location: flag("ATOMR_LOG_INCLUDE_LOCATION"),
        }
    }

    /// Verbose, human readable, synchronous.
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            async_logging: false,
            target_filter: None,
            include_location: true,
        }
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level().as_str()));
        if let Some(target_filter) = &self.target_filter {
            for directive in target_filter.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                match directive.parse() {
                    Ok(d) => filter = filter.add_directive(d),
                    Err(_) => eprintln!("Warning: Invalid log filter directive: {directive}"),
                }
            }
        }
        filter
    }
}

/// Install the global subscriber.
///
/// With async logging the returned guard flushes pending lines when dropped;
/// keep it alive for the lifetime of the process.
///
/// ```no_run
/// use atomrouter::logging::{init_logging_with_config, LogConfig};
///
/// let _guard = init_logging_with_config(&LogConfig::from_env()).unwrap();
/// ```
pub fn init_logging_with_config(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let (writer, guard) = if config.async_logging {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
        (tracing_subscriber::fmt::writer::BoxMakeWriter::new(writer), Some(guard))
    } else {
        (tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stderr), None)
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}
