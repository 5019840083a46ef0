//! Logging configuration

use std::path::PathBuf;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::errors::DeployError;

/// Parse a log level name (`error`, `warn`, `info`, `debug`, `trace`, `off`)
pub fn parse_level(value: &str) -> Result<LevelFilter, DeployError> {
    value
        .parse()
        .map_err(|_| DeployError::ConfigError(format!("Invalid log level: {}", value)))
}

/// Logging options
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Level used when `RUST_LOG` is unset
    pub log_level: LevelFilter,

    /// Write logs to stdout
    pub stdout: bool,

    /// Also write logs to a file in this directory
    pub log_dir: Option<PathBuf>,

    /// Enable JSON format
    pub json_format: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::INFO,
            stdout: true,
            log_dir: None,
            json_format: false,
        }
    }
}

/// Initialize logging.
///
/// `RUST_LOG` takes precedence over the configured level. The returned guard
/// flushes the file sink on drop and must be held until the process exits.
pub fn init_logging(options: LogOptions) -> Result<Option<WorkerGuard>, DeployError> {
    let filter = EnvFilter::builder()
        .with_default_directive(options.log_level.into())
        .from_env_lossy();

    let stdout_layer = options.stdout.then(|| {
        if options.json_format {
            fmt::layer().json().boxed()
        } else {
            fmt::layer().boxed()
        }
    });

    let (file_layer, guard) = match &options.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::never(dir, "stagehand.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            let layer = if options.json_format {
                layer.json().boxed()
            } else {
                layer.boxed()
            };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| DeployError::ConfigError(e.to_string()))?;

    Ok(guard)
}
