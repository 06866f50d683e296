//! Tracing subscriber setup.
//!
//! Console output always goes to stderr so stdout stays free for the
//! assistant's own text. A daily-rotated file layer is added when
//! [`LoggingConfig::file_dir`] is set.

use crate::config::LoggingConfig;
use crate::error::{HarkError, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Build the filter: `RUST_LOG` wins, otherwise the configured directive.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.filter))
}

/// Install the global subscriber.
///
/// Returns the file writer guard when a file layer was installed. Keep it
/// alive for the lifetime of the process or buffered lines are lost.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .compact();

    match &config.file_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, "hark.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(env_filter(config))
                .with(console)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .compact(),
                )
                .try_init()
                .map_err(|e| HarkError::Config(format!("tracing already initialised: {e}")))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter(config))
                .with(console)
                .try_init()
                .map_err(|e| HarkError::Config(format!("tracing already initialised: {e}")))?;
            Ok(None)
        }
    }
}
