//! Process-wide `tracing` setup.
//!
//! Library code only emits events; the binary calls [`init_logging`] once to
//! install a subscriber built from [`LoggingConfig`].

pub mod config;
mod filters;
pub mod formatter;
pub mod handle;
pub mod sinks;

pub use self::config::{FileConfig, LogFormat, LoggingConfig};
pub use handle::LoggingHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::LoggingError;

/// Installs the global subscriber described by `config`.
///
/// # Errors
/// - `InvalidConfig` if `config` fails validation
/// - `CreateDir` if the log directory cannot be created
/// - `Init` if a global subscriber is already installed
pub fn init_logging(config: &LoggingConfig) -> Result<LoggingHandle, LoggingError> {
    config.validate()?;

    let env_filter = filters::build_filter_from_config(config);
    let mut layers = vec![formatter::console_layer(config)];

    let file_guard = match &config.file {
        Some(file) => {
            let (file_layer, guard) = sinks::file::layer_with_config(config, file)?;
            layers.push(file_layer);
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(layers)
        .try_init()?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        format = config.format.as_str(),
        file_enabled = file_guard.is_some(),
        "Logging system initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}
