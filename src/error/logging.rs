use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised by [`init_logging`](crate::logging::init_logging).
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid logging configuration `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error("cannot create log directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("global subscriber already installed: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}
