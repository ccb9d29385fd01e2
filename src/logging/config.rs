use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::LoggingError;

/// Output format of a log layer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

/// Daily-rotated log file written through a non-blocking appender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub dir: PathBuf,
    /// File name prefix; the appender adds the date.
    pub prefix: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("logs"),
            prefix: "pipesub.log".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set, e.g. `info` or
    /// `pipesub=debug,warn`.
    pub level: String,
    pub format: LogFormat,
    pub ansi: bool,
    pub with_target: bool,
    /// File output; disabled when absent.
    pub file: Option<FileConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            ansi: true,
            with_target: true,
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn build_filter_directive(&self) -> String {
        self.level.trim().to_string()
    }

    pub fn validate(&self) -> Result<(), LoggingError> {
        if self.level.trim().is_empty() {
            return Err(LoggingError::InvalidConfig {
                field: "level",
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(file) = &self.file {
            if file.prefix.trim().is_empty() {
                return Err(LoggingError::InvalidConfig {
                    field: "file.prefix",
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}
