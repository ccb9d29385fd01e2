use std::{any::Any, error::Error};

use crate::StatusCode;

/// Extension trait for the library's errors (object-safe).
///
/// Gives every error:
/// - a status code,
/// - a message that is safe to hand to a caller,
/// - a detailed message for logs,
/// - tags for observability systems.
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// Status of the error.
    ///
    /// Defaults to [`StatusCode::Internal`].
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    /// Returns the error as [`Any`](std::any::Any) so it can be downcast to a
    /// concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Message that can be shown to the caller.
    ///
    /// Internal errors are reported as `"Internal error"`.
    fn client_message(&self) -> String {
        match self.status_code() {
            StatusCode::Unknown | StatusCode::Internal | StatusCode::Unexpected => {
                "Internal error".to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Detailed message for logs.
    fn log_message(&self) -> String {
        format!("{self:?}")
    }

    /// Key-value tags for metrics.
    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("error_type", self.type_name()),
            ("status_code", self.status_code().to_string()),
        ]
    }

    /// Short type name of the error.
    fn type_name(&self) -> String {
        std::any::type_name::<Self>()
            .split("::")
            .last()
            .unwrap_or("Unknown")
            .to_string()
    }
}
