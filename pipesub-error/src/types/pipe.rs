use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Errors of a single subscriber pipe.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipeError {
    /// The pipe no longer accepts or yields events.
    #[error("pipe is closed")]
    Closed,

    #[error("nil values cannot be produced to a pipe")]
    NilEvent,

    /// No room (produce) or no event (consume) before the deadline.
    #[error("operation has timed out")]
    Timeout,

    /// The event could not be converted to the element type of the consumer.
    #[error("event cannot be converted to `{expected}`: {reason}")]
    TypeMismatch {
        expected: &'static str,
        reason: String,
    },

    #[error("pipe capacity must be greater than zero")]
    InvalidCapacity,
}

impl ErrorExt for PipeError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Closed => StatusCode::PipeClosed,
            Self::NilEvent => StatusCode::InvalidValue,
            Self::Timeout => StatusCode::Timeout,
            Self::TypeMismatch { .. } => StatusCode::TypeError,
            Self::InvalidCapacity => StatusCode::InvalidArgs,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "pipe".to_string()),
            ("status_code", self.status_code().to_string()),
        ];
        if let Self::TypeMismatch { expected, .. } = self {
            tags.push(("expected_type", expected.to_string()));
        }
        tags
    }
}
