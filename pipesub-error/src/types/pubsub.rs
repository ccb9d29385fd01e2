use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StackError, StatusCode};

/// Errors returned by the broker.
///
/// `BrokerClosed`, `TopicNotFound`, `TopicExists`, `InvalidLimit`, `NilEvent`
/// and `Serialization` are produced synchronously, before any pipe is touched.
/// `SubscriptionFailed` and `PublishFailed` wrap the failure of an
/// asynchronous step; the original error is kept as `cause`.
#[derive(Debug, Clone, Error)]
pub enum PubSubError {
    #[error("pubsub is closed")]
    BrokerClosed,

    #[error("topic \"{topic}\" does not exist")]
    TopicNotFound { topic: String },

    #[error("topic \"{topic}\" already exists")]
    TopicExists { topic: String },

    #[error("subscription limit must be greater than zero, got {limit}")]
    InvalidLimit { limit: usize },

    #[error("nil values cannot be published")]
    NilEvent,

    #[error("event cannot be serialized: {reason}")]
    Serialization { reason: String },

    #[error("failed to subscribe to topic \"{topic}\": {cause}")]
    SubscriptionFailed {
        topic: String,
        #[source]
        cause: StackError,
    },

    #[error("failed to publish to topic \"{topic}\" ({failed} of {total} subscribers): {cause}")]
    PublishFailed {
        topic: String,
        failed: usize,
        total: usize,
        #[source]
        cause: StackError,
    },
}

impl PubSubError {
    /// The wrapped asynchronous failure, if any.
    pub fn cause(&self) -> Option<&StackError> {
        match self {
            Self::SubscriptionFailed { cause, .. } | Self::PublishFailed { cause, .. } => {
                Some(cause)
            }
            _ => None,
        }
    }
}

impl ErrorExt for PubSubError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BrokerClosed => StatusCode::BrokerClosed,
            Self::TopicNotFound { .. } => StatusCode::NotFound,
            Self::TopicExists { .. } => StatusCode::AlreadyExists,
            Self::InvalidLimit { .. } => StatusCode::InvalidArgs,
            Self::NilEvent => StatusCode::InvalidValue,
            Self::Serialization { .. } => StatusCode::SerializationFailed,
            Self::SubscriptionFailed { .. } => StatusCode::SubscriptionFailed,
            Self::PublishFailed { .. } => StatusCode::DeliveryFailed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::SubscriptionFailed { topic, cause } => {
                format!(
                    "Failed to subscribe to topic \"{topic}\": {}",
                    cause.client_message()
                )
            }
            _ => self.to_string(),
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "pubsub".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::TopicNotFound { topic }
            | Self::TopicExists { topic }
            | Self::SubscriptionFailed { topic, .. } => {
                tags.push(("topic", topic.clone()));
            }
            Self::PublishFailed {
                topic,
                failed,
                total,
                ..
            } => {
                tags.push(("topic", topic.clone()));
                tags.push(("failed", failed.to_string()));
                tags.push(("total", total.to_string()));
            }
            _ => {}
        }

        tags
    }
}
