/// Settings loading (defaults, TOML file, environment).
pub mod config;
/// Crate error types, plus re-exports from `pipesub-error`.
pub mod error;
/// `tracing` subscriber setup (console and file layers).
pub mod logging;
/// Bounded per-subscriber event queues and typed streams over them.
pub mod pipe;
/// Pub/Sub: broker, topic registry, subscription launcher.
pub mod pubsub;
/// Shared deadline timer for pipe waits.
pub mod timer;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// Configuration.
pub use crate::config::{BrokerConfig, Settings};
/// Errors.
pub use error::{
    ErrorExt, LoggingError, PipeError, PubSubError, SettingsError, StackError, StatusCode,
};
/// Logging.
pub use logging::{init_logging, LoggingConfig, LoggingHandle};
/// Pipes and streams.
pub use pipe::{EventStream, Pipe, PipeStatus};
/// Pub/Sub API.
pub use pubsub::{PendingSubscription, PubSub, SubscriptionCallback, TaskOutcome, TopicRegistry};
/// Timer.
pub use timer::{Timer, TimerStats};
