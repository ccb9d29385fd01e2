pub mod logging;
pub mod settings;

// Broker and pipe errors live in `pipesub-error`; re-exported here so the
// rest of the crate imports every error from one place.
pub use logging::LoggingError;
pub use pipesub_error::{
    ErrorContext, ErrorExt, GenericError, LogLevel, PipeError, PubSubError, StackError,
    StatusCode,
};
pub use settings::SettingsError;
