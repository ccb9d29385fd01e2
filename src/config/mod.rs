//! Runtime configuration.
//!
//! [`Settings`] is assembled with the `config` crate from built-in defaults,
//! an optional TOML file and `PIPESUB__*` environment variables, in that
//! order of precedence.

pub mod broker;
pub mod settings;

pub use broker::BrokerConfig;
pub use settings::{Settings, CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE, ENV_PREFIX};
