use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Broker tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Create a missing topic on first subscribe or publish instead of
    /// rejecting the call.
    pub auto_create_topics: bool,
    /// Pipe capacity used by `subscribe_with_defaults`.
    pub default_limit: usize,
    /// Wait bound, in seconds, used by `subscribe_with_defaults`.
    pub default_timeout_secs: f64,
    /// How long a graceful shutdown lets consumers drain their pipes.
    pub shutdown_timeout_secs: f64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            auto_create_topics: true,
            default_limit: 5,
            default_timeout_secs: 30.0,
            shutdown_timeout_secs: 30.0,
        }
    }
}

impl BrokerConfig {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.default_limit == 0 {
            return Err(SettingsError::invalid(
                "broker.default_limit",
                "must be greater than zero",
            ));
        }
        check_secs("broker.default_timeout_secs", self.default_timeout_secs)?;
        check_secs("broker.shutdown_timeout_secs", self.shutdown_timeout_secs)?;
        Ok(())
    }

    pub fn default_timeout(&self) -> Duration {
        secs_to_duration(self.default_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        secs_to_duration(self.shutdown_timeout_secs)
    }
}

fn check_secs(
    field: &'static str,
    secs: f64,
) -> Result<(), SettingsError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(SettingsError::invalid(
            field,
            format!("expected a non-negative number of seconds, got {secs}"),
        ));
    }
    Ok(())
}

/// Values too large for `Duration` saturate.
fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
