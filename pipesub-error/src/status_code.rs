use std::fmt;

use num_enum::TryFromPrimitive;

/// Status codes used to categorize broker and pipe errors.
///
/// # Ranges:
/// - 0xxx: Success
/// - 1xxx: General errors
/// - 2xxx: Topic / data errors
/// - 3xxx: Lifecycle (closed broker or pipe)
/// - 4xxx: Flow control (timeouts, delivery)
///
/// `num_enum::TryFromPrimitive` provides `TryFrom<u32>`, so a code received
/// from a host integration layer can be turned back into a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
#[non_exhaustive]
pub enum StatusCode {
    // === 0xxx: Success ===
    Success = 0,

    // === 1xxx: General errors ===
    Unknown = 1000,
    Unexpected = 1002,
    Internal = 1003,
    InvalidArgs = 1004,

    // === 2xxx: Topic / data errors ===
    NotFound = 2000,
    AlreadyExists = 2001,
    TypeError = 2002,
    InvalidValue = 2004,
    SerializationFailed = 2010,

    // === 3xxx: Lifecycle ===
    BrokerClosed = 3000,
    PipeClosed = 3001,

    // === 4xxx: Flow control ===
    Timeout = 4000,
    DeliveryFailed = 4001,
    SubscriptionFailed = 4002,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

////////////////////////////////////////////////////////////////////////////////
// Inherent methods
////////////////////////////////////////////////////////////////////////////////

impl StatusCode {
    /// Numeric representation of the status code.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Tries to map a `u32` back to a `StatusCode`.
    ///
    /// Returns `None` when the value matches no variant.
    pub fn from_u32(v: u32) -> Option<Self> {
        Self::try_from(v).ok()
    }

    /// Returns `true` when retrying the failed operation can succeed.
    ///
    /// The broker itself never retries; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::DeliveryFailed)
    }

    /// Returns `true` for errors caused by the request (bad arguments, unknown
    /// topic, closed broker).
    pub fn is_client_error(&self) -> bool {
        let c = self.code();
        if (2000..=3999).contains(&c) {
            return true;
        }
        matches!(self, Self::InvalidArgs)
    }

    /// Returns `true` for internal failures (1xxx except `InvalidArgs`) and
    /// failed deliveries/subscriptions (4xxx).
    pub fn is_server_error(&self) -> bool {
        if matches!(self, Self::InvalidArgs) {
            return false;
        }
        matches!(self.code(), 1000..=1999 | 4000..=4999)
    }

    /// Recommended log level for errors carrying this code.
    pub fn log_level(&self) -> LogLevel {
        match self {
            Self::Success => LogLevel::Trace,
            Self::NotFound | Self::AlreadyExists => LogLevel::Debug,
            Self::InvalidArgs
            | Self::TypeError
            | Self::InvalidValue
            | Self::BrokerClosed
            | Self::PipeClosed => LogLevel::Info,
            Self::Timeout | Self::DeliveryFailed | Self::SubscriptionFailed => LogLevel::Warn,
            Self::Internal | Self::Unexpected => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Trait impls
////////////////////////////////////////////////////////////////////////////////

impl From<StatusCode> for u32 {
    fn from(c: StatusCode) -> Self {
        c.code()
    }
}

impl fmt::Display for StatusCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
