//! Error types for value conversion.

use thiserror::Error;

/// The main error type for conversion operations.
///
/// Every variant up to `UnterminatedToken` is a type conversion failure: the
/// value could not be mapped between its SQL and host representations. The
/// remaining variants belong to the session and runner around the converters.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// No converter claims the SQL type.
    #[error("Unsupported SQL type: '{0}'")]
    UnsupportedType(String),

    /// The SQL type is known but the host value cannot be written as it.
    #[error("Cannot convert {host_type} value to SQL type '{sql_type}'")]
    UnsupportedHostType { host_type: String, sql_type: String },

    /// The literal or value was rejected by the converter's parsing step.
    #[error("Invalid {sql_type} value '{value}': {reason}")]
    InvalidValue {
        sql_type: String,
        value: String,
        reason: String,
    },

    /// Structured literal does not follow the array/row grammar.
    #[error("Malformed literal at position {position}: {message}")]
    Malformed { position: usize, message: String },

    /// Quoted element never closed.
    #[error("Unterminated quoted string starting at position {0}")]
    UnterminatedString(usize),

    /// Bare element or nested level never closed.
    #[error("Unterminated element starting at position {0}")]
    UnterminatedToken(usize),

    /// Client time zone identifier is not in the tz database.
    #[error("Unknown time zone: '{0}'")]
    InvalidTimeZone(String),

    /// Client encoding cannot decode binary input.
    #[error("Unsupported client encoding: '{0}'")]
    UnsupportedEncoding(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error.
    #[error("Execution error: {0}")]
    Execution(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Create an invalid value error.
    pub fn invalid(
        sql_type: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            sql_type: sql_type.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported host type error.
    pub fn host(host_type: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self::UnsupportedHostType {
            host_type: host_type.into(),
            sql_type: sql_type.into(),
        }
    }

    /// Create a malformed literal error at the given position.
    pub fn malformed(position: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            position,
            message: message.into(),
        }
    }

    /// Whether this is a type conversion failure rather than a session error.
    pub fn is_type_conversion(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedType(_)
                | Self::UnsupportedHostType { .. }
                | Self::InvalidValue { .. }
                | Self::Malformed { .. }
                | Self::UnterminatedString(_)
                | Self::UnterminatedToken(_)
        )
    }
}

/// Result type alias for conversion operations.
pub type ConvertResult<T> = Result<T, ConvertError>;
