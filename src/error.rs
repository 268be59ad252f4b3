//! Error taxonomy for the monitor
//!
//! Every failure the supervisor can observe is classified into one of four
//! operator-visible error codes. The code is the only contract between the
//! recovery state machine and the status indicator / event log.

use crate::broker::BrokerError;
use crate::link::LinkError;
use crate::sensor::SensorError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use thiserror::Error;

/// Operator-visible error code, shown as a number of indicator blinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Wireless link failure
    Link = 1,
    /// Broker session failure
    Broker = 2,
    /// Sensor absent or faulty
    Sensor = 3,
    /// Anything unclassified
    Runtime = 4,
}

impl ErrorCode {
    /// Number of blinks in the indicator pattern
    pub fn blinks(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::Link => "link",
            ErrorCode::Broker => "broker",
            ErrorCode::Sensor => "sensor",
            ErrorCode::Runtime => "runtime",
        };
        write!(f, "E{} ({name})", self.blinks())
    }
}

/// Main error type for monitor operations
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Payload encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Runtime error: {message}")]
    Runtime { message: String },
}

impl MonitorError {
    /// Classify this error for the indicator and log
    pub fn error_code(&self) -> ErrorCode {
        match self {
            MonitorError::Link(_) => ErrorCode::Link,
            MonitorError::Broker(_) => ErrorCode::Broker,
            MonitorError::Sensor(_) => ErrorCode::Sensor,
            MonitorError::Config(_)
            | MonitorError::Encoding(_)
            | MonitorError::Runtime { .. } => ErrorCode::Runtime,
        }
    }

    /// Create unclassified runtime error
    pub fn runtime<S: Into<String>>(message: S) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Log-safe rendering of this error
    pub fn to_log_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

/// Result type for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;

const MAX_LOG_MESSAGE_LEN: usize = 500;

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|passwd|psk|token|key|secret)[=:]\s*\S+")
        .expect("secret pattern is a valid regex")
});

/// Redact credentials and bound the length of a message before it is
/// written anywhere persistent
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = SECRET_PATTERN
        .replace_all(message, "${1}=***")
        .to_string();

    if sanitized.len() > MAX_LOG_MESSAGE_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_LOG_MESSAGE_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str(truncate_suffix);
    }

    sanitized
}
