//! Error types for rangeup-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for rangeup-core
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rangeup-core
#[derive(Error, Debug)]
pub enum Error {
    /// The task or its session can no longer be used
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// Content could not be read for the requested range
    #[error("Content read error: {message}")]
    ContentRead {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Network or retryable HTTP failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed range, unexpected status or unreadable response body
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Timeout
    #[error("Operation timed out")]
    Timeout,

    /// Cancelled by the caller
    #[error("Operation cancelled")]
    Cancelled,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    ConfigNotFound(PathBuf),

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidConfig(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] toml::de::Error),
}

impl Error {
    /// Build a content read error without an underlying cause
    pub fn content_read(message: impl Into<String>) -> Self {
        Error::ContentRead {
            message: message.into(),
            source: None,
        }
    }

    /// Build a content read error that keeps the I/O cause
    pub fn content_read_io(message: impl Into<String>, source: std::io::Error) -> Self {
        Error::ContentRead {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Stable name of the error category, as reported to callers.
    pub fn name(&self) -> &'static str {
        match self {
            Error::InvalidSession(_) => "InvalidSession",
            Error::ContentRead { .. } => "ContentReadError",
            Error::Transport(_) | Error::Timeout => "TransportError",
            Error::Protocol(_) | Error::Json(_) => "ProtocolError",
            Error::Cancelled => "Cancelled",
            Error::Config(_)
            | Error::ConfigNotFound(_)
            | Error::InvalidConfig(_)
            | Error::Serialization(_)
            | Error::Deserialization(_) => "ConfigError",
            Error::InvalidInput(_) => "InvalidInput",
            Error::Io(_) => "IoError",
        }
    }

    /// Whether the slice that produced this error may be sent again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_names() {
        assert_eq!(Error::InvalidSession("x".into()).name(), "InvalidSession");
        assert_eq!(Error::content_read("x").name(), "ContentReadError");
        assert_eq!(Error::Transport("x".into()).name(), "TransportError");
        assert_eq!(Error::Timeout.name(), "TransportError");
        assert_eq!(Error::Protocol("x".into()).name(), "ProtocolError");
    }

    #[test]
    fn test_only_transport_errors_are_retryable() {
        assert!(Error::Transport("reset".into()).is_retryable());
        assert!(Error::Timeout.is_retryable());
        assert!(!Error::Protocol("bad".into()).is_retryable());
        assert!(!Error::content_read("short").is_retryable());
        assert!(!Error::InvalidSession("done".into()).is_retryable());
    }

    #[test]
    fn test_content_read_keeps_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err = Error::content_read_io("bytes 0-9", io);
        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "Content read error: bytes 0-9");
    }
}
