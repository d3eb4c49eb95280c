//! Error types for flowctl.
//!
//! Every variant carries a stable code so CI logs and `--json` output can be
//! parsed without matching on message text.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for flowctl operations.
pub type Result<T> = std::result::Result<T, Error>;

/// flowctl error types.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The remote answered with a non-2xx status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "CONFIG_ERROR",
            Error::Parse(_) => "PARSE_ERROR",
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::Api { .. } => "API_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
            Error::Http(_) => "HTTP_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }

    /// Which part of the error taxonomy this belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Parse(_) | Error::Validation(_) | Error::Json(_) => ErrorKind::MalformedInput,
            Error::Api { .. } | Error::Http(_) => ErrorKind::Remote,
            Error::Config(_) => ErrorKind::Configuration,
            Error::Io(_) | Error::Internal(_) => ErrorKind::Local,
        }
    }

    /// HTTP status of a remote failure, if the remote answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Convert to a JSON error object for `--json` output.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        })
    }
}

/// Error taxonomy used for batch reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Document failed to parse or failed structural checks.
    MalformedInput,
    /// Non-2xx response or connection failure.
    Remote,
    /// Missing or invalid configuration. Fatal.
    Configuration,
    /// Local filesystem or internal failure.
    Local,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::MalformedInput => write!(f, "malformed_input"),
            ErrorKind::Remote => write!(f, "remote"),
            ErrorKind::Configuration => write!(f, "configuration"),
            ErrorKind::Local => write!(f, "local"),
        }
    }
}
