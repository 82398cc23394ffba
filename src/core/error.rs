//! Error types for tripfare
//!
//! Hard failures (bad coordinates, bad input) are surfaced to the caller.
//! Provider and persistence failures are soft: callers degrade and keep going.

use std::fmt;

/// A single rejected customer field
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationIssue {
    /// Field name as shown to the user ("name", "phone", "email", ...)
    pub field: &'static str,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Main error type for tripfare operations
#[derive(Debug)]
pub enum Error {
    /// Longitude outside [-180, 180] or latitude outside [-90, 90]
    InvalidCoordinate { longitude: f64, latitude: f64 },

    /// Routing provider failed or returned no route
    RouteUnavailable(String),

    /// Traffic, weather or search provider could not be reached
    ProviderUnreachable(String),

    /// Stored snapshot could not be decoded
    PersistenceCorrupt(String),

    /// Customer information rejected at confirmation time
    ValidationFailed(Vec<ValidationIssue>),

    /// HTTP-specific error (bad status, undecodable body)
    HttpError(String),

    /// File I/O error
    IoError(std::io::Error),

    /// Invalid configuration or parameters
    InvalidInput(String),
}

impl Error {
    /// Soft failures leave the trip usable; the caller may retry or degrade.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::RouteUnavailable(_)
                | Error::ProviderUnreachable(_)
                | Error::PersistenceCorrupt(_)
                | Error::ValidationFailed(_)
                | Error::HttpError(_)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidCoordinate { longitude, latitude } => {
                write!(
                    f,
                    "Invalid coordinate ({longitude}, {latitude}): longitude must be within [-180, 180] and latitude within [-90, 90]"
                )
            }
            Error::RouteUnavailable(msg) => {
                write!(f, "Route unavailable: {msg}")
            }
            Error::ProviderUnreachable(msg) => {
                write!(f, "Provider unreachable: {msg}")
            }
            Error::PersistenceCorrupt(msg) => {
                write!(f, "Stored trip state is corrupt: {msg}")
            }
            Error::ValidationFailed(issues) => {
                let joined = issues
                    .iter()
                    .map(|issue| issue.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                write!(f, "Validation failed: {joined}")
            }
            Error::HttpError(msg) => {
                write!(f, "HTTP error: {msg}")
            }
            Error::IoError(err) => {
                write!(f, "I/O error: {err}")
            }
            Error::InvalidInput(msg) => {
                write!(f, "Invalid input: {msg}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Error::ProviderUnreachable(err.to_string())
        } else {
            Error::HttpError(err.to_string())
        }
    }
}

/// Convenience result type for tripfare operations
pub type Result<T> = std::result::Result<T, Error>;
