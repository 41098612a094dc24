//! Error types and classification for the playlist pipeline
//!
//! Every failure carries a structured [`ErrorKind`] assigned where the error
//! originates. Nothing downstream reconstructs a kind from message text.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Structured failure kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network failure or timeout, retryable
    Transient,
    /// Upstream answered with a 5xx-class status, retryable
    ProviderUnavailable,
    /// Upstream reported the requested entity does not exist
    NotFound,
    /// Upstream response did not have the expected shape
    Malformed,
    /// Call short-circuited by an open circuit breaker
    BreakerOpen,
    /// Upstream refused the request (4xx other than 404)
    Rejected,
    /// Local validation failed before any network call
    InvalidInput,
}

impl ErrorKind {
    /// Whether another attempt of the same call can succeed
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient | ErrorKind::ProviderUnavailable)
    }

    /// Whether the circuit breaker books this as a failed round-trip.
    ///
    /// `NotFound` and `Rejected` mean the provider answered, so they count as
    /// healthy calls. `BreakerOpen` and `InvalidInput` never reach the network.
    #[must_use]
    pub fn counts_as_failure(self) -> bool {
        matches!(
            self,
            ErrorKind::Transient | ErrorKind::ProviderUnavailable | ErrorKind::Malformed
        )
    }

    /// Classify a non-success HTTP status. Returns `None` for 2xx.
    #[must_use]
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            404 => Some(ErrorKind::NotFound),
            408 | 429 => Some(ErrorKind::Transient),
            400..=499 => Some(ErrorKind::Rejected),
            500..=599 => Some(ErrorKind::ProviderUnavailable),
            _ => Some(ErrorKind::Malformed),
        }
    }

    /// Caller-visible class of this kind
    #[must_use]
    pub fn class(self) -> ErrorClass {
        match self {
            ErrorKind::NotFound => ErrorClass::NotFound,
            ErrorKind::Transient
            | ErrorKind::ProviderUnavailable
            | ErrorKind::Malformed
            | ErrorKind::BreakerOpen => ErrorClass::Unavailable,
            ErrorKind::Rejected | ErrorKind::InvalidInput => ErrorClass::BadRequest,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transient => "transient failure",
            ErrorKind::ProviderUnavailable => "provider unavailable",
            ErrorKind::NotFound => "not found",
            ErrorKind::Malformed => "malformed response",
            ErrorKind::BreakerOpen => "circuit open",
            ErrorKind::Rejected => "request rejected",
            ErrorKind::InvalidInput => "invalid input",
        };
        f.write_str(name)
    }
}

/// Caller-visible outcome class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    NotFound,
    Unavailable,
    BadRequest,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClass::NotFound => "not found",
            ErrorClass::Unavailable => "service unavailable",
            ErrorClass::BadRequest => "bad request",
        };
        f.write_str(name)
    }
}

/// Pipeline step an error originated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Input,
    Weather,
    Token,
    Search,
    Pipeline,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Input => "input",
            Stage::Weather => "weather",
            Stage::Token => "catalog token",
            Stage::Search => "catalog search",
            Stage::Pipeline => "pipeline",
        };
        f.write_str(name)
    }
}

/// Main error type for the playlist pipeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} {kind}: {message}")]
pub struct PlaylistError {
    pub kind: ErrorKind,
    pub stage: Stage,
    pub message: String,
}

impl PlaylistError {
    pub fn new<S: Into<String>>(stage: Stage, kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            stage,
            message: message.into(),
        }
    }

    /// Create a network or timeout error
    pub fn transient<S: Into<String>>(stage: Stage, message: S) -> Self {
        Self::new(stage, ErrorKind::Transient, message)
    }

    /// Create a response-shape error
    pub fn malformed<S: Into<String>>(stage: Stage, message: S) -> Self {
        Self::new(stage, ErrorKind::Malformed, message)
    }

    /// Create a fast-fail error for an open breaker
    pub fn breaker_open<S: Into<String>>(stage: Stage, message: S) -> Self {
        Self::new(stage, ErrorKind::BreakerOpen, message)
    }

    /// Create an input validation error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::new(Stage::Input, ErrorKind::InvalidInput, message)
    }

    /// Create an error for an upstream status code
    pub fn from_status<S: Into<String>>(stage: Stage, status: u16, message: S) -> Self {
        let kind = ErrorKind::from_status(status).unwrap_or(ErrorKind::Malformed);
        Self::new(stage, kind, message)
    }

    #[must_use]
    pub fn class(&self) -> ErrorClass {
        self.kind.class()
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::NotFound => format!("Location not found: {}", self.message),
            ErrorKind::InvalidInput => format!("Invalid input: {}", self.message),
            ErrorKind::Rejected => format!("The {} provider rejected the request", self.stage),
            ErrorKind::BreakerOpen
            | ErrorKind::Transient
            | ErrorKind::ProviderUnavailable
            | ErrorKind::Malformed => {
                format!("The {} service is unavailable at the moment", self.stage)
            }
        }
    }
}
