//! Error hierarchy for the etcd client
//!
//! Every failure is classified by an [`ErrorCode`], the status taxonomy shared
//! by CRUD calls and watches. HTTP statuses map onto it through
//! [`ErrorCode::from_http_status`].

use std::fmt;

use config::ConfigError;

use crate::network::TransportError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

/// Status codes surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Ok,
    /// Cooperative cancellation was observed
    Cancelled,
    /// Transport failure or unrecognized HTTP status
    Unknown,
    /// Caller supplied an unusable argument (e.g. a relative key)
    InvalidArgument,
    NotFound,
    PermissionDenied,
    /// CAS/version mismatch, or a malformed response
    FailedPrecondition,
    /// Server-side failure, typically leader trouble
    Unavailable,
}

impl ErrorCode {
    /// Maps an etcd HTTP response status onto the client taxonomy.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            200 | 201 => ErrorCode::Ok,
            403 => ErrorCode::PermissionDenied,
            404 => ErrorCode::NotFound,
            412 => ErrorCode::FailedPrecondition,
            500 => ErrorCode::Unavailable,
            _ => ErrorCode::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Ok => "OK",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::Unknown => "UNKNOWN",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::FailedPrecondition => "FAILED_PRECONDITION",
            ErrorCode::Unavailable => "UNAVAILABLE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The store answered with a non-success status, or the answer could not
    /// be decoded
    #[error("{code}: {message}")]
    Api { code: ErrorCode, message: String },

    /// No response object was produced (timeout, refused connection, ...)
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The owning scope requested cancellation
    #[error("Operation cancelled")]
    Cancelled,

    /// The server's global index decreased during an active watch
    #[error("etcd index went backwards while watching {key}: {seen} -> {received}")]
    IndexRegression { key: String, seen: i64, received: i64 },

    /// The snapshot read that seeds a watch failed
    #[error("Initial read for watch on {key} failed: {source}")]
    InitialRead {
        key: String,
        #[source]
        source: Box<Error>,
    },

    /// Configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Unrecoverable failures
    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Error {
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Api { code, .. } => *code,
            Error::Transport(_) => ErrorCode::Unknown,
            Error::Cancelled => ErrorCode::Cancelled,
            Error::IndexRegression { .. } => ErrorCode::Unknown,
            Error::InitialRead { source, .. } => source.code(),
            Error::Config(_) => ErrorCode::InvalidArgument,
            Error::Fatal(_) => ErrorCode::Unknown,
        }
    }

    /// True for terminal watch outcomes other than cancellation.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::IndexRegression { .. } | Error::InitialRead { .. } | Error::Fatal(_)
        )
    }

    pub(crate) fn api(
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        Error::Api {
            code,
            message: message.into(),
        }
    }

    /// Decoder failure for a missing or mistyped field.
    pub(crate) fn missing_field(field: &str) -> Self {
        Error::api(
            ErrorCode::FailedPrecondition,
            format!("Invalid JSON: Couldn't find '{field}'"),
        )
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::api(ErrorCode::InvalidArgument, message)
    }
}
