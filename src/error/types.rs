//! Error types
//!
//! Defines the single domain error shared by the naming server, the storage
//! engine and the client gateway.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Fieldless classification of an [`NfsError`].
///
/// Travels over both wire channels so a remote failure is rebuilt on the
/// receiving side with the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Unauthenticated,
    PermissionDenied,
    NotFound,
    AlreadyExists,
    NotEmpty,
    InvalidArgument,
    Conflict,
    Transient,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::PermissionDenied => "permission denied",
            ErrorKind::NotFound => "not found",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::NotEmpty => "not empty",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Transient => "transient",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Errors produced anywhere in the file service.
///
/// Every message carries the human words for its kind ("not found",
/// "permission denied", ...) because clients match on them case-insensitively.
#[derive(Debug, Error)]
pub enum NfsError {
    #[error("Unauthorized: {0}")]
    Unauthenticated(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Directory not empty: {0}")]
    NotEmpty(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Server busy, try again: {0}")]
    Transient(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl NfsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NfsError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            NfsError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            NfsError::NotFound(_) => ErrorKind::NotFound,
            NfsError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            NfsError::NotEmpty(_) => ErrorKind::NotEmpty,
            NfsError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            NfsError::Conflict(_) => ErrorKind::Conflict,
            NfsError::Transient(_) => ErrorKind::Transient,
            NfsError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The detail text without the kind prefix.
    pub fn detail(&self) -> &str {
        match self {
            NfsError::Unauthenticated(s)
            | NfsError::PermissionDenied(s)
            | NfsError::NotFound(s)
            | NfsError::AlreadyExists(s)
            | NfsError::NotEmpty(s)
            | NfsError::InvalidArgument(s)
            | NfsError::Conflict(s)
            | NfsError::Transient(s)
            | NfsError::Internal(s) => s,
        }
    }

    /// Rebuilds an error from its kind and detail, as received from a peer.
    pub fn from_kind(kind: ErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match kind {
            ErrorKind::Unauthenticated => NfsError::Unauthenticated(detail),
            ErrorKind::PermissionDenied => NfsError::PermissionDenied(detail),
            ErrorKind::NotFound => NfsError::NotFound(detail),
            ErrorKind::AlreadyExists => NfsError::AlreadyExists(detail),
            ErrorKind::NotEmpty => NfsError::NotEmpty(detail),
            ErrorKind::InvalidArgument => NfsError::InvalidArgument(detail),
            ErrorKind::Conflict => NfsError::Conflict(detail),
            ErrorKind::Transient => NfsError::Transient(detail),
            ErrorKind::Internal => NfsError::Internal(detail),
        }
    }
}

impl From<io::Error> for NfsError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => NfsError::NotFound(error.to_string()),
            io::ErrorKind::AlreadyExists => NfsError::AlreadyExists(error.to_string()),
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::TimedOut => NfsError::Transient(error.to_string()),
            _ => NfsError::Internal(error.to_string()),
        }
    }
}

impl From<serde_json::Error> for NfsError {
    fn from(error: serde_json::Error) -> Self {
        NfsError::Internal(format!("malformed JSON document: {error}"))
    }
}

impl From<config::ConfigError> for NfsError {
    fn from(error: config::ConfigError) -> Self {
        NfsError::InvalidArgument(format!("configuration: {error}"))
    }
}
