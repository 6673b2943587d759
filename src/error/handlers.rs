//! Error handlers
//!
//! Maps error kinds to wire response codes and decides retryability.

use crate::error::types::{ErrorKind, NfsError};
use log::{error, warn};

/// Response code for a successful command.
pub const OK: u16 = 200;

/// Log an error at a level matching its kind.
pub fn handle_error(err: &NfsError) {
    match err.kind() {
        ErrorKind::Internal => error!("NFS error: {}", err),
        _ => warn!("NFS error: {}", err),
    }
}

/// Convert error kind to response code
pub fn error_to_code(kind: ErrorKind) -> u16 {
    match kind {
        ErrorKind::Unauthenticated => 530,
        ErrorKind::PermissionDenied => 531,
        ErrorKind::NotFound => 550,
        ErrorKind::AlreadyExists => 551,
        ErrorKind::NotEmpty => 552,
        ErrorKind::InvalidArgument => 501,
        ErrorKind::Conflict => 450,
        ErrorKind::Transient => 421,
        ErrorKind::Internal => 451,
    }
}

/// Convert response code back to an error kind; `None` for success codes.
pub fn code_to_error(code: u16) -> Option<ErrorKind> {
    let kind = match code {
        200..=299 => return None,
        530 => ErrorKind::Unauthenticated,
        531 => ErrorKind::PermissionDenied,
        550 => ErrorKind::NotFound,
        551 => ErrorKind::AlreadyExists,
        552 => ErrorKind::NotEmpty,
        501 => ErrorKind::InvalidArgument,
        450 => ErrorKind::Conflict,
        421 => ErrorKind::Transient,
        _ => ErrorKind::Internal,
    };
    Some(kind)
}

/// Only transient failures are worth another attempt.
pub fn is_retryable(kind: ErrorKind) -> bool {
    matches!(kind, ErrorKind::Transient)
}
