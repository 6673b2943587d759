//! Credential input validation
//!
//! Performs basic input sanitation on usernames and secrets before they
//! reach the identity store.

use crate::error::NfsError;

/// Rejects empty, oversized or control-character input.
fn is_valid_input(input: &str, max_length: usize) -> bool {
    !input.trim().is_empty()
        && input.len() <= max_length
        && !input.chars().any(|c| c.is_control() || c.is_whitespace())
}

/// Usernames are letters, digits, `_`, `-` and `.`, not starting with a digit.
pub fn validate_username(username: &str, max_length: usize) -> Result<(), NfsError> {
    if !is_valid_input(username, max_length) {
        return Err(NfsError::InvalidArgument(format!(
            "invalid username format: {username:?}"
        )));
    }

    if username.starts_with(|c: char| c.is_ascii_digit())
        || !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(NfsError::InvalidArgument(format!(
            "invalid username: {username}"
        )));
    }

    Ok(())
}

pub fn validate_secret(secret: &str, max_length: usize) -> Result<(), NfsError> {
    if !is_valid_input(secret, max_length) {
        return Err(NfsError::InvalidArgument("invalid password format".into()));
    }
    Ok(())
}
