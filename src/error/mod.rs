//! Error handling
//!
//! Defines error types and handling for the file service.

pub mod handlers;
pub mod types;

pub use types::*;

pub type Result<T> = std::result::Result<T, NfsError>;
