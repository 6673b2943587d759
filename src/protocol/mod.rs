//! Client protocol
//!
//! Handles command parsing and response framing for the naming server.

pub mod commands;
pub mod parser;
pub mod responses;

pub use commands::Command;
pub use parser::parse_command;
pub use responses::{Reply, format_response, read_response};
