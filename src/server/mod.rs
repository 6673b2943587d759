//! Server core functionality
//!
//! The naming server's TCP front end: accept loop and connection limits.

pub mod core;

pub use core::Server;
