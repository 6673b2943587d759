//! Client connections
//!
//! Per-connection session state and the naming server's command loop.

pub mod handler;
pub mod state;

pub use handler::handle_client;
pub use state::Session;
