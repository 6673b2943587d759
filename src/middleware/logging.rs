//! Logging middleware
//!
//! Provides connection and command logging for the naming server.

use log::info;
use std::net::SocketAddr;

use crate::client::Session;
use crate::error::NfsError;
use crate::error::handlers::handle_error;
use crate::protocol::{Command, Reply};

/// Log a client connection
pub fn log_connection(client_addr: &SocketAddr, active: usize, max_clients: usize) {
    info!(
        "Client connected: {} ({}/{} clients)",
        client_addr, active, max_clients
    );
}

/// Log a client disconnect
pub fn log_disconnect(session: &Session) {
    info!("Client {} disconnected", session.label());
}

/// Log a client command; secrets and file content are left out
pub fn log_command(session: &Session, command: &Command) {
    info!("Received from {}: {}", session.label(), command.summary());
}

/// Log the outcome of a command
pub fn log_outcome(session: &Session, keyword: &str, result: &Result<Reply, NfsError>) {
    match result {
        Ok(reply) => info!("{} {} -> {}", session.label(), keyword, reply.message),
        Err(err) => handle_error(err),
    }
}
