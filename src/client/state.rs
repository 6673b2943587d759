//! Module `state`
//!
//! Defines the `Session` struct holding per-connection state: who the
//! connection is logged in as and where it comes from.

use std::net::SocketAddr;

use crate::auth::UserId;

/// State of one client connection to the naming server.
///
/// A connection carries at most one identity at a time; LOGIN and REGISTER
/// replace it.
#[derive(Debug, Default)]
pub struct Session {
    user: Option<UserId>,
    client_addr: Option<SocketAddr>,
}

impl Session {
    pub fn new(client_addr: SocketAddr) -> Self {
        Self {
            user: None,
            client_addr: Some(client_addr),
        }
    }

    /// Binds the connection to `user`.
    pub fn login(&mut self, user: UserId) {
        self.user = Some(user);
    }

    /// Forgets the bound identity; the address is kept for logging.
    pub fn logout(&mut self) {
        self.user = None;
    }

    pub fn user(&self) -> Option<&UserId> {
        self.user.as_ref()
    }

    /// `user@addr` for log lines.
    pub fn label(&self) -> String {
        let user = self.user.as_ref().map_or("-", |u| u.as_str());
        match self.client_addr {
            Some(addr) => format!("{user}@{addr}"),
            None => user.to_string(),
        }
    }
}
