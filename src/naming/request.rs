//! Request lifecycle
//!
//! `Received -> Authenticated -> Authorized -> Locked -> Executed -> Completed`,
//! with `Failed` reachable from any non-terminal phase. Requests that touch
//! no path (LIST, VIEW) go from `Authorized` straight to `Executed`.

use log::debug;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ErrorKind, NfsError};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    Received,
    Authenticated,
    Authorized,
    Locked,
    Executed,
    Completed,
    Failed(ErrorKind),
}

impl RequestPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestPhase::Completed | RequestPhase::Failed(_))
    }

    fn may_advance_to(&self, next: RequestPhase) -> bool {
        use RequestPhase::*;
        match (*self, next) {
            (from, Failed(_)) => !from.is_terminal(),
            (Received, Authenticated)
            | (Authenticated, Authorized)
            | (Authorized, Locked)
            | (Authorized, Executed)
            | (Locked, Executed)
            | (Executed, Completed) => true,
            _ => false,
        }
    }
}

#[derive(Debug)]
pub struct RequestTrace {
    id: u64,
    command: &'static str,
    phase: RequestPhase,
}

impl RequestTrace {
    pub fn new(command: &'static str) -> Self {
        Self {
            id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
            command,
            phase: RequestPhase::Received,
        }
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn advance(&mut self, next: RequestPhase) -> Result<(), NfsError> {
        if !self.phase.may_advance_to(next) {
            return Err(NfsError::Internal(format!(
                "request {} ({}) cannot go from {:?} to {:?}",
                self.id, self.command, self.phase, next
            )));
        }
        debug!("Request {} ({}): {:?} -> {:?}", self.id, self.command, self.phase, next);
        self.phase = next;
        Ok(())
    }

    /// Records the outcome; a request that already ended keeps its phase.
    pub fn finish<T>(&mut self, outcome: &Result<T, NfsError>) {
        let next = match outcome {
            Ok(_) => RequestPhase::Completed,
            Err(err) => RequestPhase::Failed(err.kind()),
        };
        if self.phase.may_advance_to(next) {
            debug!("Request {} ({}): {:?} -> {:?}", self.id, self.command, self.phase, next);
            self.phase = next;
        }
    }
}
