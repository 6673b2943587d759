//! Outcome of one gateway round trip
//!
//! The retry loop is driven by this tag alone: only `Transient` outcomes
//! are tried again.

use crate::error::NfsError;
use crate::error::handlers::is_retryable;
use crate::protocol::Reply;

#[derive(Debug)]
pub enum Attempt {
    Success(Reply),
    /// The command did not run; another attempt may succeed
    Transient(NfsError),
    /// Final answer, surfaced to the caller as is
    Terminal(NfsError),
}

impl Attempt {
    pub fn classify(result: Result<Reply, NfsError>) -> Self {
        match result {
            Ok(reply) => Attempt::Success(reply),
            Err(err) if is_retryable(err.kind()) => Attempt::Transient(err),
            Err(err) => Attempt::Terminal(err),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Attempt::Transient(_))
    }
}
