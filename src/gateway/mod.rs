//! Client gateway
//!
//! One user-facing command per call, with bounded retry on transient
//! failures.

pub mod attempt;
pub mod client;

pub use attempt::Attempt;
pub use client::{Credentials, Gateway};
