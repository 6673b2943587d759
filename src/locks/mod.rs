//! Per-path concurrency control
//!
//! Serializes mutations of a path while letting readers share it.

pub mod manager;

pub use manager::{LockMode, LockSet, PathGuard, PathLockManager};
