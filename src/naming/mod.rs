//! Naming server
//!
//! Request routing, authorization, the per-request lifecycle and the saved
//! registry of users and files.

pub mod registry;
pub mod request;
pub mod server;

pub use registry::{Registry, RegistryFile};
pub use request::{RequestPhase, RequestTrace};
pub use server::NamingServer;
